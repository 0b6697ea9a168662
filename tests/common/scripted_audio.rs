//! Deterministic microphone for testing
//!
//! Each opened stream plays the next script of block levels, then silence
//! forever. Samples alternate in sign so a block's RMS equals its level.

use speechcoach::audio::{AudioSource, InputStream, RecordingSink};
use speechcoach::error::{CoachError, CoachResult};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub const QUIET: f32 = 0.001;
pub const LOUD: f32 = 0.2;
pub const CALIBRATION_BLOCKS: usize = 15;
pub const SPEECH_BLOCKS: usize = 25;
pub const SILENCE_BLOCKS: usize = 33;
pub const BLOCK_SIZE: usize = 480;

/// Block levels of a clean utterance at the default recorder settings.
pub fn utterance() -> Vec<f32> {
    let mut levels = vec![QUIET; CALIBRATION_BLOCKS];
    levels.extend(vec![LOUD; SPEECH_BLOCKS]);
    levels.extend(vec![QUIET; SILENCE_BLOCKS]);
    levels
}

/// Samples the recorder keeps for `utterance()`: everything after calibration.
pub fn utterance_samples() -> Vec<f32> {
    utterance()[CALIBRATION_BLOCKS..]
        .iter()
        .flat_map(|&level| block(level))
        .collect()
}

/// Nothing but room noise: the recorder runs to its maximum and keeps nothing.
pub fn silence() -> Vec<f32> {
    Vec::new()
}

fn block(level: f32) -> Vec<f32> {
    (0..BLOCK_SIZE)
        .map(|i| if i % 2 == 0 { level } else { -level })
        .collect()
}

pub struct ScriptedAudio {
    scripts: Mutex<VecDeque<Vec<f32>>>,
    has_device: bool,
    fail_open: bool,
    read_delay: Duration,
    pub opened: Mutex<usize>,
}

impl ScriptedAudio {
    pub fn new(scripts: Vec<Vec<f32>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            has_device: true,
            fail_open: false,
            read_delay: Duration::ZERO,
            opened: Mutex::new(0),
        }
    }

    /// Every block read takes `delay`, like a real device.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn without_device() -> Self {
        Self {
            has_device: false,
            ..Self::new(Vec::new())
        }
    }

    /// A device is reported, but opening it fails.
    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn opened_count(&self) -> usize {
        *self.opened.lock().unwrap()
    }
}

struct ScriptedStream {
    levels: VecDeque<f32>,
    delay: Duration,
}

impl InputStream for ScriptedStream {
    fn read(&mut self, n_samples: usize) -> CoachResult<Vec<f32>> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let level = self.levels.pop_front().unwrap_or(QUIET);
        let mut samples = block(level);
        samples.resize(n_samples, level);
        Ok(samples)
    }
}

impl AudioSource for ScriptedAudio {
    fn open_input_stream(
        &self,
        _device: Option<&str>,
        _sample_rate: u32,
    ) -> CoachResult<Box<dyn InputStream>> {
        if !self.has_device {
            return Err(CoachError::NoInputDevice);
        }
        if self.fail_open {
            return Err(CoachError::Audio("device busy".into()));
        }
        *self.opened.lock().unwrap() += 1;
        let levels = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::new(ScriptedStream {
            levels: levels.into(),
            delay: self.read_delay,
        }))
    }

    fn has_input_device(&self, _device: Option<&str>) -> bool {
        self.has_device
    }
}

/// Keeps recordings in memory instead of writing WAV files.
#[derive(Default)]
pub struct MemorySink {
    pub written: Mutex<Vec<(PathBuf, usize)>>,
}

impl MemorySink {
    pub fn paths(&self) -> Vec<PathBuf> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }
}

impl RecordingSink for MemorySink {
    fn write(&self, path: &Path, samples: &[f32], _sample_rate: u32) -> CoachResult<()> {
        self.written
            .lock()
            .unwrap()
            .push((path.to_path_buf(), samples.len()));
        Ok(())
    }
}
