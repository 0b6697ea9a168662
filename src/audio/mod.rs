//! Audio capture seams and silence-aware recording.
//!
//! The recorder only ever sees the `AudioSource` / `InputStream` traits so the
//! endpointing loop can be driven by a real microphone (`CpalSource`) or by a
//! scripted block sequence in tests.

use crate::error::CoachResult;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod cpal_source;
mod recorder;
mod resample;
mod wav;

pub use cpal_source::{list_input_devices, CpalSource};
pub use recorder::{Recorder, RecordingResult, StopReason};
pub use resample::resample;
pub use wav::{read_wav_at, read_wav_mono, WavSink};

/// Something that can open a microphone stream.
pub trait AudioSource: Send + Sync {
    /// Open an input stream delivering mono f32 samples at `sample_rate`.
    fn open_input_stream(
        &self,
        device: Option<&str>,
        sample_rate: u32,
    ) -> CoachResult<Box<dyn InputStream>>;

    /// Whether a usable input device is currently selected.
    fn has_input_device(&self, device: Option<&str>) -> bool;
}

/// Blocking block-by-block reader. Each call returns exactly `n_samples`.
pub trait InputStream {
    fn read(&mut self, n_samples: usize) -> CoachResult<Vec<f32>>;
}

/// Destination for a finished recording.
pub trait RecordingSink: Send + Sync {
    fn write(&self, path: &Path, samples: &[f32], sample_rate: u32) -> CoachResult<()>;
}

/// Cooperative cancellation flag shared between the control thread and the
/// recording loop. The loop checks it once per block.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Root-mean-square level of a block.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Median of a list of levels (mean of the two middle values for even counts).
pub fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
