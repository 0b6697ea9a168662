//! WAV file output for recorded attempts.

use super::{resample, RecordingSink};
use crate::error::CoachResult;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use tracing::debug;

/// Writes mono 32-bit float WAV files.
#[derive(Debug, Default, Clone)]
pub struct WavSink;

impl WavSink {
    pub fn new() -> Self {
        Self
    }
}

impl RecordingSink for WavSink {
    fn write(&self, path: &Path, samples: &[f32], sample_rate: u32) -> CoachResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        debug!("Wrote {} samples to {:?}", samples.len(), path);
        Ok(())
    }
}

/// Read a WAV file as mono f32 in [-1, 1], averaging channels.
pub fn read_wav_mono(path: &Path) -> CoachResult<(Vec<f32>, u32)> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

/// Read a WAV file as mono f32 converted to `sample_rate`.
pub fn read_wav_at(path: &Path, sample_rate: u32) -> CoachResult<Vec<f32>> {
    let (samples, file_rate) = read_wav_mono(path)?;
    if file_rate != sample_rate {
        debug!("Converting {:?} from {}Hz to {}Hz", path, file_rate, sample_rate);
    }
    resample(&samples, file_rate, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_preserves_samples() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audio").join("1_story_0_1.wav");
        let samples: Vec<f32> = (0..480).map(|i| (i as f32 / 480.0) - 0.5).collect();

        WavSink::new()
            .write(&path, &samples, 16_000)
            .expect("write wav");
        let (restored, rate) = read_wav_mono(&path).expect("read wav");

        assert_eq!(rate, 16_000);
        assert_eq!(restored.len(), samples.len());
        assert!((restored[100] - samples[100]).abs() < 1e-6);
    }

    #[test]
    fn test_read_int_stereo_downmixes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).expect("create");
        for _ in 0..10 {
            writer.write_sample(16_384i16).expect("left");
            writer.write_sample(0i16).expect("right");
        }
        writer.finalize().expect("finalize");

        let (mono, rate) = read_wav_mono(&path).expect("read");
        assert_eq!(rate, 8_000);
        assert_eq!(mono.len(), 10);
        assert!((mono[0] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_read_at_converts_to_recorder_rate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cd.wav");
        let samples = vec![0.25f32; 44_100];
        WavSink::new()
            .write(&path, &samples, 44_100)
            .expect("write wav");

        let converted = read_wav_at(&path, 16_000).expect("read");
        assert!(converted.len().abs_diff(16_000) < 320, "{}", converted.len());
        assert!((converted[8_000] - 0.25).abs() < 1e-3);

        let native = read_wav_at(&path, 44_100).expect("read");
        assert_eq!(native.len(), 44_100);
    }
}
