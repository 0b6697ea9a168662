//! Sample-rate conversion for audio that did not come from the recorder.

use crate::error::{CoachError, CoachResult};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

/// Convert mono samples from `from_rate` to `to_rate`. Same rates pass through.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> CoachResult<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(CoachError::Audio(format!(
            "Cannot resample {from_rate}Hz to {to_rate}Hz"
        )));
    }

    let mut resampler = FastFixedIn::<f32>::new(
        f64::from(to_rate) / f64::from(from_rate),
        1.0,
        PolynomialDegree::Septic,
        samples.len(),
        1,
    )
    .map_err(|e| CoachError::Audio(format!("Failed to create resampler: {e}")))?;

    let mut output = resampler
        .process(&[samples], None)
        .map_err(|e| CoachError::Audio(format!("Resampling failed: {e}")))?;
    let mono = output.pop().unwrap_or_default();

    debug!(
        "Resampled {} samples at {}Hz to {} at {}Hz",
        samples.len(),
        from_rate,
        mono.len(),
        to_rate
    );
    Ok(mono)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::rms;

    fn tone(freq: f32, rate: u32, seconds: f32) -> Vec<f32> {
        let n = (rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_same_rate_is_untouched() {
        let samples = tone(440.0, 16_000, 0.1);
        assert_eq!(resample(&samples, 16_000, 16_000).expect("resample"), samples);
        assert!(resample(&[], 44_100, 16_000).expect("empty").is_empty());
    }

    #[test]
    fn test_downsample_keeps_duration_and_level() {
        let samples = tone(440.0, 44_100, 1.0);
        let out = resample(&samples, 44_100, 16_000).expect("resample");

        let expected = 16_000usize;
        assert!(
            out.len().abs_diff(expected) < expected / 50,
            "got {} samples",
            out.len()
        );
        let level = rms(&out[4_000..12_000]);
        assert!((level - 0.5 / 2f32.sqrt()).abs() < 0.02, "rms {level}");
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        assert!(matches!(
            resample(&[0.1, 0.2], 0, 16_000),
            Err(CoachError::Audio(_))
        ));
    }
}
