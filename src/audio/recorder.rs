//! Adaptive RMS endpointing.
//!
//! A recording is two phases: a short calibration that measures the room's
//! noise floor, then a capture loop that keeps every block from the first
//! loud block onward (trailing silence included) until enough speech, enough
//! total audio and enough consecutive silence have been seen.

use super::{median, rms, AudioSource, CancelToken, InputStream, RecordingSink};
use crate::config::RecorderConfig;
use crate::error::CoachResult;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why the capture loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Speech followed by enough silence
    Endpoint,
    /// Block budget exhausted
    MaxDuration,
    Cancelled,
    /// The input stream failed mid-capture; what was captured is kept
    StreamError,
}

impl StopReason {
    pub fn label(&self) -> &'static str {
        match self {
            StopReason::Endpoint => "endpoint",
            StopReason::MaxDuration => "max_duration",
            StopReason::Cancelled => "cancelled",
            StopReason::StreamError => "stream_error",
        }
    }
}

/// One recording attempt.
#[derive(Debug, Clone)]
pub struct RecordingResult {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub duration_sec: f64,
    pub threshold_used: f32,
    pub noise_floor: f32,
    /// Stream reads performed, calibration included
    pub blocks_read: usize,
    pub speech_blocks: usize,
    pub stop_reason: StopReason,
}

/// Silence-detecting recorder.
pub struct Recorder {
    config: RecorderConfig,
    source: Arc<dyn AudioSource>,
    device: Option<String>,
}

impl Recorder {
    pub fn new(config: RecorderConfig, source: Arc<dyn AudioSource>, device: Option<String>) -> Self {
        Self {
            config,
            source,
            device,
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Record one utterance, hand it to `sink` at `out_path` and return it.
    ///
    /// Opening the stream can fail; endpointing itself never does. A sink
    /// failure is logged and the in-memory result is still returned.
    pub fn record(
        &self,
        sink: &dyn RecordingSink,
        out_path: &Path,
        cancel: &CancelToken,
    ) -> CoachResult<RecordingResult> {
        let mut stream = self
            .source
            .open_input_stream(self.device.as_deref(), self.config.sample_rate)?;
        let result = capture(&self.config, stream.as_mut(), cancel);

        if let Err(e) = sink.write(out_path, &result.samples, result.sample_rate) {
            warn!("⚠️ Could not write recording {:?}: {}", out_path, e);
        }

        info!(
            "🎙️ Recorded {:.2}s (threshold {:.4}, stop: {})",
            result.duration_sec,
            result.threshold_used,
            result.stop_reason.label()
        );
        Ok(result)
    }
}

/// Run calibration and capture against an open stream.
pub fn capture(
    config: &RecorderConfig,
    stream: &mut dyn InputStream,
    cancel: &CancelToken,
) -> RecordingResult {
    let block_size = config.block_size();
    let calibration_blocks = config.calibration_blocks();
    let max_blocks = config.max_blocks();
    let silence_need = config.silence_need_blocks();
    let min_total = config.min_total_blocks();
    let min_speech = config.min_speech_blocks();

    let mut blocks_read = 0usize;
    let mut stop_reason = StopReason::MaxDuration;

    let mut noise = Vec::with_capacity(calibration_blocks);
    for _ in 0..calibration_blocks {
        if cancel.is_cancelled() {
            stop_reason = StopReason::Cancelled;
            break;
        }
        match stream.read(block_size) {
            Ok(block) => {
                blocks_read += 1;
                noise.push(rms(&block));
            }
            Err(e) => {
                warn!("⚠️ Input stream failed during calibration: {}", e);
                stop_reason = StopReason::StreamError;
                break;
            }
        }
    }
    let noise_floor = median(&noise);
    let threshold = config
        .base_threshold
        .max(noise_floor * config.threshold_multiplier);
    debug!(
        "Calibration: {} blocks, noise floor {:.5}, threshold {:.5}",
        noise.len(),
        noise_floor,
        threshold
    );

    let mut frames: Vec<f32> = Vec::new();
    let mut started = false;
    let mut silence_run = 0usize;
    let mut speech_blocks = 0usize;
    let mut total_blocks = 0usize;

    if matches!(stop_reason, StopReason::MaxDuration) {
        while total_blocks < max_blocks {
            if cancel.is_cancelled() {
                stop_reason = StopReason::Cancelled;
                break;
            }
            let block = match stream.read(block_size) {
                Ok(block) => block,
                Err(e) => {
                    warn!("⚠️ Input stream failed during capture: {}", e);
                    stop_reason = StopReason::StreamError;
                    break;
                }
            };
            blocks_read += 1;
            total_blocks += 1;

            if rms(&block) > threshold {
                started = true;
                silence_run = 0;
                speech_blocks += 1;
                frames.extend_from_slice(&block);
            } else if started {
                silence_run += 1;
                frames.extend_from_slice(&block);
            }

            if started
                && speech_blocks >= min_speech
                && total_blocks >= min_total
                && silence_run >= silence_need
            {
                stop_reason = StopReason::Endpoint;
                break;
            }
        }
    }

    if frames.is_empty() {
        // Nothing above threshold: hand back a near-silent single sample
        frames.push(0.0);
    }

    let sample_rate = config.sample_rate.max(1);
    RecordingResult {
        duration_sec: frames.len() as f64 / f64::from(sample_rate),
        samples: frames,
        sample_rate,
        threshold_used: threshold,
        noise_floor,
        blocks_read,
        speech_blocks,
        stop_reason,
    }
}
