//! Microphone input using cpal

use super::{AudioSource, InputStream};
use crate::error::{CoachError, CoachResult};
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a blocking read waits for the driver before giving up.
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// List input device names for the CLI selector.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    for device in host.input_devices().context("no input devices available")? {
        names.push(device.name().unwrap_or_else(|_| "Unknown".to_string()));
    }
    Ok(names)
}

fn find_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .input_devices()
            .context("no input devices available")?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .with_context(|| format!("input device '{name}' not found")),
        None => host
            .default_input_device()
            .context("no default input device"),
    }
}

/// cpal-backed `AudioSource`.
#[derive(Debug, Default, Clone)]
pub struct CpalSource;

impl CpalSource {
    pub fn new() -> Self {
        Self
    }
}

impl AudioSource for CpalSource {
    fn open_input_stream(
        &self,
        device: Option<&str>,
        sample_rate: u32,
    ) -> CoachResult<Box<dyn InputStream>> {
        let stream = CpalInputStream::open(device, sample_rate)
            .map_err(|e| CoachError::Audio(format!("{e:#}")))?;
        Ok(Box::new(stream))
    }

    fn has_input_device(&self, device: Option<&str>) -> bool {
        find_device(device).is_ok()
    }
}

/// An open microphone stream. Samples arrive on cpal's callback thread and are
/// buffered until `read` asks for them.
pub struct CpalInputStream {
    // Dropping the stream stops capture
    _stream: cpal::Stream,
    rx: Receiver<Vec<f32>>,
    pending: VecDeque<f32>,
}

impl CpalInputStream {
    fn open(device_name: Option<&str>, sample_rate: u32) -> Result<Self> {
        let device = find_device(device_name)?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let default_config = device
            .default_input_config()
            .context("no default input config")?;
        let channels = default_config.channels().max(1);
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        info!(
            "🎙️ Opening '{}' ({} Hz, {} ch, {:?})",
            name,
            sample_rate,
            channels,
            default_config.sample_format()
        );

        let (tx, rx) = mpsc::channel();
        let channels = usize::from(channels);
        let stream = match default_config.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, channels, tx)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, channels, tx)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, channels, tx)?,
            other => anyhow::bail!("unsupported sample format {other:?}"),
        };
        stream.play().context("failed to start input stream")?;

        Ok(Self {
            _stream: stream,
            rx,
            pending: VecDeque::new(),
        })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    tx: Sender<Vec<f32>>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // Downmix to mono
            let mono: Vec<f32> = data
                .chunks(channels)
                .map(|frame| {
                    frame.iter().map(|s| s.to_sample::<f32>()).sum::<f32>() / frame.len() as f32
                })
                .collect();
            if tx.send(mono).is_err() {
                debug!("Audio receiver dropped");
            }
        },
        |err| {
            warn!("Audio stream error: {}", err);
        },
        None,
    )?;
    Ok(stream)
}

impl InputStream for CpalInputStream {
    fn read(&mut self, n_samples: usize) -> CoachResult<Vec<f32>> {
        while self.pending.len() < n_samples {
            match self.rx.recv_timeout(READ_TIMEOUT) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(CoachError::Audio("input stream stalled".into()))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CoachError::Audio("input stream closed".into()))
                }
            }
        }
        Ok(self.pending.drain(..n_samples).collect())
    }
}
