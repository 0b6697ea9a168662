//! Offline transcription using Vosk

use super::{SpeechRecognizer, Transcription, WordTiming};
use crate::audio::read_wav_mono;
use crate::config::Config;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use vosk::{Model, Recognizer};

/// Samples fed to the recognizer per call
const CHUNK_SIZE: usize = 4000;

/// Vosk-based recognizer with word timestamps.
pub struct VoskRecognizer {
    model: Mutex<Model>,
}

impl VoskRecognizer {
    pub fn new(config: &Config) -> Result<Self> {
        let model_path = std::path::PathBuf::from(&config.vosk_model_path);

        if !model_path.exists() {
            return Err(anyhow::anyhow!(
                "Vosk model not found at {}",
                model_path.display()
            ));
        }

        info!("Loading Vosk model from: {}", model_path.display());

        let model_str = model_path.to_str().ok_or_else(|| {
            anyhow::anyhow!(
                "Vosk model path is not valid UTF-8: {}",
                model_path.display()
            )
        })?;

        let model = Model::new(model_str).context("Failed to load Vosk model")?;
        Ok(Self {
            model: Mutex::new(model),
        })
    }

    fn run(&self, audio_path: &Path) -> Result<Transcription> {
        let (samples, sample_rate) =
            read_wav_mono(audio_path).map_err(|e| anyhow::anyhow!("{e}"))?;
        let pcm: Vec<i16> = samples
            .iter()
            .map(|s| (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)
            .collect();

        let model = self
            .model
            .lock()
            .map_err(|e| anyhow::anyhow!("Vosk model lock poisoned: {e}"))?;
        let mut recognizer = Recognizer::new(&model, sample_rate as f32)
            .context("Failed to create Vosk recognizer")?;
        recognizer.set_words(true);

        for chunk in pcm.chunks(CHUNK_SIZE) {
            if let vosk::DecodingState::Failed = recognizer.accept_waveform(chunk) {
                debug!("Decoding failed for this chunk");
            }
        }

        let result = recognizer.final_result();
        let Some(single) = result.single() else {
            return Ok(Transcription::Empty);
        };
        let Some(text) = extract_text(single.text) else {
            return Ok(Transcription::Empty);
        };
        let words = single
            .result
            .iter()
            .map(|w| WordTiming {
                word: w.word.to_string(),
                start_sec: f64::from(w.start),
                end_sec: f64::from(w.end),
            })
            .collect();
        Ok(Transcription::Text { text, words })
    }
}

impl SpeechRecognizer for VoskRecognizer {
    fn transcribe(&self, audio_path: &Path) -> Transcription {
        match self.run(audio_path) {
            Ok(transcription) => {
                debug!("📝 Heard: '{}'", transcription.text());
                transcription
            }
            Err(e) => {
                warn!("⚠️ Transcription failed for {:?}: {:#}", audio_path, e);
                Transcription::Empty
            }
        }
    }

    fn name(&self) -> &str {
        "vosk"
    }
}

/// Extract text from Vosk result, filtering empty results
fn extract_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
