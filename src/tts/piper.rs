//! Piper TTS backend calling a local binary

use super::SpeechOutput;
use crate::config::Config;
use crate::error::{CoachError, CoachResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub struct PiperEngine {
    model_path: PathBuf,
}

impl PiperEngine {
    pub fn new(config: &Config) -> Self {
        let model_path = resolve_voice(&config.piper_voice);
        if !model_path.exists() {
            warn!("⚠️ Piper model not found at {}", model_path.display());
        }
        Self { model_path }
    }

    fn synthesize(&self, text: &str, wav_path: &Path) -> CoachResult<()> {
        let mut child = Command::new("piper-tts")
            .arg("-m")
            .arg(&self.model_path)
            .arg("-f")
            .arg(wav_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                error!("❌ Failed to spawn piper-tts: {}", e);
                CoachError::Tts(format!("Failed to spawn piper-tts: {e}"))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
            stdin.flush()?;
        }

        let status = child.wait()?;
        if !status.success() {
            return Err(CoachError::Tts(format!("Piper failed with status {status}")));
        }
        if !wav_path.exists() {
            return Err(CoachError::Tts("Piper output file not created".into()));
        }
        Ok(())
    }
}

/// A voice is either a path to an `.onnx` file or a name under the voices dir.
fn resolve_voice(voice: &str) -> PathBuf {
    let direct = PathBuf::from(voice);
    if direct.extension().is_some_and(|ext| ext == "onnx") {
        return direct;
    }
    dirs::data_dir()
        .unwrap_or_default()
        .join("speechcoach/voices")
        .join(format!("{voice}.onnx"))
}

/// Play a WAV file on the default output and wait for it to finish.
pub fn play_wav_blocking(path: &Path) -> CoachResult<()> {
    let (_stream, handle) = rodio::OutputStream::try_default()
        .map_err(|e| CoachError::Tts(format!("No audio output: {e}")))?;
    let file = std::fs::File::open(path)?;
    let source = rodio::Decoder::new(std::io::BufReader::new(file))
        .map_err(|e| CoachError::Tts(format!("Cannot decode {}: {e}", path.display())))?;
    let sink = rodio::Sink::try_new(&handle)
        .map_err(|e| CoachError::Tts(format!("Cannot open sink: {e}")))?;
    sink.append(source);
    sink.sleep_until_end();
    Ok(())
}

impl SpeechOutput for PiperEngine {
    fn speak(&self, text: &str) -> CoachResult<()> {
        info!("📢 Piper speaking: '{}'", text);

        if !self.model_path.exists() {
            return Err(CoachError::Tts(format!(
                "Piper model file missing: {}",
                self.model_path.display()
            )));
        }

        let wav_path = std::env::temp_dir().join(format!(
            "speechcoach_tts_{}.wav",
            chrono::Local::now().timestamp_millis()
        ));

        let result = self
            .synthesize(text, &wav_path)
            .and_then(|()| {
                debug!("📢 Playing Piper WAV: {:?}", wav_path);
                play_wav_blocking(&wav_path)
            });
        let _ = std::fs::remove_file(&wav_path);
        result
    }

    fn name(&self) -> &str {
        "piper"
    }
}
