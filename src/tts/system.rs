//! System fallback TTS engine

use super::SpeechOutput;
use crate::error::{CoachError, CoachResult};
use std::process::Command;
use tracing::debug;

#[derive(Debug)]
pub struct SystemEngine;

impl Default for SystemEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemEngine {
    pub fn new() -> Self {
        Self
    }
}

impl SpeechOutput for SystemEngine {
    fn speak(&self, text: &str) -> CoachResult<()> {
        debug!("System speaking: {}", text);

        // spd-say needs --wait to block until the utterance is done
        if let Ok(status) = Command::new("spd-say")
            .args(["--wait", "-l", "fr"])
            .arg(text)
            .status()
        {
            if status.success() {
                return Ok(());
            }
        }

        if let Ok(status) = Command::new("espeak-ng").args(["-v", "fr"]).arg(text).status() {
            if status.success() {
                return Ok(());
            }
        }

        Err(CoachError::Tts(
            "No system TTS command found (tried spd-say, espeak-ng)".into(),
        ))
    }

    fn name(&self) -> &str {
        "system"
    }
}
