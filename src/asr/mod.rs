//! ASR (Automatic Speech Recognition) Module
//!
//! The session only needs a finished-file transcription with word timings.
//! Recognizer failures are a typed outcome (`Transcription::Empty`), never an
//! error, so a broken model degrades a turn instead of aborting a session.

pub mod vosk;

pub use self::vosk::VoskRecognizer;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// One recognized word with its position in the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start_sec: f64,
    pub end_sec: f64,
}

/// Result of transcribing one recording.
#[derive(Debug, Clone, PartialEq)]
pub enum Transcription {
    /// Nothing recognized, or the recognizer failed
    Empty,
    Text {
        text: String,
        words: Vec<WordTiming>,
    },
}

impl Transcription {
    pub fn text(&self) -> &str {
        match self {
            Transcription::Empty => "",
            Transcription::Text { text, .. } => text,
        }
    }

    pub fn words(&self) -> &[WordTiming] {
        match self {
            Transcription::Empty => &[],
            Transcription::Text { words, .. } => words,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Transcription::Empty)
    }
}

/// Trait for transcription engines
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe a WAV file. Must not fail: problems map to `Empty`.
    fn transcribe(&self, audio_path: &Path) -> Transcription;

    /// Get the engine name
    fn name(&self) -> &str;
}
