//! Mock recognizer for testing
//!
//! Replays scripted transcriptions, then falls back to a fixed answer.

use speechcoach::asr::{SpeechRecognizer, Transcription, WordTiming};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct MockRecognizer {
    scripted: Mutex<VecDeque<Transcription>>,
    fallback: Transcription,
    /// Every path handed to `transcribe`
    pub seen: Mutex<Vec<PathBuf>>,
}

impl MockRecognizer {
    /// Always hears `text` (empty text means nothing recognized).
    pub fn always(text: &str) -> Self {
        Self::scripted(Vec::new(), text)
    }

    pub fn scripted(results: Vec<Transcription>, fallback: &str) -> Self {
        Self {
            scripted: Mutex::new(results.into()),
            fallback: text_result(fallback),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_paths(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

/// Transcription with evenly spaced word timings.
pub fn text_result(text: &str) -> Transcription {
    if text.trim().is_empty() {
        return Transcription::Empty;
    }
    let words = text
        .split_whitespace()
        .enumerate()
        .map(|(i, w)| WordTiming {
            word: w.to_string(),
            start_sec: 0.3 * i as f64,
            end_sec: 0.3 * i as f64 + 0.25,
        })
        .collect();
    Transcription::Text {
        text: text.to_string(),
        words,
    }
}

impl SpeechRecognizer for MockRecognizer {
    fn transcribe(&self, audio_path: &Path) -> Transcription {
        self.seen.lock().unwrap().push(audio_path.to_path_buf());
        self.scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_recognizer_replays_then_falls_back() {
        let asr = MockRecognizer::scripted(vec![text_result("le chien")], "le chat");
        assert_eq!(asr.transcribe(Path::new("a.wav")).text(), "le chien");
        assert_eq!(asr.transcribe(Path::new("b.wav")).text(), "le chat");
        assert_eq!(asr.seen_paths().len(), 2);
    }

    #[test]
    fn test_empty_text_is_empty_result() {
        assert!(text_result("  ").is_empty());
        assert_eq!(text_result("le chat").words().len(), 2);
    }
}
