//! Mock speech output for testing
//!
//! Records all spoken text for verification.

use speechcoach::error::{CoachError, CoachResult};
use speechcoach::tts::SpeechOutput;
use std::sync::{Arc, Mutex};

/// Mock TTS engine that records spoken text
#[derive(Debug)]
pub struct MockSpeech {
    /// All text that was "spoken"
    pub spoken: Arc<Mutex<Vec<String>>>,
    /// Simulate failure on every speak
    pub should_fail: Arc<Mutex<bool>>,
}

impl MockSpeech {
    pub fn new() -> Self {
        Self {
            spoken: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    /// Get all spoken phrases
    pub fn get_spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    /// Check if a phrase was spoken
    pub fn was_spoken(&self, text: &str) -> bool {
        self.spoken.lock().unwrap().iter().any(|s| s.contains(text))
    }

    /// How many times exactly `text` was spoken
    pub fn count(&self, text: &str) -> usize {
        self.spoken.lock().unwrap().iter().filter(|s| *s == text).count()
    }
}

impl Default for MockSpeech {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechOutput for MockSpeech {
    fn speak(&self, text: &str) -> CoachResult<()> {
        if *self.should_fail.lock().unwrap() {
            return Err(CoachError::Tts("Mock TTS failure".into()));
        }
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_speech_records_text() {
        let mock = MockSpeech::new();
        mock.speak("bonjour").unwrap();
        mock.speak_queued("le chat", true).unwrap();
        assert_eq!(mock.get_spoken(), vec!["bonjour", "le chat"]);
        assert!(mock.was_spoken("chat"));
        assert_eq!(mock.count("bonjour"), 1);
    }

    #[test]
    fn test_mock_speech_failure() {
        let mock = MockSpeech::new();
        *mock.should_fail.lock().unwrap() = true;
        assert!(mock.speak("bonjour").is_err());
        assert!(mock.get_spoken().is_empty());
    }
}
