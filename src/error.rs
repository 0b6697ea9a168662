//! SpeechCoach Error Types
//!
//! Configuration errors are raised synchronously by `SessionController::start`;
//! everything else is either recovered inside a turn or surfaces as the
//! `error` end reason.

use thiserror::Error;

/// Central error type for SpeechCoach
#[derive(Error, Debug)]
pub enum CoachError {
    #[error("No child profile selected")]
    NoChildSelected,

    #[error("No sentences loaded")]
    NoSentences,

    #[error("No microphone selected")]
    NoInputDevice,

    #[error("A session is already running")]
    SessionActive,

    #[error("Invalid session plan: {0}")]
    Plan(String),

    #[error("Audio capture error: {0}")]
    Audio(String),

    #[error("ASR engine error: {0}")]
    Asr(String),

    #[error("TTS engine error: {0}")]
    Tts(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoachError {
    /// True for the errors `start()` reports before any worker is spawned.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CoachError::NoChildSelected
                | CoachError::NoSentences
                | CoachError::NoInputDevice
                | CoachError::SessionActive
                | CoachError::Plan(_)
        )
    }
}

/// Result type alias for SpeechCoach operations
pub type CoachResult<T> = Result<T, CoachError>;

/// Helper to convert Mutex poison errors
impl<T> From<std::sync::PoisonError<T>> for CoachError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        CoachError::Lock(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(CoachError::NoInputDevice.is_configuration());
        assert!(CoachError::Plan("empty".into()).is_configuration());
        assert!(!CoachError::Asr("boom".into()).is_configuration());
    }

    #[test]
    fn test_poison_conversion() {
        let lock = std::sync::Arc::new(std::sync::Mutex::new(0));
        let cloned = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = cloned.lock().unwrap();
            panic!("poison");
        })
        .join();
        let err: CoachError = lock.lock().unwrap_err().into();
        assert!(matches!(err, CoachError::Lock(_)));
    }
}
