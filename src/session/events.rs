//! What a session reports back to its owner.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

pub type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Finished,
    Stopped,
    Fatigue,
    Error,
}

impl EndReason {
    pub fn label(&self) -> &'static str {
        match self {
            EndReason::Finished => "finished",
            EndReason::Stopped => "stopped",
            EndReason::Fatigue => "fatigue",
            EndReason::Error => "error",
        }
    }
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A phrase about to be played.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentenceEvent {
    pub story_title: String,
    /// 1-based
    pub turn: usize,
    pub total: usize,
    pub text: String,
    pub phoneme_target: String,
}

/// Result of one completed, scored turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    /// 1-based
    pub turn: usize,
    pub sentence_index: usize,
    pub expected_text: String,
    pub recognized_text: String,
    pub wer: f64,
    pub acoustic_score: f64,
    pub acoustic_contrast: f64,
    pub confidence: f64,
    pub final_score: f64,
    pub focus_window: (f64, f64),
    pub duration_sec: f64,
    pub audio_path: PathBuf,
    /// Row id, when persistence succeeded
    pub record_id: Option<i64>,
}

/// Callback slots. Each runs on the thread draining the UI dispatch.
#[derive(Clone, Default)]
pub struct SessionCallbacks {
    pub on_status: Option<Callback<String>>,
    pub on_sentence: Option<Callback<SentenceEvent>>,
    pub on_analysis: Option<Callback<TurnOutcome>>,
    pub on_end: Option<Callback<EndReason>>,
}

impl SessionCallbacks {
    pub fn on_status(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_status = Some(Arc::new(f));
        self
    }

    pub fn on_sentence(mut self, f: impl Fn(SentenceEvent) + Send + Sync + 'static) -> Self {
        self.on_sentence = Some(Arc::new(f));
        self
    }

    pub fn on_analysis(mut self, f: impl Fn(TurnOutcome) + Send + Sync + 'static) -> Self {
        self.on_analysis = Some(Arc::new(f));
        self
    }

    pub fn on_end(mut self, f: impl Fn(EndReason) + Send + Sync + 'static) -> Self {
        self.on_end = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("on_status", &self.on_status.is_some())
            .field("on_sentence", &self.on_sentence.is_some())
            .field("on_analysis", &self.on_analysis.is_some())
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}
