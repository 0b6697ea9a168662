//! Session plans
//!
//! A plan is fixed before a session starts. Ratio plans generate their turns
//! from the story pool; playlist plans list the phrases explicitly.

use crate::error::{CoachError, CoachResult};
use crate::sentences::Sentence;
use serde::{Deserialize, Serialize};

fn default_ratio() -> f64 {
    0.2
}

fn default_max_repeats() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioPlan {
    pub rounds: usize,
    #[serde(default = "default_ratio")]
    pub warmup_ratio: f64,
    #[serde(default = "default_ratio")]
    pub cooldown_ratio: f64,
    #[serde(default)]
    pub repeat_on_fail: bool,
    #[serde(default = "default_max_repeats")]
    pub max_repeats_per_sentence: u32,
}

impl RatioPlan {
    pub fn new(rounds: usize) -> Self {
        Self {
            rounds,
            warmup_ratio: default_ratio(),
            cooldown_ratio: default_ratio(),
            repeat_on_fail: false,
            max_repeats_per_sentence: default_max_repeats(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub text: String,
    /// Id of the exercise this phrase came from, if any
    #[serde(default, alias = "exercise_id", skip_serializing_if = "Option::is_none")]
    pub exercise: Option<i64>,
    #[serde(default)]
    pub target_word: String,
    #[serde(default)]
    pub phoneme_target: String,
    #[serde(default)]
    pub phoneme_contrast: String,
}

impl PlaylistItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exercise: None,
            target_word: String::new(),
            phoneme_target: String::new(),
            phoneme_contrast: String::new(),
        }
    }

    pub fn to_sentence(&self) -> Sentence {
        Sentence {
            text: self.text.trim().to_string(),
            target_word: self.target_word.clone(),
            phoneme_target: self.phoneme_target.clone(),
            phoneme_contrast: self.phoneme_contrast.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub items: Vec<PlaylistItem>,
    #[serde(default = "default_true")]
    pub repeat_on_fail: bool,
    #[serde(default = "default_max_repeats")]
    pub max_repeats_per_sentence: u32,
}

/// How the turns of a session are chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SessionPlan {
    Ratio(RatioPlan),
    Playlist(PlaylistPlan),
}

impl SessionPlan {
    /// Number of turns; for playlists this is the item count.
    pub fn rounds(&self) -> usize {
        match self {
            SessionPlan::Ratio(p) => p.rounds,
            SessionPlan::Playlist(p) => p.items.len(),
        }
    }

    pub fn repeat_on_fail(&self) -> bool {
        match self {
            SessionPlan::Ratio(p) => p.repeat_on_fail,
            SessionPlan::Playlist(p) => p.repeat_on_fail,
        }
    }

    pub fn max_repeats_per_sentence(&self) -> u32 {
        match self {
            SessionPlan::Ratio(p) => p.max_repeats_per_sentence,
            SessionPlan::Playlist(p) => p.max_repeats_per_sentence,
        }
    }

    pub fn is_playlist(&self) -> bool {
        matches!(self, SessionPlan::Playlist(_))
    }

    /// Copy of this plan with a different round count. Playlists keep their length.
    pub fn with_rounds(&self, rounds: usize) -> SessionPlan {
        match self {
            SessionPlan::Ratio(p) => SessionPlan::Ratio(RatioPlan {
                rounds,
                ..p.clone()
            }),
            SessionPlan::Playlist(_) => self.clone(),
        }
    }

    pub fn validate(&self) -> CoachResult<()> {
        match self {
            SessionPlan::Ratio(p) => {
                if p.rounds == 0 {
                    return Err(CoachError::Plan("rounds must be greater than zero".into()));
                }
                if !(0.0..=1.0).contains(&p.warmup_ratio) || !(0.0..=1.0).contains(&p.cooldown_ratio)
                {
                    return Err(CoachError::Plan("ratios must be within [0, 1]".into()));
                }
            }
            SessionPlan::Playlist(p) => {
                if p.items.is_empty() {
                    return Err(CoachError::Plan("playlist has no items".into()));
                }
                if let Some(pos) = p.items.iter().position(|i| i.text.trim().is_empty()) {
                    return Err(CoachError::Plan(format!("playlist item {} has no text", pos + 1)));
                }
            }
        }
        Ok(())
    }

    pub fn from_json(content: &str) -> CoachResult<Self> {
        let plan: SessionPlan = serde_json::from_str(content)?;
        plan.validate()?;
        Ok(plan)
    }
}

/// Ratio plan paced for the child's age and the session length in minutes.
pub fn build_session_plan(age: Option<u32>, duration_min: u32) -> SessionPlan {
    let base = match duration_min {
        0..=3 => 3,
        4..=5 => 4,
        6..=10 => 6,
        _ => 8,
    };
    let rounds = match age {
        None => base,
        Some(a) if a <= 6 => base.min(if duration_min <= 3 { 3 } else { 4 }),
        Some(a) if a <= 8 => (base + 1).min(if duration_min <= 5 { 5 } else { 7 }),
        Some(_) => (base + 1).min(10),
    };
    SessionPlan::Ratio(RatioPlan::new(rounds))
}
