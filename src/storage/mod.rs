//! Persistence seams
//!
//! The session only reads reference profiles and appends turn records.
//! `SqliteStore` implements both on a local database.

pub mod sqlite;

pub use sqlite::{now_iso, SqliteStore};

use crate::error::CoachResult;
use crate::scoring::FeatureVector;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which side of a phoneme pair a reference profile describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileLabel {
    Target,
    Contrast,
}

impl ProfileLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileLabel::Target => "target",
            ProfileLabel::Contrast => "contrast",
        }
    }
}

impl std::str::FromStr for ProfileLabel {
    type Err = crate::error::CoachError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "target" => Ok(ProfileLabel::Target),
            "contrast" => Ok(ProfileLabel::Contrast),
            other => Err(crate::error::CoachError::Config(format!(
                "Unknown profile label '{other}' (expected target or contrast)"
            ))),
        }
    }
}

/// One persisted turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub created_at: String,
    pub child_id: Option<i64>,
    pub story_id: String,
    pub story_title: String,
    pub goal: String,
    pub sentence_index: usize,
    pub expected_text: String,
    pub recognized_text: String,
    pub wer: f64,
    pub audio_path: String,
    pub duration_sec: f64,
    pub phoneme_target: String,
    pub spectral_centroid_hz: Option<f64>,
    pub features: Option<FeatureVector>,
    pub acoustic_score: f64,
    pub acoustic_contrast: f64,
    pub final_score: f64,
    pub phoneme_confidence: f64,
    pub focus_start_sec: f64,
    pub focus_end_sec: f64,
}

pub trait ReferenceProfileStore: Send + Sync {
    /// Newest profile for exactly this key, `None` when absent or unreadable.
    fn load(&self, child_id: Option<i64>, phoneme: &str, label: ProfileLabel)
        -> Option<FeatureVector>;
}

pub trait SessionPersistence: Send + Sync {
    fn save_turn_outcome(&self, record: &TurnRecord) -> CoachResult<i64>;
}

/// Child-specific profile first, then the shared one.
pub fn load_reference(
    store: &dyn ReferenceProfileStore,
    child_id: Option<i64>,
    phoneme: &str,
    label: ProfileLabel,
) -> Option<FeatureVector> {
    if phoneme.is_empty() {
        return None;
    }
    if child_id.is_some() {
        if let Some(profile) = store.load(child_id, phoneme, label) {
            return Some(profile);
        }
        debug!(
            "No {} profile for child {:?} / {}, trying shared",
            label.as_str(),
            child_id,
            phoneme
        );
    }
    store.load(None, phoneme, label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapStore(HashMap<(Option<i64>, String, ProfileLabel), FeatureVector>);

    impl ReferenceProfileStore for MapStore {
        fn load(
            &self,
            child_id: Option<i64>,
            phoneme: &str,
            label: ProfileLabel,
        ) -> Option<FeatureVector> {
            self.0.get(&(child_id, phoneme.to_string(), label)).cloned()
        }
    }

    fn vector(rms: f64) -> FeatureVector {
        FeatureVector {
            mfcc_mean: [0.0; crate::scoring::features::N_MFCC],
            zero_crossing_rate: 0.1,
            rms,
            spectral_centroid: 1000.0,
            spectral_rolloff: 2000.0,
            sample_rate: 16_000,
            duration_sec: 0.5,
        }
    }

    #[test]
    fn test_reference_falls_back_to_shared_profile() {
        let mut map = HashMap::new();
        map.insert((None, "CH".to_string(), ProfileLabel::Target), vector(0.1));
        map.insert((Some(7), "S".to_string(), ProfileLabel::Target), vector(0.2));
        let store = MapStore(map);

        let shared = load_reference(&store, Some(7), "CH", ProfileLabel::Target);
        assert_eq!(shared.map(|v| v.rms), Some(0.1));

        let own = load_reference(&store, Some(7), "S", ProfileLabel::Target);
        assert_eq!(own.map(|v| v.rms), Some(0.2));

        assert!(load_reference(&store, Some(7), "CH", ProfileLabel::Contrast).is_none());
        assert!(load_reference(&store, Some(7), "", ProfileLabel::Target).is_none());
    }

    #[test]
    fn test_profile_label_parse() {
        assert_eq!("Target".parse::<ProfileLabel>().ok(), Some(ProfileLabel::Target));
        assert_eq!("contrast".parse::<ProfileLabel>().ok(), Some(ProfileLabel::Contrast));
        assert!("other".parse::<ProfileLabel>().is_err());
    }
}
