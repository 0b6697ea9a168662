//! Scoring pipeline
//!
//! Turns a transcript and a recorded segment into comparable metrics:
//! word error rate against the expected sentence, acoustic similarity of the
//! focus window to the stored target and contrast references, and a blended
//! pedagogical score.

pub mod features;
pub mod focus;
pub mod text;

pub use features::{cosine_similarity, FeatureExtractor, FeatureVector};
pub use focus::find_focus_window;
pub use text::{normalize_text, word_error_rate, WerMode};

use serde::{Deserialize, Serialize};

const WER_WEIGHT: f64 = 0.35;
const ACOUSTIC_WEIGHT: f64 = 0.65;

/// Metrics for one scored attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub wer: f64,
    pub acoustic_score: f64,
    pub acoustic_contrast: f64,
    pub confidence: f64,
    pub final_score: f64,
}

/// Cosine similarity of normalized vectors; 0.0 when either side is missing.
pub fn acoustic_score(features: Option<&FeatureVector>, reference: Option<&FeatureVector>) -> f64 {
    match (features, reference) {
        (Some(f), Some(r)) => cosine_similarity(&f.normalized(), &r.normalized()),
        _ => 0.0,
    }
}

/// How much closer the attempt is to the target than to the contrast sound.
pub fn phoneme_confidence(target_similarity: f64, contrast_similarity: f64) -> f64 {
    target_similarity - contrast_similarity
}

/// Blend of word accuracy (35%) and acoustic similarity mapped to [0, 1] (65%).
pub fn final_score(wer: f64, acoustic: f64) -> f64 {
    let wer = wer.clamp(0.0, 1.0);
    let acoustic01 = ((acoustic + 1.0) / 2.0).clamp(0.0, 1.0);
    WER_WEIGHT * (1.0 - wer) + ACOUSTIC_WEIGHT * acoustic01
}

#[derive(Debug, Clone, Default)]
pub struct Scorer {
    wer_mode: WerMode,
}

impl Scorer {
    pub fn new(wer_mode: WerMode) -> Self {
        Self { wer_mode }
    }

    pub fn score(
        &self,
        expected_text: &str,
        recognized_text: &str,
        features: Option<&FeatureVector>,
        reference_target: Option<&FeatureVector>,
        reference_contrast: Option<&FeatureVector>,
    ) -> ScoreBreakdown {
        let wer = word_error_rate(expected_text, recognized_text, self.wer_mode);
        let acoustic = acoustic_score(features, reference_target);
        let contrast = acoustic_score(features, reference_contrast);
        ScoreBreakdown {
            wer,
            acoustic_score: acoustic,
            acoustic_contrast: contrast,
            confidence: phoneme_confidence(acoustic, contrast),
            final_score: final_score(wer, acoustic),
        }
    }
}
