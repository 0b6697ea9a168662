//! Transcript normalization and word error rate.

use serde::{Deserialize, Serialize};

const REPLACEMENTS: &[(&str, &str)] = &[
    ("\u{2019}", "'"),
    ("\u{0153}", "oe"),
    ("\u{00e6}", "ae"),
    ("-", " "),
    (",", " "),
    (";", " "),
    (":", " "),
    ("!", " "),
    ("?", " "),
    (".", " "),
    ("\u{2026}", " "),
];

/// Lowercase, fold typographic punctuation and collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let mut result = text.trim().to_lowercase();
    for (from, to) in REPLACEMENTS {
        result = result.replace(from, to);
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// How transcripts are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WerMode {
    /// Word-level edit distance over the expected word count
    #[default]
    Levenshtein,
    /// Lower fidelity: 0.0 on exact normalized match, 1.0 otherwise
    ExactMatch,
}

/// Word error rate of `recognized` against `expected`, on normalized text.
///
/// Not clamped: insertions can push it above 1.0.
pub fn word_error_rate(expected: &str, recognized: &str, mode: WerMode) -> f64 {
    let exp = normalize_text(expected);
    let rec = normalize_text(recognized);
    if exp.is_empty() && rec.is_empty() {
        return 0.0;
    }
    match mode {
        WerMode::ExactMatch => {
            if exp == rec {
                0.0
            } else {
                1.0
            }
        }
        WerMode::Levenshtein => {
            let exp_words: Vec<&str> = exp.split(' ').filter(|w| !w.is_empty()).collect();
            let rec_words: Vec<&str> = rec.split(' ').filter(|w| !w.is_empty()).collect();
            if exp_words.is_empty() {
                return 1.0;
            }
            let edits = strsim::generic_levenshtein(&exp_words, &rec_words);
            edits as f64 / exp_words.len() as f64
        }
    }
}
