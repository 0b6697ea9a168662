//! Locating the target word inside a timed transcript.

use super::text::normalize_text;
use crate::asr::WordTiming;

const PAD_BEFORE_SEC: f64 = 0.12;
const PAD_AFTER_SEC: f64 = 0.18;
const DEFAULT_WINDOW: (f64, f64) = (0.0, 1.2);

/// Time span `(start, end)` in seconds believed to contain `target_word`.
///
/// First word whose normalized form equals, contains or is contained in the
/// normalized target wins; otherwise the middle word is used. With no target
/// the whole transcript span is returned.
pub fn find_focus_window(words: &[WordTiming], target_word: &str) -> (f64, f64) {
    if words.is_empty() {
        return DEFAULT_WINDOW;
    }

    let target = normalize_text(target_word);
    if target.is_empty() {
        let start = words[0].start_sec;
        let end = words[words.len() - 1].end_sec;
        return (start.max(0.0), end + 0.2);
    }

    let matched = words.iter().find(|w| {
        let word = normalize_text(&w.word);
        !word.is_empty() && (word == target || word.contains(&target) || target.contains(&word))
    });

    let chosen = matched.unwrap_or(&words[words.len() / 2]);
    let end = if chosen.end_sec > chosen.start_sec {
        chosen.end_sec
    } else {
        chosen.start_sec + 0.2
    };
    ((chosen.start_sec - PAD_BEFORE_SEC).max(0.0), end + PAD_AFTER_SEC)
}
