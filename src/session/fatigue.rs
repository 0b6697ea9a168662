//! Early-stop heuristic over the most recent scored turns.

use crate::config::SessionTuning;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FatigueMonitor {
    window: usize,
    fail_threshold: f64,
    score_drop: f64,
    duration_growth: f64,
    /// `(final_score, duration_sec)` of the last `window` turns
    recent: VecDeque<(f64, f64)>,
}

impl FatigueMonitor {
    pub fn new(tuning: &SessionTuning) -> Self {
        let window = tuning.fatigue_window.max(2);
        Self {
            window,
            fail_threshold: tuning.fail_threshold,
            score_drop: tuning.fatigue_score_drop,
            duration_growth: tuning.fatigue_duration_growth,
            recent: VecDeque::with_capacity(window),
        }
    }

    /// Record a scored turn and report whether the child looks tired.
    pub fn record(&mut self, score: f64, duration_sec: f64) -> bool {
        if self.recent.len() == self.window {
            self.recent.pop_front();
        }
        self.recent.push_back((score, duration_sec));
        self.is_fatigued()
    }

    pub fn is_fatigued(&self) -> bool {
        if self.recent.len() < self.window {
            return false;
        }

        // 3 of 4 at the default window
        let min_fails = (3 * self.window).div_ceil(4);
        let fails = self
            .recent
            .iter()
            .filter(|(score, _)| *score < self.fail_threshold)
            .count();
        if fails >= min_fails {
            debug!("😴 Fatigue: {}/{} recent turns failed", fails, self.window);
            return true;
        }

        let half = self.window / 2;
        let (first_score, first_dur) = mean_pair(self.recent.iter().take(half), half);
        let (last_score, last_dur) = mean_pair(self.recent.iter().skip(self.window - half), half);

        let dropped = first_score - last_score > self.score_drop;
        let slowed = last_dur > first_dur * (1.0 + self.duration_growth);
        if dropped && slowed {
            debug!(
                "😴 Fatigue: score {:.2} -> {:.2}, duration {:.2}s -> {:.2}s",
                first_score, last_score, first_dur, last_dur
            );
        }
        dropped && slowed
    }

    pub fn reset(&mut self) {
        self.recent.clear();
    }
}

fn mean_pair<'a>(items: impl Iterator<Item = &'a (f64, f64)>, n: usize) -> (f64, f64) {
    let (score, duration) = items.fold((0.0, 0.0), |acc, r| (acc.0 + r.0, acc.1 + r.1));
    (score / n as f64, duration / n as f64)
}
