//! Turn ordering
//!
//! Ratio plans produce warm-up, core and cool-down turns from a sentence pool.
//! Playlists are played as written.

use super::plan::SessionPlan;
use crate::sentences::Sentence;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::sync::Arc;
use tracing::debug;

/// Re-draws allowed when a core draw repeats the previous sentence
const MAX_REROLLS: usize = 3;
/// Weight factor per earlier core use of a sentence
const USE_DECAY: f64 = 0.85;
/// Weight factor for the sentence played just before
const PREVIOUS_PENALTY: f64 = 0.25;

/// The sentences of one session and the order they are played in.
/// Sentences are shared with the pool they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSequence {
    pub sentences: Vec<Arc<Sentence>>,
    pub order: Vec<usize>,
}

impl TurnSequence {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Warm-up and cool-down sizes for `rounds` turns.
///
/// Each side gets at least one turn; when together they would leave no core
/// turn, both are clamped to `rounds / 3`.
pub fn phase_counts(rounds: usize, warmup_ratio: f64, cooldown_ratio: f64) -> (usize, usize) {
    let warmup = ((rounds as f64 * warmup_ratio).round() as usize).max(1);
    let cooldown = ((rounds as f64 * cooldown_ratio).round() as usize).max(1);
    if warmup + cooldown >= rounds {
        (rounds / 3, rounds / 3)
    } else {
        (warmup, cooldown)
    }
}

/// Pool indices sorted from easiest to hardest (shortest text first).
pub fn easiest_first(pool: &[Arc<Sentence>]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..pool.len()).collect();
    indices.sort_by_key(|&i| pool[i].text.chars().count());
    indices
}

/// Draw weight of a core sentence: decays with each earlier core use and
/// drops sharply when it was the turn just played.
pub fn core_weight(uses: usize, is_previous: bool) -> f64 {
    let w = USE_DECAY.powi(uses as i32);
    if is_previous {
        w * PREVIOUS_PENALTY
    } else {
        w
    }
}

fn draw_core(uses: &[usize], previous: Option<usize>, rng: &mut impl Rng) -> usize {
    let weights: Vec<f64> = uses
        .iter()
        .enumerate()
        .map(|(i, &n)| core_weight(n, previous == Some(i)))
        .collect();
    match WeightedIndex::new(&weights) {
        Ok(dist) => dist.sample(rng),
        Err(_) => rng.gen_range(0..uses.len()),
    }
}

pub struct TurnSequencer;

impl TurnSequencer {
    /// Ordered pool indices for `plan`. For playlists the indices refer to the
    /// playlist items, not to `pool`.
    pub fn build(pool: &[Arc<Sentence>], plan: &SessionPlan) -> Vec<usize> {
        Self::build_with_rng(pool, plan, &mut rand::thread_rng())
    }

    pub fn build_with_rng(
        pool: &[Arc<Sentence>],
        plan: &SessionPlan,
        rng: &mut impl Rng,
    ) -> Vec<usize> {
        let p = match plan {
            SessionPlan::Playlist(p) => return (0..p.items.len()).collect(),
            SessionPlan::Ratio(p) => p,
        };
        if pool.is_empty() || p.rounds == 0 {
            return Vec::new();
        }

        let (warmup, cooldown) = phase_counts(p.rounds, p.warmup_ratio, p.cooldown_ratio);
        let core = p.rounds - warmup - cooldown;
        let easy = easiest_first(pool);

        let mut order = Vec::with_capacity(p.rounds);
        order.extend((0..warmup).map(|i| easy[i % easy.len()]));
        let mut uses = vec![0usize; pool.len()];
        for _ in 0..core {
            let previous = order.last().copied();
            let mut pick = draw_core(&uses, previous, rng);
            for _ in 0..MAX_REROLLS {
                if previous != Some(pick) {
                    break;
                }
                pick = draw_core(&uses, previous, rng);
            }
            uses[pick] += 1;
            order.push(pick);
        }
        order.extend((0..cooldown).map(|i| easy[i % easy.len()]));

        debug!(
            "🧩 Sequence: {} warm-up, {} core, {} cool-down",
            warmup, core, cooldown
        );
        order
    }

    /// Resolve a plan once into the sentences to play.
    pub fn resolve(pool: &[Arc<Sentence>], plan: &SessionPlan) -> TurnSequence {
        let order = Self::build(pool, plan);
        let sentences = match plan {
            SessionPlan::Playlist(p) => p
                .items
                .iter()
                .map(|i| Arc::new(i.to_sentence()))
                .collect(),
            SessionPlan::Ratio(_) => pool.to_vec(),
        };
        TurnSequence { sentences, order }
    }

    /// Plan-less session: walk the pool in order, wrapping around.
    pub fn cyclic(pool: &[Arc<Sentence>], rounds: usize) -> TurnSequence {
        let order = if pool.is_empty() {
            Vec::new()
        } else {
            (0..rounds).map(|i| i % pool.len()).collect()
        };
        TurnSequence {
            sentences: pool.to_vec(),
            order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::plan::{PlaylistItem, PlaylistPlan, RatioPlan};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pool() -> Vec<Arc<Sentence>> {
        [
            "Le chien chante dans le jardin.",
            "Un chat.",
            "Sacha cherche ses chaussons.",
            "Chut !",
        ]
        .into_iter()
        .map(|t| Arc::new(Sentence::new(t)))
        .collect()
    }

    fn ratio(rounds: usize, warmup_ratio: f64, cooldown_ratio: f64) -> SessionPlan {
        SessionPlan::Ratio(RatioPlan {
            warmup_ratio,
            cooldown_ratio,
            ..RatioPlan::new(rounds)
        })
    }

    #[test]
    fn test_length_matches_rounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for rounds in 1..=25 {
            for (w, c) in [(0.2, 0.2), (0.5, 0.5), (0.0, 0.0), (1.0, 1.0), (0.1, 0.6)] {
                let order = TurnSequencer::build_with_rng(&pool(), &ratio(rounds, w, c), &mut rng);
                assert_eq!(order.len(), rounds);
                assert!(order.iter().all(|&i| i < pool().len()));
            }
        }
    }

    #[test]
    fn test_phase_counts_leave_a_core_turn() {
        for rounds in 1..=40 {
            for (w, c) in [(0.2, 0.2), (0.5, 0.5), (0.9, 0.9), (0.0, 1.0)] {
                let (warmup, cooldown) = phase_counts(rounds, w, c);
                assert!(warmup + cooldown < rounds, "rounds={rounds} w={w} c={c}");
            }
        }
        assert_eq!(phase_counts(10, 0.2, 0.2), (2, 2));
        assert_eq!(phase_counts(3, 0.5, 0.5), (1, 1));
        assert_eq!(phase_counts(10, 0.0, 0.0), (1, 1));
    }

    #[test]
    fn test_warmup_and_cooldown_use_easiest() {
        let mut rng = StdRng::seed_from_u64(1);
        let order = TurnSequencer::build_with_rng(&pool(), &ratio(10, 0.2, 0.2), &mut rng);
        // "Chut !" then "Un chat."
        assert_eq!(&order[..2], &[3, 1]);
        assert_eq!(&order[8..], &[3, 1]);
    }

    #[test]
    fn test_core_weight_favours_unused_sentences() {
        assert_eq!(core_weight(0, false), 1.0);
        assert!(core_weight(1, false) < core_weight(0, false));
        assert!(core_weight(3, false) < core_weight(1, false));
        assert!(core_weight(0, true) < core_weight(2, false));
        assert!(core_weight(5, true) > 0.0);
    }

    #[test]
    fn test_core_draws_spread_over_pool() {
        let mut rng = StdRng::seed_from_u64(42);
        let plan = ratio(40, 0.0, 0.0);
        let (warmup, cooldown) = phase_counts(40, 0.0, 0.0);
        let mut counts = [0usize; 4];
        for _ in 0..50 {
            let order = TurnSequencer::build_with_rng(&pool(), &plan, &mut rng);
            for &i in &order[warmup..order.len() - cooldown] {
                counts[i] += 1;
            }
        }
        let total: usize = counts.iter().sum();
        assert_eq!(total, 50 * (40 - warmup - cooldown));
        // within half a fair share either way
        for &c in &counts {
            assert!(c * 4 > total / 2, "counts={counts:?}");
            assert!(c * 4 < total * 3 / 2, "counts={counts:?}");
        }
    }

    #[test]
    fn test_core_rarely_repeats_previous() {
        let mut rng = StdRng::seed_from_u64(3);
        let plan = ratio(30, 0.0, 0.0);
        let mut repeats = 0;
        let mut pairs = 0;
        for _ in 0..20 {
            let order = TurnSequencer::build_with_rng(&pool(), &plan, &mut rng);
            for w in order[1..29].windows(2) {
                pairs += 1;
                if w[0] == w[1] {
                    repeats += 1;
                }
            }
        }
        assert!(repeats * 50 < pairs, "repeats={repeats} pairs={pairs}");
    }

    #[test]
    fn test_resolve_shares_pool_sentences() {
        let pool = pool();
        let seq = TurnSequencer::resolve(&pool, &ratio(6, 0.2, 0.2));
        assert!(seq
            .sentences
            .iter()
            .zip(&pool)
            .all(|(a, b)| Arc::ptr_eq(a, b)));
    }

    #[test]
    fn test_playlist_order_is_exact() {
        let plan = SessionPlan::Playlist(PlaylistPlan {
            name: None,
            items: vec![
                PlaylistItem::new("Trois."),
                PlaylistItem::new("Un."),
                PlaylistItem::new("Deux."),
            ],
            repeat_on_fail: true,
            max_repeats_per_sentence: 1,
        });
        let seq = TurnSequencer::resolve(&pool(), &plan);
        assert_eq!(seq.order, vec![0, 1, 2]);
        assert_eq!(seq.sentences[0].text, "Trois.");
        assert_eq!(seq.len(), plan.rounds());
    }

    #[test]
    fn test_cyclic_wraps() {
        let seq = TurnSequencer::cyclic(&pool(), 6);
        assert_eq!(seq.order, vec![0, 1, 2, 3, 0, 1]);
        assert!(TurnSequencer::cyclic(&[], 3).is_empty());
    }
}
