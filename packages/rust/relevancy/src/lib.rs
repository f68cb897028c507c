//! Multi-metric relevancy scoring of candidate keywords against a seed.
//!
//! Each candidate is compared to the seed with four metrics (see [`metrics`]):
//! word-set Dice overlap, word-level longest common subsequence, normalized
//! Levenshtein similarity, and character-bigram Dice similarity. The composite
//! score is their weighted mean, so it stays in `[0, 1]` for any non-negative
//! [`Weights`] with a positive sum.

pub mod metrics;

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use keywordscout_shared::{RankCandidate, Result, ScoredAnnotation, Weights};

// ---------------------------------------------------------------------------
// MetricScores
// ---------------------------------------------------------------------------

/// The four component similarities between a seed and one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricScores {
    pub word_overlap: f64,
    pub sequence: f64,
    pub levenshtein: f64,
    pub cosine: f64,
}

impl MetricScores {
    /// Compute all metrics for two already-normalized phrases.
    pub fn between(seed: &str, candidate: &str) -> Self {
        let seed_words = metrics::tokenize(seed);
        let candidate_words = metrics::tokenize(candidate);
        Self {
            word_overlap: metrics::word_overlap(&seed_words, &candidate_words),
            sequence: metrics::sequence(&seed_words, &candidate_words),
            levenshtein: metrics::levenshtein(seed, candidate),
            cosine: metrics::bigram_dice(seed, candidate),
        }
    }

    /// Weighted mean of the metrics, clamped to `[0, 1]`.
    pub fn composite(&self, weights: &Weights) -> f64 {
        let weighted = self.word_overlap * weights.word_overlap
            + self.sequence * weights.sequence
            + self.levenshtein * weights.levenshtein
            + self.cosine * weights.cosine;
        (weighted / weights.sum()).clamp(0.0, 1.0)
    }
}

/// Normalize both phrases and compute their metrics.
pub fn score_pair(seed: &str, candidate: &str) -> MetricScores {
    MetricScores::between(&metrics::normalize(seed), &metrics::normalize(candidate))
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Ranks candidates against a seed keyword with fixed weights.
#[derive(Debug, Clone)]
pub struct Scorer {
    weights: Weights,
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            weights: Weights::default(),
        }
    }
}

impl Scorer {
    /// Create a scorer, rejecting negative, non-finite, or all-zero weights.
    pub fn new(weights: Weights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// Score every candidate and sort by relevancy desc, then volume desc.
    ///
    /// The sort is stable, so fully tied candidates keep their input order.
    pub fn score(&self, seed: &str, candidates: &[RankCandidate]) -> Vec<ScoredAnnotation> {
        self.score_counted(seed, candidates).0
    }

    /// [`Scorer::score`] plus the number of distinct metric computations.
    fn score_counted(
        &self,
        seed: &str,
        candidates: &[RankCandidate],
    ) -> (Vec<ScoredAnnotation>, usize) {
        let normalized_seed = metrics::normalize(seed);
        // The seed is fixed for one call, so the normalized candidate alone
        // identifies a (seed, candidate) pair.
        let mut memo: HashMap<String, f64> = HashMap::new();

        let mut scored: Vec<ScoredAnnotation> = candidates
            .iter()
            .map(|candidate| {
                let normalized = metrics::normalize(&candidate.annotation);
                let relevancy_score = *memo.entry(normalized.clone()).or_insert_with(|| {
                    MetricScores::between(&normalized_seed, &normalized).composite(&self.weights)
                });
                ScoredAnnotation {
                    annotation: candidate.annotation.clone(),
                    volume: candidate.volume,
                    relevancy_score,
                    normalized_annotation: normalized,
                }
            })
            .collect();

        scored.sort_by(compare_ranked);

        debug!(
            candidates = candidates.len(),
            distinct = memo.len(),
            "scored candidates"
        );

        (scored, memo.len())
    }
}

/// Relevancy descending, then volume descending.
fn compare_ranked(a: &ScoredAnnotation, b: &ScoredAnnotation) -> Ordering {
    b.relevancy_score
        .total_cmp(&a.relevancy_score)
        .then_with(|| b.volume.cmp(&a.volume))
}

/// Score with optional weights (defaults when `None`).
pub fn score(
    seed: &str,
    candidates: &[RankCandidate],
    weights: Option<Weights>,
) -> Result<Vec<ScoredAnnotation>> {
    let scorer = match weights {
        Some(weights) => Scorer::new(weights)?,
        None => Scorer::default(),
    };
    Ok(scorer.score(seed, candidates))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(rows: &[(&str, u64)]) -> Vec<RankCandidate> {
        rows.iter()
            .map(|(name, volume)| RankCandidate::new(*name, *volume))
            .collect()
    }

    #[test]
    fn empty_candidates_yield_empty_ranking() {
        let ranked = Scorer::default().score("vegan dinner", &[]);
        assert!(ranked.is_empty());
    }

    #[test]
    fn identical_candidate_scores_one() {
        let metrics = score_pair("Vegan Dinner", "  vegan dinner ");
        assert_eq!(metrics.word_overlap, 1.0);
        assert_eq!(metrics.sequence, 1.0);
        assert_eq!(metrics.levenshtein, 1.0);
        assert_eq!(metrics.cosine, 1.0);

        let ranked = Scorer::default().score("Vegan Dinner", &candidates(&[("VEGAN DINNER", 3)]));
        assert_eq!(ranked[0].relevancy_score, 1.0);
        assert_eq!(ranked[0].normalized_annotation, "vegan dinner");
    }

    #[test]
    fn textual_similarity_beats_volume() {
        let ranked = Scorer::default().score(
            "vegan dinner",
            &candidates(&[("Gluten Free Lunch", 500), ("Vegan Dinner Recipes", 100)]),
        );
        assert_eq!(ranked[0].annotation, "Vegan Dinner Recipes");
        assert_eq!(ranked[1].annotation, "Gluten Free Lunch");
    }

    #[test]
    fn ties_break_by_volume_then_input_order() {
        let ranked = Scorer::default().score(
            "vegan",
            &candidates(&[("Keto", 10), ("keto", 50), ("KETO ", 10)]),
        );
        assert_eq!(ranked[0].volume, 50);
        assert_eq!(ranked[1].annotation, "Keto");
        assert_eq!(ranked[2].annotation, "KETO ");
    }

    #[test]
    fn ranking_is_sorted() {
        let ranked = Scorer::default().score(
            "easy vegan dinner",
            &candidates(&[
                ("Kid Vegan Meals", 170),
                ("Dinner Idea No Meat", 107),
                ("Vegan Recipes For One Person", 97),
                ("Inexpensive Vegan Meals", 93),
                ("Easy Vegan Dinner", 12),
                ("College Recipes Vegetarian", 62),
            ]),
        );
        assert_eq!(ranked[0].annotation, "Easy Vegan Dinner");
        for pair in ranked.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.relevancy_score > b.relevancy_score
                    || (a.relevancy_score == b.relevancy_score && a.volume >= b.volume)
            );
        }
    }

    #[test]
    fn composite_bounded_for_unnormalized_weights() {
        let rows = candidates(&[("vegan dinner", 1), ("lunch", 2), ("vegan dinner ideas", 3)]);
        for weights in [
            Weights::new(1.0, 1.0, 1.0, 1.0),
            Weights::new(0.0, 0.0, 0.0, 1.0),
            Weights::new(5.0, 0.0, 2.5, 0.0),
        ] {
            let ranked = Scorer::new(weights).expect("valid").score("vegan dinner", &rows);
            for row in ranked {
                assert!((0.0..=1.0).contains(&row.relevancy_score));
            }
        }
    }

    #[test]
    fn repeated_candidates_are_memoized() {
        let scorer = Scorer::default();
        let (ranked, computed) = scorer.score_counted(
            "vegan dinner",
            &candidates(&[("Vegan Lunch", 1), ("vegan lunch ", 2), ("Keto", 3)]),
        );
        assert_eq!(ranked.len(), 3);
        assert_eq!(computed, 2);
        let lunch: Vec<f64> = ranked
            .iter()
            .filter(|r| r.normalized_annotation == "vegan lunch")
            .map(|r| r.relevancy_score)
            .collect();
        assert_eq!(lunch[0], lunch[1]);
    }

    #[test]
    fn invalid_weights_rejected() {
        assert!(Scorer::new(Weights::new(0.0, 0.0, 0.0, 0.0)).is_err());
        assert!(Scorer::new(Weights::new(f64::MAX, f64::MAX, f64::MAX, f64::MAX)).is_err());
        assert!(score("a b", &[], Some(Weights::new(-1.0, 1.0, 0.0, 0.0))).is_err());
        assert!(score("a b", &[], None).expect("defaults").is_empty());
    }
}
