//! Reciprocal rank fusion
//!
//! Combines the classifier and vector candidate lists. Each candidate
//! scores the sum of `1 / (k + rank)` over the lists that contain it,
//! with `k = 60`. Ties break on the highest individual list score, then
//! on lexicographic id.

use std::collections::HashMap;

use crate::constants::RRF_K;

/// One fused candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    /// Candidate id
    pub id: String,
    /// Sum of reciprocal ranks across lists
    pub fused: f64,
    /// Highest individual list score, used for tie-breaks and reporting
    pub best_score: f64,
}

/// Fuse ranked `(id, score)` lists by reciprocal rank.
///
/// Input lists must already be sorted best-first; rank is positional,
/// starting at 1.
#[must_use]
pub fn reciprocal_rank_fusion(lists: &[Vec<(String, f64)>]) -> Vec<FusedCandidate> {
    let mut fused: HashMap<String, FusedCandidate> = HashMap::new();

    for list in lists {
        for (rank, (id, score)) in list.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let contribution = 1.0 / (RRF_K + (rank + 1) as f64);
            let entry = fused.entry(id.clone()).or_insert_with(|| FusedCandidate {
                id: id.clone(),
                fused: 0.0,
                best_score: f64::MIN,
            });
            entry.fused += contribution;
            entry.best_score = entry.best_score.max(*score);
        }
    }

    let mut candidates: Vec<FusedCandidate> = fused.into_values().collect();
    candidates.sort_by(|a, b| {
        b.fused
            .partial_cmp(&a.fused)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.best_score
                    .partial_cmp(&a.best_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates
}
