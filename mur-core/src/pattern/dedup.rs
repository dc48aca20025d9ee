//! Similarity-driven duplicate detection
//!
//! All-pairs cosine similarity over the cached vector matrix. Pairs above
//! the threshold are flagged for the user; merging is always an explicit
//! user action, never automatic.

use tracing::debug;

use crate::Result;
use crate::cache::MemoryCache;

/// A pair of patterns whose vectors exceed the duplicate threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateFlag {
    /// Name of the first pattern
    pub a: String,
    /// Name of the second pattern
    pub b: String,
    /// Cosine similarity of their index vectors
    pub similarity: f32,
}

/// Flag near-duplicate pattern pairs above `threshold`.
///
/// Triggers a lazy embedding load if one has not happened yet. Pairs are
/// returned most-similar first.
///
/// # Errors
///
/// Returns an error if the embedding cache cannot be loaded.
pub async fn flag_duplicates(cache: &MemoryCache, threshold: f32) -> Result<Vec<DuplicateFlag>> {
    cache.ensure_embeddings().await?;

    let mut flags: Vec<DuplicateFlag> = cache
        .similar_pairs(threshold)
        .into_iter()
        .filter_map(|(id_a, id_b, similarity)| {
            let a = cache.get(&id_a)?.name;
            let b = cache.get(&id_b)?.name;
            Some(DuplicateFlag { a, b, similarity })
        })
        .collect();

    flags.sort_by(|x, y| {
        y.similarity
            .partial_cmp(&x.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    debug!(count = flags.len(), threshold = f64::from(threshold), "duplicate scan complete");
    Ok(flags)
}
