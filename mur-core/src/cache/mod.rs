//! In-process memory cache
//!
//! O(1) access to patterns and vectors. Patterns load eagerly on
//! construction; embeddings load eagerly or on first use depending on the
//! `lazy` option, behind a one-shot latch so concurrent first callers
//! share both the work and the error. Readers see the snapshot of the
//! last completed load; every returned pattern is a value copy.
//!
//! The cache is process-wide state but never an ambient singleton: it is
//! constructed once at startup and passed by reference into consumers.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::embeddings::EmbeddingCache;
use crate::pattern::Pattern;
use crate::store::PatternStore;
use crate::{Error, Result};

mod matrix;

pub use matrix::EmbeddingMatrix;

/// Construction options for the cache.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Pattern source directories in priority order; the first wins on
    /// duplicate ids
    pub dirs: Vec<PathBuf>,
    /// Path of the embedding cache file
    pub embeddings_path: PathBuf,
    /// Expected vector dimensionality; 0 accepts whatever the file holds
    pub dimension: usize,
    /// Defer the embedding load until first use
    pub lazy: bool,
    /// Disable the cache entirely; every lookup comes back empty
    pub disabled: bool,
}

/// Counters describing the current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Patterns in the snapshot
    pub patterns: usize,
    /// Vector rows in the matrix, 0 before the embedding load
    pub vectors: usize,
    /// Matrix dimensionality, 0 before the embedding load
    pub dimension: usize,
}

#[derive(Default)]
struct Snapshot {
    patterns: HashMap<String, Pattern>,
    by_name: HashMap<String, String>,
    tag_index: HashMap<String, Vec<String>>,
    loaded_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    fn build(patterns: Vec<Pattern>) -> Self {
        let mut snapshot = Self {
            loaded_at: Some(Utc::now()),
            ..Default::default()
        };
        for pattern in patterns {
            let id = pattern.id.clone();
            if snapshot.patterns.contains_key(&id) {
                debug!(id = %id, "dropping duplicate id from later directory");
                continue;
            }
            snapshot.by_name.insert(pattern.name.to_lowercase(), id.clone());
            for tag in &pattern.tags.confirmed {
                snapshot
                    .tag_index
                    .entry(tag.to_lowercase())
                    .or_default()
                    .push(id.clone());
            }
            for inferred in &pattern.tags.inferred {
                snapshot
                    .tag_index
                    .entry(inferred.tag.to_lowercase())
                    .or_default()
                    .push(id.clone());
            }
            snapshot.patterns.insert(id, pattern);
        }
        snapshot
    }
}

/// Thread-safe snapshot cache of patterns and vectors.
pub struct MemoryCache {
    options: CacheOptions,
    snapshot: RwLock<Snapshot>,
    matrix: RwLock<Option<EmbeddingMatrix>>,
    // One-shot load latch: the mutex serializes the first load, the stored
    // result hands the same outcome to every waiter.
    embed_latch: tokio::sync::Mutex<()>,
    embed_state: RwLock<Option<std::result::Result<(), String>>>,
}

impl MemoryCache {
    /// Construct the cache, loading patterns eagerly.
    ///
    /// Embeddings load here too unless `lazy` is set.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from the pattern directories and, when loading
    /// eagerly, embedding cache errors.
    pub async fn load(options: CacheOptions) -> Result<Self> {
        let cache = Self {
            snapshot: RwLock::new(Snapshot::default()),
            matrix: RwLock::new(None),
            embed_latch: tokio::sync::Mutex::new(()),
            embed_state: RwLock::new(None),
            options,
        };
        if cache.options.disabled {
            return Ok(cache);
        }

        cache.reload().await?;
        if !cache.options.lazy {
            cache.ensure_embeddings().await?;
        }
        Ok(cache)
    }

    /// Reload patterns from disk; the snapshot swap is atomic for readers.
    ///
    /// Also resets the embedding latch so the next use reloads vectors
    /// against the fresh pattern set.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from the pattern directories.
    pub async fn reload(&self) -> Result<()> {
        if self.options.disabled {
            return Ok(());
        }
        let patterns = PatternStore::new(self.options.dirs.clone()).list().await?;
        let snapshot = Snapshot::build(patterns);
        debug!(patterns = snapshot.patterns.len(), "cache snapshot loaded");

        *self.snapshot.write() = snapshot;
        *self.matrix.write() = None;
        *self.embed_state.write() = None;
        Ok(())
    }

    /// Load embeddings exactly once; concurrent first callers share the
    /// work and the error.
    ///
    /// # Errors
    ///
    /// Replays the first load's error to every caller until a reload.
    pub async fn ensure_embeddings(&self) -> Result<()> {
        if self.options.disabled {
            return Ok(());
        }
        if let Some(state) = self.embed_state.read().clone() {
            return state.map_err(|msg| Error::Io(std::io::Error::other(msg)));
        }

        let _guard = self.embed_latch.lock().await;
        // A concurrent caller may have finished the load while this one
        // waited on the latch.
        if let Some(state) = self.embed_state.read().clone() {
            return state.map_err(|msg| Error::Io(std::io::Error::other(msg)));
        }

        let outcome = self.load_embeddings().await;
        let state = match &outcome {
            Ok(()) => Ok(()),
            Err(e) => Err(e.to_string()),
        };
        *self.embed_state.write() = Some(state);
        outcome
    }

    async fn load_embeddings(&self) -> Result<()> {
        let file = EmbeddingCache::load(&self.options.embeddings_path).await?;
        let dim = match (self.options.dimension, file.dimension()) {
            (0, Some(dim)) => dim,
            (0, None) => 0,
            (expected, Some(dim)) if dim != expected => {
                return Err(Error::Integrity(format!(
                    "embedding cache dimensionality {dim} does not match configured {expected}"
                )));
            }
            (expected, _) => expected,
        };

        let mut matrix = EmbeddingMatrix::new(dim);
        {
            let snapshot = self.snapshot.read();
            for pattern in snapshot.patterns.values() {
                if let Some(record) = file.get(&pattern.vector_key()) {
                    matrix.push(pattern.id.clone(), &record.vector)?;
                } else {
                    debug!(name = %pattern.name, "no current vector for pattern");
                }
            }
        }

        debug!(rows = matrix.len(), dim, "embedding matrix ready");
        *self.matrix.write() = Some(matrix);
        Ok(())
    }

    /// Whether the embedding matrix has been loaded successfully.
    #[must_use]
    pub fn embeddings_loaded(&self) -> bool {
        matches!(self.embed_state.read().as_ref(), Some(Ok(())))
    }

    /// Number of patterns in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.read().patterns.len()
    }

    /// Whether the snapshot holds no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot.read().patterns.is_empty()
    }

    /// When the snapshot was last loaded.
    #[must_use]
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.read().loaded_at
    }

    /// Fetch a pattern by id, as a value copy.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Pattern> {
        self.snapshot.read().patterns.get(id).cloned()
    }

    /// Fetch a pattern by name, case-insensitively.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<Pattern> {
        let snapshot = self.snapshot.read();
        let id = snapshot.by_name.get(&name.to_lowercase())?;
        snapshot.patterns.get(id).cloned()
    }

    /// Every pattern carrying the tag (confirmed or inferred).
    #[must_use]
    pub fn by_tag(&self, tag: &str) -> Vec<Pattern> {
        let snapshot = self.snapshot.read();
        snapshot
            .tag_index
            .get(&tag.to_lowercase())
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| snapshot.patterns.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every pattern in the snapshot.
    #[must_use]
    pub fn all(&self) -> Vec<Pattern> {
        self.snapshot.read().patterns.values().cloned().collect()
    }

    /// Top-k patterns by vector similarity, loading embeddings on demand.
    ///
    /// A query whose dimensionality disagrees with the matrix yields an
    /// empty result.
    ///
    /// # Errors
    ///
    /// Returns the shared embedding-load error, if the load failed.
    pub async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(Pattern, f32)>> {
        if self.options.disabled {
            return Ok(Vec::new());
        }
        self.ensure_embeddings().await?;

        let hits = {
            let matrix = self.matrix.read();
            match matrix.as_ref() {
                Some(matrix) => matrix.search(query, top_k),
                None => Vec::new(),
            }
        };

        let snapshot = self.snapshot.read();
        Ok(hits
            .into_iter()
            .filter_map(|(id, score)| snapshot.patterns.get(&id).cloned().map(|p| (p, score)))
            .collect())
    }

    /// All-pairs similarity at or above `threshold` over the loaded matrix.
    ///
    /// Call [`ensure_embeddings`](Self::ensure_embeddings) first; without a
    /// loaded matrix the result is empty.
    #[must_use]
    pub fn similar_pairs(&self, threshold: f32) -> Vec<(String, String, f32)> {
        let matrix = self.matrix.read();
        match matrix.as_ref() {
            Some(matrix) => matrix.similar_pairs(threshold),
            None => {
                warn!("similar_pairs called before embeddings loaded");
                Vec::new()
            }
        }
    }

    /// Snapshot counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let matrix = self.matrix.read();
        CacheStats {
            patterns: self.len(),
            vectors: matrix.as_ref().map_or(0, EmbeddingMatrix::len),
            dimension: matrix.as_ref().map_or(0, EmbeddingMatrix::dim),
        }
    }
}
