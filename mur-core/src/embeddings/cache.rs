//! On-disk vector cache
//!
//! A single JSON file holding an ordered sequence of embedding records.
//! The lookup key is `name:embedding_hash`, so editing a pattern's content
//! invalidates its old vector by construction. Reads and writes are
//! whole-file; writes land via atomic rename.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::yaml::write_atomic;
use crate::{Error, Result};

/// One cached vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Cache key, `name:embedding_hash`
    pub id: String,
    /// The embedding vector
    pub vector: Vec<f32>,
    /// Model that produced the vector
    pub model_name: String,
    /// When the vector was generated
    pub updated_at: DateTime<Utc>,
}

/// Whole-file vector cache.
#[derive(Debug)]
pub struct EmbeddingCache {
    path: PathBuf,
    records: Vec<EmbeddingRecord>,
}

impl EmbeddingCache {
    /// Load the cache file, or start empty when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Integrity`] when records in the file disagree on
    /// dimensionality — a mixed file must be rejected, not silently used —
    /// and [`Error::Io`]/[`Error::Serialization`] on read or parse failure.
    pub async fn load(path: &Path) -> Result<Self> {
        let records = match tokio::fs::read_to_string(path).await {
            Ok(text) => serde_json::from_str::<Vec<EmbeddingRecord>>(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        if let Some(first) = records.first() {
            let dim = first.vector.len();
            if let Some(bad) = records.iter().find(|r| r.vector.len() != dim) {
                return Err(Error::Integrity(format!(
                    "embedding cache {} mixes dimensionalities: {} has {}, expected {dim}",
                    path.display(),
                    bad.id,
                    bad.vector.len()
                )));
            }
        }

        debug!(path = %path.display(), count = records.len(), "embedding cache loaded");
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    /// Persist the cache atomically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on filesystem failure.
    pub async fn save(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.records)?;
        write_atomic(&self.path, text.as_bytes()).await
    }

    /// The dimensionality of the stored vectors, if any are present.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.records.first().map(|r| r.vector.len())
    }

    /// Number of cached vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the cache holds no vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether a vector exists for the given key.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.records.iter().any(|r| r.id == key)
    }

    /// Fetch a record by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&EmbeddingRecord> {
        self.records.iter().find(|r| r.id == key)
    }

    /// The records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }

    /// Insert or replace the record with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Integrity`] when the vector's dimensionality
    /// disagrees with the records already present.
    pub fn upsert(&mut self, record: EmbeddingRecord) -> Result<()> {
        if let Some(dim) = self.dimension()
            && record.vector.len() != dim
        {
            return Err(Error::Integrity(format!(
                "refusing to mix dimensionalities: {} has {}, cache holds {dim}",
                record.id,
                record.vector.len()
            )));
        }
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
        Ok(())
    }

    /// Remove every record whose key is in `keys`; returns how many went.
    pub fn remove_keys(&mut self, keys: &[String]) -> usize {
        let before = self.records.len();
        self.records.retain(|r| !keys.contains(&r.id));
        before - self.records.len()
    }

    /// Drop records whose key is not in the live set (deleted or re-hashed
    /// patterns); returns how many went.
    pub fn retain_keys<F>(&mut self, live: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let before = self.records.len();
        self.records.retain(|r| live(&r.id));
        before - self.records.len()
    }
}
