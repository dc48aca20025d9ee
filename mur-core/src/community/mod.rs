//! On-disk cache for remotely fetched patterns
//!
//! Records land as `cache/community/<id>.json` with bookkeeping in a
//! `.cache-meta.json` sidecar. Entries expire after a TTL and the cache
//! holds a size cap, evicting least-recently-used entries first. The
//! network fetch itself lives outside the core; this cache is handed
//! already-fetched records.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::constants::{COMMUNITY_CACHE_MAX_BYTES, COMMUNITY_CACHE_TTL};
use crate::pattern::Pattern;
use crate::store::yaml::write_atomic;

const META_FILE: &str = ".cache-meta.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    size: u64,
    fetched_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
}

/// TTL and size-capped cache of community patterns.
pub struct CommunityCache {
    dir: PathBuf,
    ttl: chrono::Duration,
    max_bytes: u64,
}

impl CommunityCache {
    /// Create a cache under `dir` with the default TTL and size cap.
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            ttl: chrono::Duration::from_std(COMMUNITY_CACHE_TTL)
                .unwrap_or_else(|_| chrono::Duration::days(7)),
            max_bytes: COMMUNITY_CACHE_MAX_BYTES,
        }
    }

    /// Override the TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override the size cap in bytes.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read_meta(&self) -> Result<BTreeMap<String, EntryMeta>> {
        match tokio::fs::read_to_string(self.dir.join(META_FILE)).await {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_meta(&self, meta: &BTreeMap<String, EntryMeta>) -> Result<()> {
        let text = serde_json::to_string_pretty(meta)?;
        write_atomic(&self.dir.join(META_FILE), text.as_bytes()).await
    }

    /// Store a fetched pattern under its community id.
    ///
    /// Eviction runs after the write so the cap holds including the new
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] on filesystem failure.
    pub async fn put(&self, id: &str, pattern: &Pattern) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(pattern)?;
        write_atomic(&self.entry_path(id), &bytes).await?;

        let mut meta = self.read_meta().await?;
        let now = Utc::now();
        meta.insert(
            id.to_string(),
            EntryMeta {
                size: bytes.len() as u64,
                fetched_at: now,
                last_used: now,
            },
        );
        self.evict(&mut meta).await?;
        self.write_meta(&meta).await
    }

    /// Fetch a cached pattern, bumping its last-used stamp.
    ///
    /// An expired or missing entry yields `None`; expiry removes the
    /// file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] on filesystem failure other than a
    /// missing entry.
    pub async fn get(&self, id: &str) -> Result<Option<Pattern>> {
        let mut meta = self.read_meta().await?;
        let Some(entry) = meta.get_mut(id) else {
            return Ok(None);
        };

        if Utc::now() - entry.fetched_at > self.ttl {
            debug!(id, "community cache entry expired");
            meta.remove(id);
            let _ = tokio::fs::remove_file(self.entry_path(id)).await;
            self.write_meta(&meta).await?;
            return Ok(None);
        }
        entry.last_used = Utc::now();

        let pattern = match tokio::fs::read_to_string(self.entry_path(id)).await {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // The file vanished under us; drop the stale meta row.
                meta.remove(id);
                self.write_meta(&meta).await?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        self.write_meta(&meta).await?;
        Ok(Some(pattern))
    }

    /// Remove expired entries; returns how many went.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] on filesystem failure.
    pub async fn purge_expired(&self) -> Result<usize> {
        let mut meta = self.read_meta().await?;
        let now = Utc::now();
        let expired: Vec<String> = meta
            .iter()
            .filter(|(_, e)| now - e.fetched_at > self.ttl)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            meta.remove(id);
            let _ = tokio::fs::remove_file(self.entry_path(id)).await;
        }
        if !expired.is_empty() {
            self.write_meta(&meta).await?;
        }
        Ok(expired.len())
    }

    /// Evict least-recently-used entries until the cap holds.
    async fn evict(&self, meta: &mut BTreeMap<String, EntryMeta>) -> Result<()> {
        let mut total: u64 = meta.values().map(|e| e.size).sum();
        if total <= self.max_bytes {
            return Ok(());
        }

        let mut by_age: Vec<(String, DateTime<Utc>, u64)> = meta
            .iter()
            .map(|(id, e)| (id.clone(), e.last_used, e.size))
            .collect();
        by_age.sort_by_key(|(_, last_used, _)| *last_used);

        for (id, _, size) in by_age {
            if total <= self.max_bytes {
                break;
            }
            meta.remove(&id);
            let _ = tokio::fs::remove_file(self.entry_path(&id)).await;
            total -= size;
            debug!(id, "community cache entry evicted");
        }
        Ok(())
    }
}
