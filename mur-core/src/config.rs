//! Resolved configuration structures
//!
//! The core never reads configuration files; the surface layer resolves,
//! migrates, and validates them, then hands these structs in. Defaults
//! here are the conventional `~/.mur` layout.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{AUDIT_ROTATE_BYTES, DEFAULT_EMBED_WORKERS, MIN_MATCH_SCORE};

/// Top-level resolved configuration handed to the core at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Root of the mur home directory (conventionally `~/.mur`)
    pub home: PathBuf,
    /// Pattern source directories in priority order; the first wins on
    /// duplicate names
    pub pattern_dirs: Vec<PathBuf>,
    /// Embedding layer settings
    pub embeddings: EmbeddingConfig,
    /// Retrieval engine settings
    pub retrieval: RetrievalConfig,
    /// Audit log settings
    pub audit: AuditConfig,
    /// Path to the embedded analytics database
    pub analytics_path: PathBuf,
}

impl CoreConfig {
    /// Build the conventional layout rooted at `home`.
    #[must_use]
    pub fn with_home(home: PathBuf) -> Self {
        Self {
            pattern_dirs: vec![home.join("patterns"), home.join("repo").join("patterns")],
            embeddings: EmbeddingConfig::with_home(&home),
            retrieval: RetrievalConfig::default(),
            audit: AuditConfig::with_home(&home),
            analytics_path: home.join("analytics.db"),
            home,
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        let home = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mur");
        Self::with_home(home)
    }
}

/// Embedding layer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Registry key of the configured provider, if any
    pub provider: Option<String>,
    /// Path to the vector cache file
    pub cache_path: PathBuf,
    /// Path to the LLM query-expansion sidecar file
    pub expansion_path: PathBuf,
    /// Whether the query-expansion phase runs during indexing
    pub expand_queries: bool,
    /// Worker pool size; some providers require 1 (strict serialization)
    pub workers: usize,
}

impl EmbeddingConfig {
    fn with_home(home: &std::path::Path) -> Self {
        let dir = home.join("embeddings");
        Self {
            provider: None,
            cache_path: dir.join("embeddings.json"),
            expansion_path: dir.join("expanded_queries.json"),
            expand_queries: false,
            workers: DEFAULT_EMBED_WORKERS,
        }
    }
}

/// Retrieval engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum matches returned per query
    pub limit: usize,
    /// Minimum final score for a match to be returned
    pub min_score: f64,
    /// Vector candidates below this score are dropped before fusion
    pub min_vector_score: f32,
    /// Include non-active patterns (off by default)
    pub include_inactive: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            min_score: MIN_MATCH_SCORE,
            min_vector_score: 0.3,
            include_inactive: false,
        }
    }
}

/// Audit log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Path to the active JSONL log
    pub path: PathBuf,
    /// Rotation threshold in bytes
    pub rotate_bytes: u64,
}

impl AuditConfig {
    fn with_home(home: &std::path::Path) -> Self {
        Self {
            path: home.join("audit").join("audit.jsonl"),
            rotate_bytes: AUDIT_ROTATE_BYTES,
        }
    }
}
