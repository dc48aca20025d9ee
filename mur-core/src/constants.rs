//! Shared constants for the mur core
//!
//! Timeouts, size limits, and scoring constants used across subsystems.
//! Values that callers may need to tune live in [`crate::config`] instead.

use std::time::Duration;

/// Current pattern schema version; older records load read-only
pub const SCHEMA_VERSION: u32 = 2;

/// Maximum pattern name length in characters
pub const MAX_NAME_LEN: usize = 64;

/// Characters of content included in the embedding index text
pub const INDEX_CONTENT_CHARS: usize = 1000;

/// Hex characters of SHA-256 kept as the embedding cache key prefix
pub const EMBEDDING_HASH_LEN: usize = 16;

/// Maximum LLM-proposed search queries persisted per pattern
pub const MAX_EXPANSION_QUERIES: usize = 7;

/// Reciprocal rank fusion constant; robust across list sizes and fixed by design
pub const RRF_K: f64 = 60.0;

/// Minimum final score for a retrieval match to be returned
pub const MIN_MATCH_SCORE: f64 = 0.1;

/// Default worker pool size for embedding generation
pub const DEFAULT_EMBED_WORKERS: usize = 4;

/// Timeout for a single embedding call
pub const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a query-expansion call
pub const EXPANSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for local liveness probes
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Audit log rotation threshold in bytes (10 MiB)
pub const AUDIT_ROTATE_BYTES: u64 = 10 * 1024 * 1024;

/// Community cache entry time-to-live (7 days)
pub const COMMUNITY_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Community cache size cap in bytes (50 MiB)
pub const COMMUNITY_CACHE_MAX_BYTES: u64 = 50 * 1024 * 1024;

/// Cosine similarity above which two patterns are flagged as duplicates
pub const DUPLICATE_THRESHOLD: f32 = 0.92;

/// Marker prefix identifying files the synchronizer owns in a target directory
pub const MANAGED_MARKER: &str = "<!-- managed by mur -->";

/// Start delimiter of the managed block in single-file targets
pub const BLOCK_START: &str = "<!-- mur:start -->";

/// End delimiter of the managed block in single-file targets
pub const BLOCK_END: &str = "<!-- mur:end -->";
