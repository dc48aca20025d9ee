//! Pattern records and their integrity rules
//!
//! A [`Pattern`] is the central entity of the system: a named,
//! content-addressed record of reusable knowledge with tags, application
//! conditions, and trust metadata. One pattern maps to one YAML file on
//! disk; unknown fields survive a load/store round-trip.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

mod dedup;
mod types;
mod validation;

pub use dedup::{DuplicateFlag, flag_duplicates};
pub use types::{
    Applies, InferredTag, Learning, Lifecycle, PatternStatus, RiskLevel, Security, Tags, TrustLevel,
};
pub use validation::{LintIssue, lint, validate};

use crate::constants::{EMBEDDING_HASH_LEN, SCHEMA_VERSION};

/// A reusable coding pattern with tags, match conditions, and trust metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// Opaque stable identifier (UUID-shaped string)
    #[serde(default)]
    pub id: String,
    /// Unique slug, `[A-Za-z0-9_-]`, at most 64 characters
    pub name: String,
    /// Human-readable summary
    #[serde(default)]
    pub description: String,
    /// The payload shown to an assistant
    #[serde(default)]
    pub content: String,
    /// Confirmed, inferred, and negative tag buckets
    #[serde(default)]
    pub tags: Tags,
    /// Match conditions
    #[serde(default)]
    pub applies: Applies,
    /// Integrity and provenance metadata
    #[serde(default)]
    pub security: Security,
    /// Usage and feedback signals
    #[serde(default)]
    pub learning: Learning,
    /// Status and timestamps
    #[serde(default)]
    pub lifecycle: Lifecycle,
    /// Schema version; current is 2
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// First 16 hex chars of SHA-256(content); the vector cache key
    #[serde(default)]
    pub embedding_hash: String,
    /// Unknown fields preserved across a round-trip
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// SHA-256 of `content` as lowercase hex.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(digest)
}

/// First 16 hex chars of SHA-256(content), the vector cache key component.
#[must_use]
pub fn embedding_hash(content: &str) -> String {
    let mut hash = content_hash(content);
    hash.truncate(EMBEDDING_HASH_LEN);
    hash
}

impl Pattern {
    /// Create a new pattern with store defaults and both hashes computed.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let mut pattern = Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            content,
            tags: Tags::default(),
            applies: Applies::default(),
            security: Security {
                source: "local".to_string(),
                trust_level: TrustLevel::Owner,
                ..Default::default()
            },
            learning: Learning::default(),
            lifecycle: Lifecycle::default(),
            schema_version: SCHEMA_VERSION,
            embedding_hash: String::new(),
            extra: BTreeMap::new(),
        };
        pattern.recompute_hashes();
        pattern
    }

    /// Recompute `security.hash` and `embedding_hash` from the content.
    pub fn recompute_hashes(&mut self) {
        self.security.hash = content_hash(&self.content);
        self.embedding_hash = embedding_hash(&self.content);
    }

    /// Check whether `security.hash` matches the current content.
    #[must_use]
    pub fn hash_matches(&self) -> bool {
        self.security.hash == content_hash(&self.content)
    }

    /// Whether the pattern participates in retrieval and sync.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lifecycle.status == PatternStatus::Active
    }

    /// The vector cache key, `name:embedding_hash`.
    #[must_use]
    pub fn vector_key(&self) -> String {
        format!("{}:{}", self.name, self.embedding_hash)
    }

    /// Record one injection: bump the usage count and the last-used stamp.
    pub fn record_usage(&mut self) {
        self.learning.usage_count += 1;
        self.learning.last_used = Some(Utc::now());
    }

    /// Whether the pattern was used within the given number of days.
    #[must_use]
    pub fn used_within_days(&self, days: i64) -> bool {
        self.learning
            .last_used
            .is_some_and(|t| Utc::now() - t <= chrono::Duration::days(days))
    }
}
