//! Pattern metadata type definitions

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trust level of a pattern's source, ordered from untrusted to owner.
///
/// The ordinal is monotonic: comparing two levels compares their scores.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// Failed integrity verification or unknown origin
    #[default]
    Untrusted,
    /// Fetched from the community index
    Community,
    /// Community pattern that passed review
    Verified,
    /// Shared through a team repository
    Team,
    /// Authored on this workstation
    Owner,
}

impl TrustLevel {
    /// Numeric score used as a retrieval multiplier and policy gate.
    #[must_use]
    pub fn score(self) -> f64 {
        match self {
            TrustLevel::Untrusted => 0.0,
            TrustLevel::Community => 0.25,
            TrustLevel::Verified => 0.5,
            TrustLevel::Team => 0.75,
            TrustLevel::Owner => 1.0,
        }
    }
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrustLevel::Untrusted => "untrusted",
            TrustLevel::Community => "community",
            TrustLevel::Verified => "verified",
            TrustLevel::Team => "team",
            TrustLevel::Owner => "owner",
        };
        f.write_str(s)
    }
}

/// Risk classification assigned by review or the content scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// No sensitive operations in the content
    #[default]
    Low,
    /// Content touches credentials, networking, or shell execution
    Medium,
    /// Content matched scanner deny-patterns
    High,
}

/// Lifecycle status; non-active patterns are excluded from retrieval by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PatternStatus {
    /// Eligible for retrieval and sync
    #[default]
    Active,
    /// Kept for reference, no longer injected
    Deprecated,
    /// Retained on disk until the lifecycle manager reaps it
    Archived,
}

/// An automatically inferred tag with its confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredTag {
    /// The tag text
    pub tag: String,
    /// Confidence in [0, 1]; out-of-range values are lint errors
    pub confidence: f64,
}

/// The three disjoint tag buckets of a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Tags {
    /// Human-asserted tags
    #[serde(default)]
    pub confirmed: BTreeSet<String>,
    /// Machine-inferred tags with confidences
    #[serde(default)]
    pub inferred: Vec<InferredTag>,
    /// Explicit exclusions
    #[serde(default)]
    pub negative: BTreeSet<String>,
}

impl Tags {
    /// Inferred tags at or above the given confidence.
    pub fn inferred_at_least(&self, confidence: f64) -> impl Iterator<Item = &InferredTag> {
        self.inferred
            .iter()
            .filter(move |t| t.confidence >= confidence)
    }
}

/// Match conditions controlling where a pattern applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Applies {
    /// Glob file patterns, e.g. `**/*.go`
    #[serde(default)]
    pub files: Vec<String>,
    /// Trigger keywords matched as substrings of the query
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Language tags, e.g. `go`, `rust`
    #[serde(default)]
    pub languages: Vec<String>,
    /// Framework tags, e.g. `axum`, `react`
    #[serde(default)]
    pub frameworks: Vec<String>,
    /// Project name globs
    #[serde(default)]
    pub projects: Vec<String>,
}

/// Integrity and provenance metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Security {
    /// SHA-256 hex of `content`, recomputed on every write
    #[serde(default)]
    pub hash: String,
    /// Free-form source label, e.g. `local`, `community:<author>`
    #[serde(default)]
    pub source: String,
    /// Trust level of the source
    #[serde(default)]
    pub trust_level: TrustLevel,
    /// Whether a human reviewed the content
    #[serde(default)]
    pub reviewed: bool,
    /// Risk classification
    #[serde(default)]
    pub risk: RiskLevel,
    /// Scanner and verifier warnings, appended, never silently dropped
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Learning signals accumulated through use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Learning {
    /// Effectiveness in [0, 1], updated from feedback
    #[serde(default = "default_effectiveness")]
    pub effectiveness: f64,
    /// Number of times the pattern was injected
    #[serde(default)]
    pub usage_count: u64,
    /// Timestamp of the most recent injection
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    /// Where the pattern was extracted from, if machine-extracted
    #[serde(default)]
    pub extracted_from: Option<String>,
}

fn default_effectiveness() -> f64 {
    0.5
}

impl Default for Learning {
    fn default() -> Self {
        Self {
            effectiveness: default_effectiveness(),
            usage_count: 0,
            last_used: None,
            extracted_from: None,
        }
    }
}

/// Lifecycle status and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle {
    /// Current status
    #[serde(default)]
    pub status: PatternStatus,
    /// Creation timestamp, preserved across updates
    pub created: DateTime<Utc>,
    /// Last update timestamp
    pub updated: DateTime<Utc>,
    /// Reason recorded when the pattern was deprecated
    #[serde(default)]
    pub deprecation_reason: Option<String>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            status: PatternStatus::Active,
            created: now,
            updated: now,
            deprecation_reason: None,
        }
    }
}
