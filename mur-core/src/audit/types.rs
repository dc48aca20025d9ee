//! Audit record types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What happened to a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Injected into an assistant conversation
    Inject,
    /// Loaded from the store
    Load,
    /// Shared outward (team repo, community)
    Share,
    /// Modified on disk
    Modify,
    /// Integrity-verified
    Verify,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::Inject => "inject",
            AuditAction::Load => "load",
            AuditAction::Share => "share",
            AuditAction::Modify => "modify",
            AuditAction::Verify => "verify",
        };
        f.write_str(s)
    }
}

/// SHA-256 hex of a prompt. The plaintext never reaches the log.
#[must_use]
pub fn hash_prompt(prompt: &str) -> String {
    hex::encode(Sha256::digest(prompt.as_bytes()))
}

/// One append-only audit record, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the event happened
    pub timestamp: DateTime<Utc>,
    /// Id of the pattern involved
    pub pattern_id: String,
    /// Name of the pattern involved
    pub pattern_name: String,
    /// What happened
    pub action: AuditAction,
    /// Component that produced the event
    pub source: String,
    /// Target tool, when the event concerns a specific assistant
    #[serde(default)]
    pub tool_target: Option<String>,
    /// SHA-256 hex of the triggering prompt, when one exists
    #[serde(default)]
    pub prompt_hash: Option<String>,
    /// Free-form structured details
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl AuditEntry {
    /// Create an entry stamped now.
    #[must_use]
    pub fn new(
        action: AuditAction,
        pattern_id: impl Into<String>,
        pattern_name: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            pattern_id: pattern_id.into(),
            pattern_name: pattern_name.into(),
            action,
            source: source.into(),
            tool_target: None,
            prompt_hash: None,
            details: BTreeMap::new(),
        }
    }

    /// Set the target tool.
    #[must_use]
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool_target = Some(tool.into());
        self
    }

    /// Hash and attach the triggering prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt_hash = Some(hash_prompt(prompt));
        self
    }

    /// Attach one structured detail.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_hash_is_sha256_hex() {
        let hash = hash_prompt("how do I wrap errors?");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_prompt("how do I wrap errors?"));
        assert_ne!(hash, hash_prompt("a different prompt"));
    }

    #[test]
    fn test_entry_never_carries_plaintext() {
        let entry = AuditEntry::new(AuditAction::Inject, "id-1", "go-errors", "retrieval")
            .with_tool("claude")
            .with_prompt("secret prompt text");

        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("secret prompt text"));
        assert_eq!(entry.prompt_hash.as_ref().unwrap().len(), 64);
    }

    #[test]
    fn test_action_serde_names() {
        assert_eq!(
            serde_json::to_string(&AuditAction::Inject).unwrap(),
            "\"inject\""
        );
        let back: AuditAction = serde_json::from_str("\"verify\"").unwrap();
        assert_eq!(back, AuditAction::Verify);
    }
}
