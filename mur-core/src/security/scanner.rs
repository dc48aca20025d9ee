//! Prompt-injection scanner
//!
//! A pipeline of deny-patterns applied to pattern content before it is
//! written. Each rule carries an action: `Reject` fails the write,
//! `Strip` removes the matched text (the caller re-hashes), `Warn`
//! records a warning on the record, `Log` only traces.

use regex::Regex;
use tracing::{debug, warn};

use crate::{Error, Result};

/// What happens when a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyAction {
    /// Fail the write with a security error
    Reject,
    /// Remove the matched text and continue
    Strip,
    /// Accept the content but append a warning to the record
    Warn,
    /// Accept silently, trace only
    Log,
}

/// One deny-pattern in the pipeline.
#[derive(Debug, Clone)]
pub struct DenyRule {
    /// Compiled pattern matched against the content
    pub pattern: Regex,
    /// Action taken on match
    pub action: DenyAction,
    /// Short label used in errors and warnings
    pub label: &'static str,
}

/// Result of scanning one content body.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Content after any `Strip` rewrites
    pub content: String,
    /// Warnings to append to the record's security metadata
    pub warnings: Vec<String>,
    /// Whether any rule rewrote the content
    pub stripped: bool,
}

/// Ordered pipeline of deny-patterns.
pub struct PromptScanner {
    rules: Vec<DenyRule>,
}

impl PromptScanner {
    /// Build a scanner from an explicit rule pipeline.
    #[must_use]
    pub fn new(rules: Vec<DenyRule>) -> Self {
        Self { rules }
    }

    /// The built-in rule set covering common injection phrasings.
    ///
    /// # Panics
    ///
    /// Does not panic; every built-in expression is a valid regex.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn builtin() -> Self {
        let rule = |expr: &str, action: DenyAction, label: &'static str| DenyRule {
            pattern: Regex::new(expr).unwrap(),
            action,
            label,
        };
        Self::new(vec![
            rule(
                r"(?i)ignore\s+(all\s+)?(previous|prior|above)\s+instructions",
                DenyAction::Reject,
                "instruction-override",
            ),
            rule(
                r"(?i)disregard\s+(your|the)\s+(system\s+)?prompt",
                DenyAction::Reject,
                "prompt-override",
            ),
            rule(
                r"(?i)you\s+are\s+now\s+(in\s+)?(developer|jailbreak|dan)\s+mode",
                DenyAction::Reject,
                "mode-override",
            ),
            rule(
                r"(?i)(curl|wget)\s+https?://\S+\s*\|\s*(ba)?sh",
                DenyAction::Reject,
                "pipe-to-shell",
            ),
            rule(
                r"(?i)<\s*(system|assistant)\s*>",
                DenyAction::Strip,
                "role-tag",
            ),
            rule(
                r"(?i)do\s+not\s+(tell|inform|alert)\s+the\s+user",
                DenyAction::Warn,
                "concealment",
            ),
            rule(
                r"(?i)(api[_-]?key|secret|password)\s*[:=]\s*\S+",
                DenyAction::Warn,
                "credential-material",
            ),
            rule(r"(?i)base64\s*-d", DenyAction::Log, "base64-decode"),
        ])
    }

    /// Run the pipeline over `content`.
    ///
    /// Rules are applied in order; a `Strip` rewrites the working copy that
    /// later rules see.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Security`] when a `Reject` rule matches.
    pub fn scan(&self, content: &str) -> Result<ScanOutcome> {
        let mut outcome = ScanOutcome {
            content: content.to_string(),
            ..Default::default()
        };

        for rule in &self.rules {
            if !rule.pattern.is_match(&outcome.content) {
                continue;
            }
            match rule.action {
                DenyAction::Reject => {
                    warn!(rule = rule.label, "content rejected by scanner");
                    return Err(Error::Security(format!(
                        "content matched deny-pattern {:?}",
                        rule.label
                    )));
                }
                DenyAction::Strip => {
                    outcome.content = rule
                        .pattern
                        .replace_all(&outcome.content, "")
                        .into_owned();
                    outcome.stripped = true;
                    outcome
                        .warnings
                        .push(format!("scanner stripped {:?} content", rule.label));
                }
                DenyAction::Warn => {
                    outcome
                        .warnings
                        .push(format!("scanner flagged {:?} content", rule.label));
                }
                DenyAction::Log => {
                    debug!(rule = rule.label, "scanner observed low-risk match");
                }
            }
        }

        Ok(outcome)
    }
}

impl Default for PromptScanner {
    fn default() -> Self {
        Self::builtin()
    }
}
