//! Schema validation and linting for pattern records

use crate::constants::{MAX_NAME_LEN, SCHEMA_VERSION};
use crate::{Error, Result};

use super::Pattern;

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintIssue {
    /// Dotted path of the offending field, e.g. `tags.inferred[2].confidence`
    pub field: String,
    /// Human-readable description of the violation
    pub message: String,
}

impl std::fmt::Display for LintIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Collect every schema violation in the record.
///
/// Returns an empty vector for a well-formed pattern.
#[must_use]
pub fn lint(pattern: &Pattern) -> Vec<LintIssue> {
    let mut issues = Vec::new();

    if !valid_name(&pattern.name) {
        issues.push(LintIssue {
            field: "name".to_string(),
            message: format!(
                "must be 1..={MAX_NAME_LEN} characters of [A-Za-z0-9_-], got {:?}",
                pattern.name
            ),
        });
    }

    if pattern.schema_version < SCHEMA_VERSION {
        issues.push(LintIssue {
            field: "schema_version".to_string(),
            message: format!(
                "version {} is read-only; {SCHEMA_VERSION} required for new records",
                pattern.schema_version
            ),
        });
    }

    for (i, inferred) in pattern.tags.inferred.iter().enumerate() {
        if !(0.0..=1.0).contains(&inferred.confidence) {
            issues.push(LintIssue {
                field: format!("tags.inferred[{i}].confidence"),
                message: format!("must lie in [0, 1], got {}", inferred.confidence),
            });
        }
    }

    if !(0.0..=1.0).contains(&pattern.learning.effectiveness) {
        issues.push(LintIssue {
            field: "learning.effectiveness".to_string(),
            message: format!("must lie in [0, 1], got {}", pattern.learning.effectiveness),
        });
    }

    issues
}

/// Validate a record for writing, failing on the first lint batch.
///
/// # Errors
///
/// Returns [`Error::Validation`] listing every issue found.
pub fn validate(pattern: &Pattern) -> Result<()> {
    let issues = lint(pattern);
    if issues.is_empty() {
        Ok(())
    } else {
        let joined = issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(Error::Validation(format!(
            "pattern {:?}: {joined}",
            pattern.name
        )))
    }
}
