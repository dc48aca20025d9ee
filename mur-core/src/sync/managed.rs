//! Managed-block splicing for single-file targets
//!
//! The synchronizer owns exactly the region between the start and end
//! markers; everything outside the markers is preserved byte for byte.

use std::collections::BTreeMap;

use crate::constants::{BLOCK_END, BLOCK_START};
use crate::pattern::Pattern;

/// Replace the managed block inside `existing` with `inner`.
///
/// Without existing markers the block is appended, separated by a blank
/// line. Content outside the markers is never touched.
#[must_use]
pub fn splice_managed_block(existing: &str, inner: &str) -> String {
    let block = format!("{BLOCK_START}\n{inner}\n{BLOCK_END}");

    match (existing.find(BLOCK_START), existing.find(BLOCK_END)) {
        (Some(start), Some(end)) if end >= start => {
            let after = &existing[end + BLOCK_END.len()..];
            format!("{}{block}{after}", &existing[..start])
        }
        _ => {
            if existing.is_empty() {
                format!("{block}\n")
            } else if existing.ends_with('\n') {
                format!("{existing}\n{block}\n")
            } else {
                format!("{existing}\n\n{block}\n")
            }
        }
    }
}

/// The text between the markers, if both are present.
#[must_use]
pub fn extract_managed_block(text: &str) -> Option<&str> {
    let start = text.find(BLOCK_START)? + BLOCK_START.len();
    let end = text.find(BLOCK_END)?;
    (end >= start).then(|| text[start..end].trim_matches('\n'))
}

/// Render the managed block body: a `## Learned Patterns` section with one
/// `### <name>` subsection per pattern, sorted by name for idempotence.
#[must_use]
pub fn render_patterns_block(patterns: &[&Pattern]) -> String {
    let sorted: BTreeMap<&str, &Pattern> =
        patterns.iter().map(|p| (p.name.as_str(), *p)).collect();

    let mut out = String::from("## Learned Patterns\n");
    for (name, pattern) in &sorted {
        out.push_str(&format!(
            "\n### {name}\n\n> trust: {} · confidence: {:.2}\n\n{}\n",
            pattern.security.trust_level,
            pattern.learning.effectiveness,
            pattern.content.trim_end()
        ));
    }
    out.trim_end().to_string()
}

/// Names of the `### <name>` subsections inside a managed block body.
#[must_use]
pub fn section_names(block: &str) -> Vec<String> {
    block
        .lines()
        .filter_map(|line| line.strip_prefix("### "))
        .map(|name| name.trim().to_string())
        .collect()
}
