//! Index and query text construction
//!
//! Index text concatenates the fields that carry retrieval signal, in a
//! fixed order with explicit separators, content truncated so the vector
//! stays focused. Query text is expanded for compound words before
//! embedding. Everything is lowercased; a provider's query prefix applies
//! to queries only.

use crate::constants::INDEX_CONTENT_CHARS;
use crate::pattern::Pattern;

/// Inferred tags at or above this confidence join the index text.
const HIGH_CONFIDENCE: f64 = 0.7;

/// Known compound-word prefixes split during query expansion.
const COMPOUND_PREFIXES: &[&str] = &[
    "code", "auto", "web", "pre", "post", "multi", "cross", "type", "micro", "back", "front",
];

/// Build the text embedded for a pattern's index vector.
///
/// Segment order: name, tags (confirmed plus high-confidence inferred),
/// keywords, languages, frameworks, description, truncated content, then
/// optional LLM-expanded search queries.
#[must_use]
pub fn build_index_text(pattern: &Pattern, expansions: Option<&[String]>) -> String {
    let mut segments = vec![pattern.name.clone()];

    let mut tags: Vec<&str> = pattern.tags.confirmed.iter().map(String::as_str).collect();
    tags.extend(
        pattern
            .tags
            .inferred_at_least(HIGH_CONFIDENCE)
            .map(|t| t.tag.as_str()),
    );
    if !tags.is_empty() {
        segments.push(format!("tags: {}", tags.join(", ")));
    }
    if !pattern.applies.keywords.is_empty() {
        segments.push(format!("keywords: {}", pattern.applies.keywords.join(", ")));
    }
    if !pattern.applies.languages.is_empty() {
        segments.push(format!(
            "languages: {}",
            pattern.applies.languages.join(", ")
        ));
    }
    if !pattern.applies.frameworks.is_empty() {
        segments.push(format!(
            "frameworks: {}",
            pattern.applies.frameworks.join(", ")
        ));
    }
    if !pattern.description.is_empty() {
        segments.push(pattern.description.clone());
    }
    segments.push(pattern.content.chars().take(INDEX_CONTENT_CHARS).collect());

    if let Some(expansions) = expansions
        && !expansions.is_empty()
    {
        segments.push(format!("search queries: {}", expansions.join(", ")));
    }

    segments.join(" | ").to_lowercase()
}

/// Build the text embedded for a user query.
///
/// Lowercases the query and appends split forms of compound words so that
/// e.g. "codegen" also matches "code" and "gen".
#[must_use]
pub fn build_query_text(query: &str) -> String {
    let lowered = query.to_lowercase();
    let mut extras = Vec::new();

    for token in lowered.split_whitespace() {
        let token = token.trim_matches(|c: char| !c.is_alphanumeric());
        for prefix in COMPOUND_PREFIXES {
            if let Some(rest) = token.strip_prefix(prefix)
                && rest.len() >= 3
            {
                extras.push((*prefix).to_string());
                extras.push(rest.to_string());
            }
        }
    }

    if extras.is_empty() {
        lowered
    } else {
        format!("{lowered} {}", extras.join(" "))
    }
}

/// Apply a provider's query prefix, if it declares one.
#[must_use]
pub fn apply_query_prefix(prefix: Option<&str>, query_text: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}{query_text}"),
        None => query_text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::InferredTag;

    fn sample_pattern() -> Pattern {
        let mut pattern = Pattern::new("go-errors", "Wrap errors with %w.");
        pattern.description = "Error wrapping".to_string();
        pattern.tags.confirmed.insert("go".to_string());
        pattern.tags.inferred.push(InferredTag {
            tag: "backend".to_string(),
            confidence: 0.9,
        });
        pattern.tags.inferred.push(InferredTag {
            tag: "maybe".to_string(),
            confidence: 0.2,
        });
        pattern.applies.keywords.push("errors".to_string());
        pattern.applies.languages.push("go".to_string());
        pattern
    }

    #[test]
    fn test_index_text_segment_order() {
        let text = build_index_text(&sample_pattern(), None);
        assert!(text.starts_with("go-errors | tags: go, backend | keywords: errors"));
        assert!(text.contains("languages: go"));
        assert!(text.contains("error wrapping"));
        assert!(text.ends_with("wrap errors with %w."));
        assert!(!text.contains("maybe"), "low-confidence tag must not index");
        assert_eq!(text, text.to_lowercase());
    }

    #[test]
    fn test_index_text_truncates_content() {
        let mut pattern = sample_pattern();
        pattern.content = "x".repeat(5000);
        let text = build_index_text(&pattern, None);
        let tail = text.rsplit(" | ").next().unwrap();
        assert_eq!(tail.len(), INDEX_CONTENT_CHARS);
    }

    #[test]
    fn test_index_text_appends_expansions() {
        let expansions = vec!["how to wrap go errors".to_string()];
        let text = build_index_text(&sample_pattern(), Some(&expansions));
        assert!(text.ends_with("search queries: how to wrap go errors"));
    }

    #[test]
    fn test_query_expansion_splits_compounds() {
        let text = build_query_text("Codegen for webhooks");
        assert!(text.starts_with("codegen for webhooks"));
        assert!(text.contains(" code "));
        assert!(text.contains("gen"));
        assert!(text.contains("hooks"));
    }

    #[test]
    fn test_query_without_compounds_unchanged() {
        assert_eq!(build_query_text("Fix the bug"), "fix the bug");
    }

    #[test]
    fn test_query_prefix_applies_to_queries_only() {
        assert_eq!(
            apply_query_prefix(Some("query: "), "find errors"),
            "query: find errors"
        );
        assert_eq!(apply_query_prefix(None, "find errors"), "find errors");
    }
}
