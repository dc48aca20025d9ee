//! Candidate scoring
//!
//! Scores one pattern against `(query, context, domains)` by summing the
//! signal table, then applying the trust and effectiveness multipliers and
//! clamping to [0, 1]. Every contribution is recorded as a reason string
//! so a match can explain itself.

use std::collections::BTreeSet;

use globset::Glob;

use crate::pattern::Pattern;

use super::aliases::domain_matches;
use super::classify::DomainSignal;
use super::context::ProjectContext;

/// Days within which a pattern counts as recently used.
const RECENT_USE_DAYS: i64 = 7;

/// Words too common to carry retrieval signal.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "how", "what", "why", "this", "that", "from", "are", "can",
    "you", "your", "into", "when", "where", "not", "but", "use", "using", "does", "did", "has",
    "have", "was", "were", "will", "would", "should", "could", "about",
];

/// Scored candidate before ranking.
#[derive(Debug, Clone)]
pub struct PatternScore {
    /// Final score, clamped to [0, 1]
    pub score: f64,
    /// Unclamped sum; orders candidates whose clamped scores tie
    pub raw: f64,
    /// Contributing signal strings, e.g. `confirmed-tag:go`
    pub reasons: Vec<String>,
    /// Tags that matched a classified domain
    pub matched_domains: BTreeSet<String>,
}

fn push_reason(reasons: &mut Vec<String>, reason: String) {
    if !reasons.contains(&reason) {
        reasons.push(reason);
    }
}

/// Significant words of a query: length at least 3 and not a stop word.
#[must_use]
pub fn significant_words(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| w.len() >= 3 && !STOP_WORDS.contains(w))
        .map(ToString::to_string)
        .collect()
}

/// Score one pattern against the query, context, and classified domains.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_pattern(
    pattern: &Pattern,
    query: &str,
    context: &ProjectContext,
    domains: &[DomainSignal],
) -> PatternScore {
    let lowered = query.to_lowercase();
    let mut score = 0.0_f64;
    let mut reasons = Vec::new();
    let mut matched_domains = BTreeSet::new();

    // Negative tags are explicit exclusions: one match against a
    // classified domain or context language vetoes the pattern.
    for negative in &pattern.tags.negative {
        let vetoed = domains.iter().any(|d| domain_matches(negative, &d.domain))
            || context
                .languages
                .iter()
                .any(|l| domain_matches(negative, l));
        if vetoed {
            return PatternScore {
                score: 0.0,
                raw: 0.0,
                reasons: vec![format!("negative-tag:{negative}")],
                matched_domains,
            };
        }
    }

    for tag in &pattern.tags.confirmed {
        for signal in domains {
            if domain_matches(tag, &signal.domain) {
                score += 0.5 * signal.confidence;
                push_reason(&mut reasons, format!("domain:{}", signal.domain));
                push_reason(&mut reasons, format!("confirmed-tag:{tag}"));
                matched_domains.insert(tag.clone());
            }
        }
        if let Some(project_type) = context.project_type.as_deref()
            && domain_matches(tag, project_type)
        {
            score += 0.3;
            push_reason(&mut reasons, format!("confirmed-tag:{tag}"));
        }
        for language in &context.languages {
            if domain_matches(tag, language) {
                score += 0.25;
                push_reason(&mut reasons, format!("confirmed-tag:{tag}"));
            }
        }
        for framework in &context.frameworks {
            if tag.eq_ignore_ascii_case(framework) {
                score += 0.25;
                push_reason(&mut reasons, format!("confirmed-tag:{tag}"));
            }
        }
    }

    for inferred in &pattern.tags.inferred {
        for signal in domains {
            if domain_matches(&inferred.tag, &signal.domain) {
                score += 0.2 * inferred.confidence * signal.confidence;
                push_reason(&mut reasons, format!("inferred-tag:{}", inferred.tag));
                matched_domains.insert(inferred.tag.clone());
            }
        }
    }

    for keyword in &pattern.applies.keywords {
        if lowered.contains(&keyword.to_lowercase()) {
            score += 0.2;
            push_reason(&mut reasons, format!("keyword:{keyword}"));
        }
    }
    for language in &pattern.applies.languages {
        if context.languages.iter().any(|l| domain_matches(l, language)) {
            score += 0.25;
            push_reason(&mut reasons, format!("language:{language}"));
        }
    }
    for framework in &pattern.applies.frameworks {
        if context
            .frameworks
            .iter()
            .any(|f| f.eq_ignore_ascii_case(framework))
        {
            score += 0.25;
            push_reason(&mut reasons, format!("framework:{framework}"));
        }
    }
    if let Some(project_name) = context.project_name.as_deref() {
        for glob in &pattern.applies.projects {
            if Glob::new(glob)
                .is_ok_and(|g| g.compile_matcher().is_match(project_name))
            {
                score += 0.4;
                push_reason(&mut reasons, format!("project:{glob}"));
            }
        }
    }

    let words = significant_words(query);
    if !words.is_empty() {
        let haystack = format!(
            "{} {} {} {}",
            pattern.name,
            pattern.description,
            pattern.content,
            pattern
                .tags
                .confirmed
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(" ")
        )
        .to_lowercase();
        let present = words.iter().filter(|w| haystack.contains(*w)).count();
        if present > 0 {
            let fraction = present as f64 / words.len() as f64;
            score += 0.3 * fraction;
            push_reason(&mut reasons, format!("query-words:{present}/{}", words.len()));
        }
    }

    if pattern.used_within_days(RECENT_USE_DAYS) {
        score *= 1.10;
        push_reason(&mut reasons, "recent-use".to_string());
    }

    score *= 1.0 + 0.2 * pattern.security.trust_level.score();
    score *= 1.0 + 0.3 * pattern.learning.effectiveness;

    PatternScore {
        score: score.clamp(0.0, 1.0),
        raw: score,
        reasons,
        matched_domains,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{InferredTag, TrustLevel};
    use crate::retrieval::classify::classify;

    fn go_errors() -> Pattern {
        let mut pattern = Pattern::new(
            "go-errors",
            "Handle errors in Go by wrapping with context.",
        );
        pattern.tags.confirmed.insert("go".to_string());
        pattern.tags.confirmed.insert("error-handling".to_string());
        pattern
    }

    fn go_context() -> ProjectContext {
        ProjectContext {
            languages: vec!["go".to_string()],
            project_type: Some("go".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_hybrid_ranking_scenario() {
        let query = "how do I handle errors in a go service?";
        let context = go_context();
        let domains = classify(query, &context);

        let scored = score_pattern(&go_errors(), query, &context, &domains);
        assert!(scored.score >= 0.6, "expected >= 0.6, got {}", scored.score);
        assert!(scored.reasons.contains(&"confirmed-tag:go".to_string()));
        assert!(
            scored
                .reasons
                .contains(&"confirmed-tag:error-handling".to_string())
        );

        let mut off_topic = Pattern::new("python-retry", "Retry with backoff.");
        off_topic.tags.confirmed.insert("python".to_string());
        off_topic.tags.confirmed.insert("retry".to_string());
        let off_scored = score_pattern(&off_topic, query, &context, &domains);
        assert!(off_scored.score < 0.1);
    }

    #[test]
    fn test_trust_multiplier_orders_equal_patterns() {
        let query = "handle errors in go";
        let context = go_context();
        let domains = classify(query, &context);

        let owner = go_errors();
        let mut community = go_errors();
        community.security.trust_level = TrustLevel::Community;

        // Both saturate the clamp here; the raw sums keep the ordering.
        let owner_score = score_pattern(&owner, query, &context, &domains).raw;
        let community_score = score_pattern(&community, query, &context, &domains).raw;
        assert!(owner_score > community_score);
    }

    #[test]
    fn test_inferred_tag_contribution() {
        let query = "fix the database migration";
        let context = ProjectContext::default();
        let domains = classify(query, &context);

        let mut pattern = Pattern::new("migrations", "Write reversible migrations.");
        pattern.tags.inferred.push(InferredTag {
            tag: "database".to_string(),
            confidence: 0.9,
        });
        let scored = score_pattern(&pattern, query, &context, &domains);
        assert!(scored.score > 0.0);
        assert!(scored.reasons.iter().any(|r| r == "inferred-tag:database"));
        assert!(scored.matched_domains.contains("database"));
    }

    #[test]
    fn test_negative_tag_vetoes() {
        let query = "handle errors in go";
        let context = go_context();
        let domains = classify(query, &context);

        let mut pattern = go_errors();
        pattern.tags.negative.insert("go".to_string());
        let scored = score_pattern(&pattern, query, &context, &domains);
        assert_eq!(scored.score, 0.0);
        assert_eq!(scored.reasons, vec!["negative-tag:go".to_string()]);
    }

    #[test]
    fn test_project_glob_match() {
        let query = "anything";
        let context = ProjectContext {
            project_name: Some("billing-service".to_string()),
            ..Default::default()
        };
        let mut pattern = Pattern::new("billing", "Billing conventions.");
        pattern.applies.projects.push("billing-*".to_string());

        let scored = score_pattern(&pattern, query, &context, &classify(query, &context));
        assert!(scored.reasons.iter().any(|r| r == "project:billing-*"));
        assert!(scored.score > 0.4, "0.4 base times multipliers");
    }

    #[test]
    fn test_recent_use_multiplier() {
        let query = "handle errors in go";
        let context = go_context();
        let domains = classify(query, &context);

        let cold = go_errors();
        let mut warm = go_errors();
        warm.record_usage();

        let cold_scored = score_pattern(&cold, query, &context, &domains);
        let warm_scored = score_pattern(&warm, query, &context, &domains);
        assert!(warm_scored.raw > cold_scored.raw);
        assert!(warm_scored.score <= 1.0);
        assert!(warm_scored.reasons.contains(&"recent-use".to_string()));
    }

    #[test]
    fn test_significant_words() {
        let words = significant_words("How do I handle errors in a go service?");
        assert!(words.contains(&"handle".to_string()));
        assert!(words.contains(&"errors".to_string()));
        assert!(words.contains(&"service".to_string()));
        assert!(!words.contains(&"how".to_string()), "stop word");
        assert!(!words.contains(&"go".to_string()), "too short");
    }
}
