//! Query classification
//!
//! Three cooperating classifiers produce `(domain, confidence, signals)`
//! triples that are merged into one ranked list:
//!
//! 1. File-pattern rules on the current file name (deterministic, dominant).
//! 2. A curated keyword dictionary scanned over the lowercased query.
//! 3. Regex rules with explicit confidences.
//!
//! Merge rule: file-pattern signals take the max; keyword signals blend
//! `0.6·existing + 0.4·keyword` on collision; rule signals take the max.

use std::collections::HashMap;

use regex::Regex;
use tracing::warn;

use super::context::ProjectContext;

/// One classified domain with its merged confidence and the raw signals
/// that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainSignal {
    /// Domain word, e.g. `debugging`, `go`
    pub domain: String,
    /// Merged confidence in [0, 1]
    pub confidence: f64,
    /// Contributing signal strings, e.g. `file:.go`, `keyword:error`
    pub signals: Vec<String>,
}

/// Confidence contributed by one file-pattern match.
const FILE_MATCH_CONFIDENCE: f64 = 0.3;

/// Confidence contributed per keyword hit, and its cap.
const KEYWORD_HIT_CONFIDENCE: f64 = 0.1;
const KEYWORD_CAP: f64 = 0.95;

/// File name suffixes and exact names mapped to domains.
const FILE_RULES: &[(&str, &str)] = &[
    (".go", "go"),
    (".rs", "rust"),
    (".py", "python"),
    (".js", "javascript"),
    (".jsx", "javascript"),
    (".ts", "typescript"),
    (".tsx", "typescript"),
    (".rb", "ruby"),
    (".java", "java"),
    (".kt", "android"),
    (".swift", "ios"),
    (".sql", "database"),
    (".tf", "devops"),
    (".css", "web"),
    (".html", "web"),
    ("Dockerfile", "devops"),
    ("docker-compose.yml", "devops"),
    ("_test.go", "testing"),
    (".test.ts", "testing"),
    (".spec.ts", "testing"),
];

/// Curated keyword dictionary, domain first.
const KEYWORD_RULES: &[(&str, &[&str])] = &[
    (
        "debugging",
        &["bug", "crash", "broken", "stacktrace", "panic", "debug"],
    ),
    (
        "error-handling",
        &["error", "errors", "exception", "handle", "handling", "recover"],
    ),
    (
        "testing",
        &["test", "tests", "mock", "assert", "coverage", "fixture"],
    ),
    (
        "refactoring",
        &["refactor", "cleanup", "simplify", "extract", "rename"],
    ),
    (
        "performance",
        &["slow", "performance", "optimize", "latency", "profiling", "benchmark"],
    ),
    (
        "security",
        &["auth", "token", "password", "vulnerability", "encrypt", "sanitize"],
    ),
    (
        "devops",
        &["docker", "kubernetes", "deploy", "pipeline", "terraform", "helm"],
    ),
    (
        "database",
        &["sql", "query", "migration", "postgres", "schema", "transaction"],
    ),
    (
        "api",
        &["endpoint", "rest", "http", "grpc", "request", "response"],
    ),
    ("web", &["css", "html", "frontend", "component", "render"]),
    ("logging", &["log", "logging", "logger", "tracing"]),
    ("concurrency", &["goroutine", "thread", "mutex", "async", "race", "deadlock"]),
    ("go", &["go", "golang", "goroutine"]),
    ("rust", &["rust", "cargo", "borrow"]),
    ("python", &["python", "pip", "django", "flask"]),
    ("javascript", &["javascript", "node", "npm", "react"]),
    ("typescript", &["typescript", "tsx"]),
];

/// Regex rules with explicit confidences.
const REGEX_RULES: &[(&str, &str, f64)] = &[
    (r"error|exception|crash|fail", "debugging", 0.8),
    (r"refactor|clean\s*up|simplif", "refactoring", 0.85),
    (r"\btest(s|ing)?\b|coverage", "testing", 0.7),
    (r"optimi[sz]e|too slow|speed up|memory leak", "performance", 0.8),
    (r"secur|vulnerab|injection|xss", "security", 0.8),
    (r"deploy|rollout|release pipeline", "devops", 0.7),
];

#[derive(Default)]
struct MergeState {
    merged: HashMap<String, DomainSignal>,
}

impl MergeState {
    fn file_signal(&mut self, domain: &str, signal: String) {
        let entry = self
            .merged
            .entry(domain.to_string())
            .or_insert_with(|| DomainSignal {
                domain: domain.to_string(),
                confidence: 0.0,
                signals: Vec::new(),
            });
        entry.confidence = entry.confidence.max(FILE_MATCH_CONFIDENCE);
        entry.signals.push(signal);
    }

    fn keyword_signal(&mut self, domain: &str, confidence: f64, signals: Vec<String>) {
        match self.merged.get_mut(domain) {
            Some(entry) => {
                entry.confidence = 0.6 * entry.confidence + 0.4 * confidence;
                entry.signals.extend(signals);
            }
            None => {
                self.merged.insert(
                    domain.to_string(),
                    DomainSignal {
                        domain: domain.to_string(),
                        confidence,
                        signals,
                    },
                );
            }
        }
    }

    fn rule_signal(&mut self, domain: &str, confidence: f64, signal: String) {
        let entry = self
            .merged
            .entry(domain.to_string())
            .or_insert_with(|| DomainSignal {
                domain: domain.to_string(),
                confidence: 0.0,
                signals: Vec::new(),
            });
        entry.confidence = entry.confidence.max(confidence);
        entry.signals.push(signal);
    }

    fn finish(self) -> Vec<DomainSignal> {
        let mut signals: Vec<DomainSignal> = self.merged.into_values().collect();
        signals.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.domain.cmp(&b.domain))
        });
        signals
    }
}

/// Classify a query in its project context into ranked domains.
#[must_use]
pub fn classify(query: &str, context: &ProjectContext) -> Vec<DomainSignal> {
    let lowered = query.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric() && c != '-' && c != '+')
        .filter(|w| !w.is_empty())
        .collect();

    let mut state = MergeState::default();

    // File-pattern classifier dominates; it is deterministic.
    if let Some(file) = context.file.as_deref() {
        for (suffix, domain) in FILE_RULES {
            if file.ends_with(suffix) {
                state.file_signal(domain, format!("file:{suffix}"));
            }
        }
    }

    // Keyword classifier: each hit contributes 0.1, capped.
    for (domain, keywords) in KEYWORD_RULES {
        let hits: Vec<&&str> = keywords.iter().filter(|kw| words.contains(*kw)).collect();
        if hits.is_empty() {
            continue;
        }
        #[allow(clippy::cast_precision_loss)]
        let confidence = (hits.len() as f64 * KEYWORD_HIT_CONFIDENCE).min(KEYWORD_CAP);
        let signals = hits.iter().map(|kw| format!("keyword:{kw}")).collect();
        state.keyword_signal(domain, confidence, signals);
    }

    // Rule classifier: explicit confidences, max on collision. A broken
    // expression is logged and contributes nothing.
    for (expr, domain, confidence) in REGEX_RULES {
        match Regex::new(expr) {
            Ok(regex) => {
                if regex.is_match(&lowered) {
                    state.rule_signal(domain, *confidence, format!("rule:{domain}"));
                }
            }
            Err(e) => warn!(expr, error = %e, "classifier rule failed to compile"),
        }
    }

    state.finish()
}
