//! Domain alias table
//!
//! The matcher treats specific synonyms as equivalent. The table is closed:
//! adding a synonym is a code change, not configuration.

const ALIAS_GROUPS: &[&[&str]] = &[
    &["swift", "ios", "macos"],
    &["go", "golang"],
    &["js", "javascript", "node", "nodejs"],
    &["ts", "typescript"],
    &["py", "python"],
    &["rust", "rs"],
    &["k8s", "kubernetes"],
    &["postgres", "postgresql"],
    &["cpp", "c++"],
    &["shell", "bash", "sh"],
];

/// Canonical representative of a domain word, lowercased.
#[must_use]
pub fn canonical(domain: &str) -> String {
    let lowered = domain.to_lowercase();
    for group in ALIAS_GROUPS {
        if group.contains(&lowered.as_str()) {
            return group[0].to_string();
        }
    }
    lowered
}

/// Whether two domain words are equal up to the alias table.
#[must_use]
pub fn domain_matches(a: &str, b: &str) -> bool {
    canonical(a) == canonical(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_are_symmetric() {
        assert!(domain_matches("golang", "go"));
        assert!(domain_matches("go", "golang"));
        assert!(domain_matches("ios", "macos"));
        assert!(domain_matches("node", "javascript"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(domain_matches("Go", "GOLANG"));
    }

    #[test]
    fn test_non_aliases_do_not_match() {
        assert!(!domain_matches("go", "rust"));
        assert!(!domain_matches("python", "javascript"));
    }
}
