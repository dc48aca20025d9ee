//! Project context detection
//!
//! Retrieval quality improves sharply when the engine knows what kind of
//! project the query comes from. Detection inspects well-known manifest
//! files at the project root; it never walks the tree.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

/// Signals describing where a query originates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectContext {
    /// Current file name, if the caller knows one
    pub file: Option<String>,
    /// Display name of the enclosing project
    pub project_name: Option<String>,
    /// Primary project type, e.g. `go`, `rust`
    pub project_type: Option<String>,
    /// Detected languages
    pub languages: Vec<String>,
    /// Detected frameworks
    pub frameworks: Vec<String>,
}

/// Manifest files mapped to the language they indicate.
const MANIFESTS: &[(&str, &str)] = &[
    ("Cargo.toml", "rust"),
    ("go.mod", "go"),
    ("package.json", "javascript"),
    ("tsconfig.json", "typescript"),
    ("pyproject.toml", "python"),
    ("requirements.txt", "python"),
    ("setup.py", "python"),
    ("pom.xml", "java"),
    ("build.gradle", "java"),
    ("build.gradle.kts", "kotlin"),
    ("Gemfile", "ruby"),
    ("composer.json", "php"),
];

/// Frameworks recognized inside a `package.json` dependency table.
const JS_FRAMEWORKS: &[&str] = &[
    "react", "vue", "angular", "next", "svelte", "express", "nestjs",
];

impl ProjectContext {
    /// Detect languages and frameworks from the manifests at `root`.
    #[must_use]
    pub fn detect(root: &Path) -> Self {
        let mut context = Self {
            project_name: root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            ..Default::default()
        };

        for (manifest, language) in MANIFESTS {
            if !root.join(manifest).is_file() {
                continue;
            }
            if !context.languages.iter().any(|l| l == language) {
                context.languages.push((*language).to_string());
            }
            if *manifest == "package.json" {
                context.detect_js_frameworks(&root.join(manifest));
            }
        }

        if root.join("Dockerfile").is_file() || root.join("docker-compose.yml").is_file() {
            context.frameworks.push("docker".to_string());
        }
        if root.join("Cargo.toml").is_file() {
            Self::detect_toml_frameworks(&root.join("Cargo.toml"), &mut context.frameworks);
        }

        context.project_type = context.languages.first().cloned();
        debug!(
            languages = ?context.languages,
            frameworks = ?context.frameworks,
            "project context detected"
        );
        context
    }

    /// Set the current file name.
    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    fn detect_js_frameworks(&mut self, manifest: &Path) {
        let Ok(text) = std::fs::read_to_string(manifest) else {
            return;
        };
        let Ok(json) = serde_json::from_str::<Value>(&text) else {
            return;
        };
        if let Some(name) = json.get("name").and_then(Value::as_str) {
            self.project_name = Some(name.to_string());
        }
        for table in ["dependencies", "devDependencies"] {
            if let Some(deps) = json.get(table).and_then(Value::as_object) {
                for framework in JS_FRAMEWORKS {
                    if deps.keys().any(|k| k == framework || k.ends_with(&format!("/{framework}")))
                        && !self.frameworks.iter().any(|f| f == framework)
                    {
                        self.frameworks.push((*framework).to_string());
                    }
                }
            }
        }
    }

    fn detect_toml_frameworks(manifest: &Path, frameworks: &mut Vec<String>) {
        let Ok(text) = std::fs::read_to_string(manifest) else {
            return;
        };
        for framework in ["axum", "actix-web", "rocket", "tokio", "bevy"] {
            if text.contains(framework) && !frameworks.iter().any(|f| f == framework) {
                frameworks.push(framework.to_string());
            }
        }
    }
}
