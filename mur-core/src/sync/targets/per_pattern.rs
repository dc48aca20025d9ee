//! Per-pattern file target
//!
//! One `learned-<name>.md` per pattern, each opening with the managed
//! marker so cleanup can tell synced files from user-authored ones.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::Result;
use crate::constants::MANAGED_MARKER;
use crate::pattern::Pattern;
use crate::store::yaml::write_atomic;
use crate::sync::events::{CanonicalEvent, EventTable, translate};
use crate::sync::target::{SyncTarget, TargetCapabilities};

/// Target writing one markdown file per pattern.
pub struct PerPatternTarget {
    name: String,
    dir: PathBuf,
    events: EventTable,
}

impl PerPatternTarget {
    /// Create a target for `dir` with the given event table.
    #[must_use]
    pub fn new(name: impl Into<String>, dir: PathBuf, events: EventTable) -> Self {
        Self {
            name: name.into(),
            dir,
            events,
        }
    }

    fn path_for(&self, pattern_name: &str) -> PathBuf {
        self.dir.join(format!("learned-{pattern_name}.md"))
    }

    fn render(pattern: &Pattern) -> String {
        format!(
            "{MANAGED_MARKER}\n# {}\n\n> trust: {} · confidence: {:.2}\n\n{}\n",
            pattern.name,
            pattern.security.trust_level,
            pattern.learning.effectiveness,
            pattern.content.trim_end()
        )
    }
}

#[async_trait]
impl SyncTarget for PerPatternTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn directory(&self) -> &Path {
        &self.dir
    }

    fn capabilities(&self) -> TargetCapabilities {
        TargetCapabilities {
            patterns: true,
            hooks: false,
            skills: false,
        }
    }

    async fn write_pattern(&self, pattern: &Pattern) -> Result<()> {
        write_atomic(&self.path_for(&pattern.name), Self::render(pattern).as_bytes()).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_managed(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(stem) = file_name
                .strip_prefix("learned-")
                .and_then(|s| s.strip_suffix(".md"))
            else {
                continue;
            };
            // Only files we stamped are ours to clean up.
            let text = tokio::fs::read_to_string(entry.path()).await.unwrap_or_default();
            if text.starts_with(MANAGED_MARKER) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn translate_event(&self, event: CanonicalEvent) -> Option<&'static str> {
        translate(self.events, event)
    }
}
