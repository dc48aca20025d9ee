//! Single-file instructions target
//!
//! The entire active set serializes into one `instructions.md`, inside
//! the managed block delimiters. Everything outside the markers belongs
//! to the user and is preserved verbatim.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::Result;
use crate::pattern::Pattern;
use crate::store::yaml::write_atomic;
use crate::sync::events::{CanonicalEvent, EventTable, translate};
use crate::sync::managed::{extract_managed_block, section_names, splice_managed_block};
use crate::sync::target::{SyncTarget, TargetCapabilities};

/// Target concatenating patterns into one instructions file.
pub struct SingleFileTarget {
    name: String,
    dir: PathBuf,
    file_name: String,
    events: EventTable,
    // write_pattern does read-modify-write on one file; serialize them.
    io_lock: Mutex<()>,
}

impl SingleFileTarget {
    /// Create a target writing `instructions.md` under `dir`.
    #[must_use]
    pub fn new(name: impl Into<String>, dir: PathBuf, events: EventTable) -> Self {
        Self {
            name: name.into(),
            dir,
            file_name: "instructions.md".to_string(),
            events,
            io_lock: Mutex::new(()),
        }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    async fn read_existing(&self) -> Result<String> {
        match tokio::fs::read_to_string(self.path()).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn render_section(pattern: &Pattern) -> String {
        format!(
            "### {}\n\n> trust: {} · confidence: {:.2}\n\n{}",
            pattern.name,
            pattern.security.trust_level,
            pattern.learning.effectiveness,
            pattern.content.trim_end()
        )
    }

    /// Upsert or drop one `### <name>` section, keeping sections sorted by
    /// name so a re-sync is byte-identical.
    fn edit_block(existing_block: Option<&str>, name: &str, section: Option<String>) -> String {
        let mut sections: Vec<(String, String)> = Vec::new();
        if let Some(block) = existing_block {
            for chunk in block.split("\n### ") {
                let chunk = chunk.strip_prefix("### ").unwrap_or(chunk);
                if let Some((head, _)) = chunk.split_once('\n') {
                    let section_name = head.trim().to_string();
                    if section_name.is_empty() || chunk.starts_with("## ") {
                        continue;
                    }
                    sections.push((section_name, format!("### {}", chunk.trim_end())));
                } else if !chunk.trim().is_empty() && !chunk.starts_with("## ") {
                    sections.push((chunk.trim().to_string(), format!("### {}", chunk.trim())));
                }
            }
            sections.retain(|(n, _)| !n.is_empty() && n != "Learned Patterns");
        }

        sections.retain(|(n, _)| n != name);
        if let Some(section) = section {
            sections.push((name.to_string(), section));
        }
        sections.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = String::from("## Learned Patterns\n");
        for (_, body) in &sections {
            out.push('\n');
            out.push_str(body.trim_end());
            out.push('\n');
        }
        out.trim_end().to_string()
    }

    async fn rewrite(&self, name: &str, section: Option<String>) -> Result<()> {
        let _guard = self.io_lock.lock().await;
        let existing = self.read_existing().await?;
        let block = Self::edit_block(extract_managed_block(&existing), name, section);
        let spliced = splice_managed_block(&existing, &block);
        write_atomic(&self.path(), spliced.as_bytes()).await
    }
}

#[async_trait]
impl SyncTarget for SingleFileTarget {
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
        self.rewrite(&pattern.name, Some(Self::render_section(pattern)))
            .await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.rewrite(name, None).await
    }

    async fn list_managed(&self) -> Result<Vec<String>> {
        let existing = self.read_existing().await?;
        Ok(extract_managed_block(&existing)
            .map(section_names)
            .unwrap_or_default())
    }

    fn translate_event(&self, event: CanonicalEvent) -> Option<&'static str> {
        translate(self.events, event)
    }
}
