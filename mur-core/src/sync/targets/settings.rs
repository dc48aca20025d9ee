//! Structured JSON settings target
//!
//! Merges hook registrations into a tool's `settings.json` under the
//! top-level `hooks` key, leaving every sibling key untouched. This
//! target carries no patterns; it exists for tools that learn about the
//! layer through their hook configuration.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use crate::constants::MANAGED_MARKER;
use crate::pattern::Pattern;
use crate::store::yaml::write_atomic;
use crate::sync::events::{CanonicalEvent, EventTable, translate};
use crate::sync::target::{SyncTarget, TargetCapabilities};
use crate::{Error, Result};

/// Target merging hooks into a settings JSON file.
pub struct SettingsTarget {
    name: String,
    dir: PathBuf,
    file_name: String,
    events: EventTable,
    /// Command template; `{event}` is replaced with the canonical name.
    command: String,
    io_lock: Mutex<()>,
}

impl SettingsTarget {
    /// Create a target writing `settings.json` under `dir`.
    #[must_use]
    pub fn new(name: impl Into<String>, dir: PathBuf, events: EventTable) -> Self {
        Self {
            name: name.into(),
            dir,
            file_name: "settings.json".to_string(),
            events,
            command: "mur hook {event}".to_string(),
            io_lock: Mutex::new(()),
        }
    }

    /// Override the hook command template.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    async fn read_settings(&self) -> Result<Map<String, Value>> {
        match tokio::fs::read_to_string(self.path()).await {
            Ok(text) => match serde_json::from_str::<Value>(&text)? {
                Value::Object(map) => Ok(map),
                other => Err(Error::Validation(format!(
                    "settings file {} holds {other:?}, expected an object",
                    self.path().display()
                ))),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SyncTarget for SettingsTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn directory(&self) -> &Path {
        &self.dir
    }

    fn capabilities(&self) -> TargetCapabilities {
        TargetCapabilities {
            patterns: false,
            hooks: true,
            skills: false,
        }
    }

    async fn write_pattern(&self, _pattern: &Pattern) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn list_managed(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn translate_event(&self, event: CanonicalEvent) -> Option<&'static str> {
        translate(self.events, event)
    }

    async fn apply_hooks(&self, events: &[(CanonicalEvent, &'static str)]) -> Result<()> {
        let _guard = self.io_lock.lock().await;
        let mut settings = self.read_settings().await?;

        let hooks = settings
            .entry("hooks".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(hooks) = hooks else {
            return Err(Error::Validation(format!(
                "settings file {} has a non-object hooks key",
                self.path().display()
            )));
        };

        for (canonical, native) in events {
            hooks.insert(
                (*native).to_string(),
                json!({
                    "command": self.command.replace("{event}", canonical.as_str()),
                    "comment": MANAGED_MARKER,
                }),
            );
        }

        let text = serde_json::to_string_pretty(&Value::Object(settings))?;
        write_atomic(&self.path(), text.as_bytes()).await
    }
}
