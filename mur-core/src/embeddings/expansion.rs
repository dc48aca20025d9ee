//! LLM query expansion
//!
//! An optional indexing phase asks a text generator to propose likely
//! search queries per pattern. Expansions live in a sidecar file keyed by
//! pattern name; a generator error skips that pattern and is never fatal
//! to the run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::Result;
use crate::constants::MAX_EXPANSION_QUERIES;
use crate::pattern::Pattern;
use crate::store::yaml::write_atomic;

/// Text generator proposing search queries for a pattern.
///
/// Concrete implementations (an LLM provider) live outside the core.
#[async_trait]
pub trait QueryExpander: Send + Sync {
    /// Propose up to [`MAX_EXPANSION_QUERIES`] likely search queries.
    async fn expand(&self, pattern: &Pattern) -> Result<Vec<String>>;
}

/// Sidecar store of expansions keyed by pattern name.
#[derive(Debug)]
pub struct ExpansionStore {
    path: PathBuf,
    entries: BTreeMap<String, Vec<String>>,
}

impl ExpansionStore {
    /// Load the sidecar, or start empty when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`]/[`crate::Error::Serialization`] on read
    /// or parse failure.
    pub async fn load(path: &Path) -> Result<Self> {
        let entries = match tokio::fs::read_to_string(path).await {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Persist the sidecar atomically.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] on filesystem failure.
    pub async fn save(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.entries)?;
        write_atomic(&self.path, text.as_bytes()).await
    }

    /// Expansions recorded for a pattern name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Record expansions for a pattern, truncated to the cap.
    pub fn set(&mut self, name: &str, mut queries: Vec<String>) {
        queries.truncate(MAX_EXPANSION_QUERIES);
        self.entries.insert(name.to_string(), queries);
    }

    /// Remove entries for patterns that no longer exist.
    pub fn retain_names<F>(&mut self, live: F)
    where
        F: Fn(&str) -> bool,
    {
        self.entries.retain(|name, _| live(name));
    }

    /// Number of patterns with recorded expansions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the sidecar holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
