//! Append-only audit log
//!
//! One JSON record per line. Writes take an exclusive file lock so a line
//! is never interleaved; the rotation check runs before every write, and
//! a file past the threshold is renamed to `audit-YYYY-MM.jsonl` before
//! the new record lands in a fresh file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fs2::FileExt;
use tracing::info;

use crate::Result;
use crate::config::AuditConfig;

mod types;

pub use types::{AuditAction, AuditEntry, hash_prompt};

/// Append-only JSONL audit logger.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    path: PathBuf,
    rotate_bytes: u64,
}

impl AuditLogger {
    /// Create a logger from the resolved audit configuration.
    #[must_use]
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            path: config.path.clone(),
            rotate_bytes: config.rotate_bytes,
        }
    }

    /// The active log path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, rotating first if the file is past the threshold.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] on filesystem or lock failure.
    pub fn append(&self, entry: &AuditEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.rotate_if_needed()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        let line = serde_json::to_string(entry)?;
        let outcome = writeln!(&file, "{line}");
        let _ = FileExt::unlock(&file);
        outcome?;
        Ok(())
    }

    /// Rename the active file aside once it crosses the threshold.
    fn rotate_if_needed(&self) -> Result<()> {
        let size = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if size < self.rotate_bytes {
            return Ok(());
        }

        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        let stamp = Utc::now().format("%Y-%m");
        let mut rotated = parent.join(format!("audit-{stamp}.jsonl"));
        // A second rotation in the same month picks the next free name.
        let mut n = 1;
        while rotated.exists() {
            n += 1;
            rotated = parent.join(format!("audit-{stamp}.{n}.jsonl"));
        }

        std::fs::rename(&self.path, &rotated)?;
        info!(
            from = %self.path.display(),
            to = %rotated.display(),
            size,
            "audit log rotated"
        );
        Ok(())
    }
}
