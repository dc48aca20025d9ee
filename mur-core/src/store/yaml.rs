//! YAML codec for pattern files
//!
//! One pattern maps to one `<name>.yaml` file. Unknown fields survive a
//! round-trip through the flattened `extra` map on [`Pattern`].

use std::path::Path;

use crate::pattern::Pattern;
use crate::{Error, Result};

/// Parse a pattern from YAML text.
///
/// # Errors
///
/// Returns [`Error::Yaml`] when the document is malformed.
pub fn parse_pattern(text: &str) -> Result<Pattern> {
    Ok(serde_yaml::from_str(text)?)
}

/// Render a pattern to YAML text.
///
/// # Errors
///
/// Returns [`Error::Yaml`] on serialization failure.
pub fn render_pattern(pattern: &Pattern) -> Result<String> {
    Ok(serde_yaml::to_string(pattern)?)
}

/// Read and parse one pattern file.
///
/// # Errors
///
/// Returns [`Error::Io`] when the file cannot be read and [`Error::Yaml`]
/// when it cannot be parsed.
pub async fn read_pattern_file(path: &Path) -> Result<Pattern> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_pattern(&text)
}

/// Write a pattern file atomically: serialize, write a sibling temp file,
/// then rename over the destination.
///
/// # Errors
///
/// Returns [`Error::Io`] on filesystem failure.
pub async fn write_pattern_file(path: &Path, pattern: &Pattern) -> Result<()> {
    let text = render_pattern(pattern)?;
    write_atomic(path, text.as_bytes()).await
}

/// Write bytes atomically via a sibling temp file and rename.
///
/// # Errors
///
/// Returns [`Error::Io`] on filesystem failure.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Validation(format!("path {} has no parent", path.display())))?;
    tokio::fs::create_dir_all(parent).await?;

    let tmp = parent.join(format!(
        ".{}.tmp-{}",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        uuid::Uuid::new_v4().simple()
    ));
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
