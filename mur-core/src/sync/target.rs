//! Sync target adapter contract

use std::path::Path;

use async_trait::async_trait;

use crate::Result;
use crate::pattern::Pattern;

use super::events::CanonicalEvent;

/// What a target can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetCapabilities {
    /// Accepts rendered patterns
    pub patterns: bool,
    /// Accepts hook registrations
    pub hooks: bool,
    /// Accepts skill definitions
    pub skills: bool,
}

/// Adapter projecting patterns and hooks onto one external assistant.
///
/// Implementations are single-threaded per sync run; the synchronizer
/// provides the parallelism across targets. Every write must land
/// atomically (sibling temp file and rename) so a crashed sync never
/// leaves a half-written file.
#[async_trait]
pub trait SyncTarget: Send + Sync {
    /// Stable target name used in sync results.
    fn name(&self) -> &str;

    /// Directory the adapter owns. The adapter may create this directory
    /// but never parents outside it.
    fn directory(&self) -> &Path;

    /// Capability flags.
    fn capabilities(&self) -> TargetCapabilities;

    /// Render and write one pattern at its deterministic path.
    async fn write_pattern(&self, pattern: &Pattern) -> Result<()>;

    /// Remove the rendered form of a pattern that is no longer eligible.
    async fn remove(&self, name: &str) -> Result<()>;

    /// Pattern names currently present in the target that bear the
    /// managed marker. Only these are candidates for cleanup; files the
    /// user authored are invisible to the synchronizer.
    async fn list_managed(&self) -> Result<Vec<String>>;

    /// Translate a canonical event to the tool's native name, or `None`
    /// when the tool does not support it.
    fn translate_event(&self, event: CanonicalEvent) -> Option<&'static str>;

    /// Register translated hooks, `(canonical, native)` pairs.
    ///
    /// Default no-op for targets without hook support.
    async fn apply_hooks(&self, events: &[(CanonicalEvent, &'static str)]) -> Result<()> {
        let _ = events;
        Ok(())
    }
}
