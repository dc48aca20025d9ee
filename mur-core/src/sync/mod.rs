//! Multi-target synchronizer
//!
//! Projects the active pattern set onto every configured target, one
//! target per integrated assistant. Targets run in parallel and fail
//! independently; each sync invocation returns one result per target.
//! Untrusted patterns are excluded from every target and surfaced by
//! name in the report.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use crate::Result;
use crate::cancel::CancellationToken;
use crate::pattern::{Pattern, TrustLevel};

pub mod events;
pub mod managed;
pub mod target;
pub mod targets;

pub use events::{CanonicalEvent, EventTable};
pub use target::{SyncTarget, TargetCapabilities};
pub use targets::{PerPatternTarget, SettingsTarget, SingleFileTarget};

/// Result of syncing one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Target name
    pub target: String,
    /// Whether the target synced fully
    pub success: bool,
    /// Human-readable summary or error
    pub message: String,
    /// Canonical events the target does not support
    pub omitted_events: Vec<String>,
}

/// Result of one sync invocation across all targets.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Per-target outcomes, one per configured target
    pub outcomes: Vec<SyncOutcome>,
    /// Names of patterns excluded because their trust is below the floor
    pub skipped_untrusted: Vec<String>,
}

impl SyncReport {
    /// Whether every target synced fully.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }
}

/// Fan-out writer over the configured targets.
pub struct Synchronizer {
    targets: Vec<Arc<dyn SyncTarget>>,
    min_trust: TrustLevel,
}

impl Synchronizer {
    /// Create a synchronizer over `targets`.
    ///
    /// The default trust floor is community: untrusted patterns never
    /// reach a target.
    #[must_use]
    pub fn new(targets: Vec<Arc<dyn SyncTarget>>) -> Self {
        Self {
            targets,
            min_trust: TrustLevel::Community,
        }
    }

    /// Raise the trust floor; anything below it is skipped and reported.
    #[must_use]
    pub fn with_min_trust(mut self, min_trust: TrustLevel) -> Self {
        // Untrusted is never synced regardless of the configured floor.
        self.min_trust = min_trust.max(TrustLevel::Community);
        self
    }

    /// Sync the pattern set to every target in parallel.
    ///
    /// A target's failure never blocks the others; it becomes an
    /// unsuccessful outcome in the report.
    pub async fn sync_all(&self, patterns: &[Pattern], cancel: &CancellationToken) -> SyncReport {
        let correlation_id = Uuid::new_v4();

        let eligible: Vec<&Pattern> = patterns
            .iter()
            .filter(|p| p.is_active() && p.security.trust_level >= self.min_trust)
            .collect();
        let skipped_untrusted: Vec<String> = patterns
            .iter()
            .filter(|p| p.is_active() && p.security.trust_level < self.min_trust)
            .map(|p| p.name.clone())
            .collect();

        info!(
            correlation_id = %correlation_id,
            targets = self.targets.len(),
            eligible = eligible.len(),
            skipped = skipped_untrusted.len(),
            "sync starting"
        );

        let runs = self.targets.iter().map(|target| {
            let target = Arc::clone(target);
            let eligible = &eligible;
            let cancel = cancel.clone();
            async move {
                match sync_one(target.as_ref(), eligible, &cancel).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(target = target.name(), error = %e, "target sync failed");
                        SyncOutcome {
                            target: target.name().to_string(),
                            success: false,
                            message: e.to_string(),
                            omitted_events: Vec::new(),
                        }
                    }
                }
            }
        });

        let outcomes = join_all(runs).await;
        info!(
            correlation_id = %correlation_id,
            succeeded = outcomes.iter().filter(|o| o.success).count(),
            failed = outcomes.iter().filter(|o| !o.success).count(),
            "sync complete"
        );

        SyncReport {
            outcomes,
            skipped_untrusted,
        }
    }
}

/// Sync one target sequentially: write eligible patterns, clean up stale
/// managed files, register hooks.
async fn sync_one(
    target: &dyn SyncTarget,
    eligible: &[&Pattern],
    cancel: &CancellationToken,
) -> Result<SyncOutcome> {
    let capabilities = target.capabilities();
    let mut written = 0_usize;
    let mut removed = 0_usize;
    let mut omitted_events = Vec::new();

    if capabilities.patterns {
        tokio::fs::create_dir_all(target.directory()).await?;

        for pattern in eligible {
            cancel.check()?;
            target.write_pattern(pattern).await?;
            written += 1;
        }

        // Files that bear our marker but no longer map to an eligible
        // pattern are stale.
        for managed in target.list_managed().await? {
            if !eligible.iter().any(|p| p.name == managed) {
                cancel.check()?;
                target.remove(&managed).await?;
                removed += 1;
            }
        }
    }

    if capabilities.hooks {
        tokio::fs::create_dir_all(target.directory()).await?;

        let mut supported = Vec::new();
        for event in CanonicalEvent::ALL {
            match target.translate_event(event) {
                Some(native) => supported.push((event, native)),
                None => omitted_events.push(event.as_str().to_string()),
            }
        }
        cancel.check()?;
        target.apply_hooks(&supported).await?;
    }

    Ok(SyncOutcome {
        target: target.name().to_string(),
        success: true,
        message: format!("{written} written, {removed} removed"),
        omitted_events,
    })
}
