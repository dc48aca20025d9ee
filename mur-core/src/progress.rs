//! Progress reporting for long-running operations
//!
//! Indexing and sync report per-phase and per-item progress to an injected
//! sink. The core only defines the trait; rendering (progress bars, logs)
//! belongs to the caller.

/// Sink receiving progress events from indexing and sync.
///
/// Implementations must be cheap; callbacks run inline on worker tasks.
pub trait ProgressSink: Send + Sync {
    /// A new phase began with `total` items to process.
    fn phase_started(&self, phase: &str, total: usize);

    /// One item finished, successfully or not.
    fn item_finished(&self, phase: &str, item: &str, success: bool);

    /// The phase completed.
    fn phase_finished(&self, phase: &str) {
        let _ = phase;
    }
}

/// Sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn phase_started(&self, _phase: &str, _total: usize) {}

    fn item_finished(&self, _phase: &str, _item: &str, _success: bool) {}
}

/// Sink that forwards events to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn phase_started(&self, phase: &str, total: usize) {
        tracing::debug!(phase, total, "phase started");
    }

    fn item_finished(&self, phase: &str, item: &str, success: bool) {
        tracing::debug!(phase, item, success, "item finished");
    }

    fn phase_finished(&self, phase: &str) {
        tracing::debug!(phase, "phase finished");
    }
}
