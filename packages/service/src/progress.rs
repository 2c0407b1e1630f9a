//! Progress reporting for multi-day runs.
//!
//! The service reports one unit per processed day. Rendering is left to
//! the caller: the CLI draws an `indicatif` bar, tests pass [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from [`crate::IndexService::backfill`].
///
/// Implementations must be `Send + Sync` so a single reporter can be shared
/// through an `Arc`.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of days in the run.
    fn set_total(&self, total: u64);

    /// Advances by `delta` days.
    fn inc(&self, delta: u64);

    /// Updates the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the run complete with a summary.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
