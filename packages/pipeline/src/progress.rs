//! Progress reporting for batch analysis.
//!
//! The pipeline only knows about [`ProgressCallback`]; rendering lives in
//! the crates that choose a backend (an `indicatif` bar in the CLI, nothing
//! at all in the HTTP server).

/// Receives progress updates from [`crate::detection::DetectionPipeline::analyze_batch`].
pub trait ProgressCallback: Send + Sync {
    /// Sets the total number of items in the batch.
    fn set_total(&self, total: u64);

    /// Advances progress by `delta` items.
    fn inc(&self, delta: u64);

    /// Updates the message shown alongside the indicator.
    fn set_message(&self, msg: String);

    /// Marks the batch as complete with a summary message.
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
