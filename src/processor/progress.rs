//! Progress reporting for processing runs.

use serde::Serialize;

/// Which phase of a run produced an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum ProgressPhase {
    /// First pass over all chunks.
    Initial,
    /// Serial retry pass, 1-indexed.
    Retry {
        /// Pass number.
        pass: u32,
    },
}

/// Per-document detail attached to a progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressDetails {
    /// Position of the document in the submitted list.
    pub index: usize,
    /// Document identifier.
    pub identifier: String,
    /// Whether the invocation succeeded.
    pub succeeded: bool,
    /// Phase that produced the update.
    pub phase: ProgressPhase,
}

/// One progress report. `current` never decreases within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    /// Documents finished so far in the initial pass.
    pub current: usize,
    /// Documents submitted.
    pub total: usize,
    /// Human-readable status line.
    pub message: String,
    /// Document detail, when the update concerns one document.
    pub details: Option<ProgressDetails>,
}

/// Receiver of progress updates. Called from the coordinating task, in
/// completion order.
pub trait ProgressSink: Send + Sync {
    /// Handles one update.
    fn on_progress(&self, update: &ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn on_progress(&self, update: &ProgressUpdate) {
        self(update);
    }
}

/// Sink that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}
