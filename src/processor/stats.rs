//! Atomic counters for a processing run.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Statistics from a processing run.
///
/// Tracks completed, failed, retried and memory-skipped invocations with
/// atomic counters so the coordinator and observers can read them without
/// locking.
#[derive(Debug, Default)]
pub struct ProcessingStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    retried: AtomicUsize,
    skipped_memory: AtomicUsize,
}

impl ProcessingStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful invocations.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Failed invocations (operation error, timeout, panic).
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Retry attempts made.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    /// Invocations skipped because memory was short.
    #[must_use]
    pub fn skipped_memory(&self) -> usize {
        self.skipped_memory.load(Ordering::SeqCst)
    }

    /// Completed plus failed plus skipped.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed() + self.skipped_memory()
    }

    pub(crate) fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_skipped_memory(&self) {
        self.skipped_memory.fetch_add(1, Ordering::SeqCst);
    }
}
