//! Progress UI (bar) for processing runs.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use regfetch_core::{ProgressSink, ProgressUpdate};

/// Progress bar driven by processor updates. Hidden when not requested.
pub(crate) struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub(crate) fn new(use_bar: bool, total: usize) -> Self {
        if !use_bar {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_bar} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarProgress {
    fn on_progress(&self, update: &ProgressUpdate) {
        self.bar.set_length(update.total as u64);
        self.bar.set_position(update.current as u64);
        self.bar.set_message(update.message.clone());
    }
}
