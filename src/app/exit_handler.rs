//! Exit code logic for the regfetch process.
//!
//! Single responsibility: map run counters to the process exit outcome.

use crate::ProcessExit;

/// Exit code after a second interrupt (128 + SIGINT).
pub(crate) const FORCED_EXIT_CODE: i32 = 130;

/// Determines the process exit outcome.
///
/// A run fails when no agency produced a document or when it was interrupted.
pub(crate) fn determine_exit_outcome(documents_retrieved: usize, interrupted: bool) -> ProcessExit {
    if documents_retrieved == 0 || interrupted {
        ProcessExit::Failure
    } else {
        ProcessExit::Success
    }
}
