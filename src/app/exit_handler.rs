//! Exit code logic for the downhub process.
//!
//! Single responsibility: map failure counts to the process exit outcome.

use crate::ProcessExit;

/// Determines the process exit outcome from the failure count of a run.
///
/// Hard failures (bad configuration, unreachable site) never get here; they
/// map to [`ProcessExit::Failure`] directly.
pub(crate) fn determine_exit_outcome(failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else {
        ProcessExit::Partial
    }
}
