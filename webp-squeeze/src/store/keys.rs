//! Key layout shared by the engine and the reference adapters

use crate::jobs::JobId;

/// Pointer to the job occupying the global slot.
pub const CURRENT_JOB: &str = "current_job";

/// Rolling history log, most recent first.
pub const OPTIMIZATION_LOG: &str = "optimization_log";

/// Mirror of the most recent history entry.
pub const LAST_RUN_SUMMARY: &str = "last_run_summary";

/// Monotonic aggregate of bytes saved across all logged jobs.
pub const TOTAL_SAVED_BYTES: &str = "total_saved_bytes";

/// Job record key. The record carries the job's queue.
#[must_use]
pub fn job(id: JobId) -> String {
    format!("job:{id}")
}

/// Per-item outcome key used by catalog adapters.
#[must_use]
pub fn item(id: &str) -> String {
    format!("item:{id}")
}
