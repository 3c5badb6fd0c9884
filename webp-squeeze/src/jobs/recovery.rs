//! Repair of stalled and finished jobs.
//!
//! Every administrative entry point calls [`RecoveryMonitor::recover_if_needed`]
//! before doing anything else. The monitor inspects persisted state only, so
//! it is safe to repeat and safe to run after a crash at any point.

use super::{Job, JobManager, JobResult, JobStatus};
use serde::{Deserialize, Serialize};

/// A repair step taken by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// An in-progress job with nothing left to do was marked completed.
    CompletedStalled,
    /// A finished job's history entry was written.
    Logged,
    /// A finished job and its queue were deleted and the slot freed.
    CleanedUp,
    /// The slot pointed at a job record that no longer exists.
    ClearedDanglingPointer,
}

/// What a recovery pass found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// Job as it stood after the pass, even if it was cleaned up.
    pub job: Option<Job>,
    /// Repairs performed, in order.
    pub actions: Vec<RecoveryAction>,
}

impl RecoveryReport {
    /// Nothing needed repairing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }

    /// The slot is free after the pass.
    #[must_use]
    pub fn slot_is_free(&self) -> bool {
        self.job.is_none()
            || self.actions.contains(&RecoveryAction::CleanedUp)
            || self.actions.contains(&RecoveryAction::ClearedDanglingPointer)
    }
}

/// Data-driven repair of the job slot.
#[derive(Debug, Clone)]
pub struct RecoveryMonitor {
    manager: JobManager,
}

impl RecoveryMonitor {
    /// Monitor over the manager's slot and history.
    #[must_use]
    pub const fn new(manager: JobManager) -> Self {
        Self { manager }
    }

    /// Bring the slot into a consistent state.
    ///
    /// In order, within one call:
    /// 1. an in-progress job whose queue is empty is completed
    /// 2. a finished job without a history entry is logged
    /// 3. a finished job flagged for cleanup is deleted with its queue
    ///
    /// Anything else is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails; a later call resumes where this one
    /// stopped.
    pub async fn recover_if_needed(&self) -> JobResult<RecoveryReport> {
        let slot = self.manager.slot();
        let mut report = RecoveryReport::default();

        let Some(pointer) = slot.current_id().await? else {
            return Ok(report);
        };
        let id = pointer.value;

        let Some(mut record) = slot.record(id).await?.map(|v| v.value) else {
            tracing::warn!(job_id = %id, "Slot points at a missing job, clearing it");
            slot.clear(id).await?;
            report.actions.push(RecoveryAction::ClearedDanglingPointer);
            return Ok(report);
        };

        if record.job.is_in_progress() && record.queue.is_empty() {
            let completed = slot
                .update_record(id, |r| {
                    (r.job.is_in_progress() && r.queue.is_empty())
                        .then(|| r.job.finish(JobStatus::Completed))
                })
                .await?;

            match completed {
                Some((updated, ())) => {
                    tracing::info!(
                        job_id = %id,
                        done = updated.job.done,
                        failed = updated.job.failed,
                        total = updated.job.total,
                        "Recovered stalled job with an empty queue"
                    );
                    record = updated;
                    report.actions.push(RecoveryAction::CompletedStalled);
                }
                None => match slot.record(id).await? {
                    Some(current) => record = current.value,
                    None => return Ok(report),
                },
            }
        }

        let mut job = record.job;
        if job.status.is_terminal() && !job.logged {
            job = self.manager.log_finished_job(&job).await?;
            report.actions.push(RecoveryAction::Logged);
        }

        if job.status.is_terminal() && job.cleanup_on_next_visit {
            slot.clear(id).await?;
            tracing::debug!(job_id = %id, status = %job.status, "Cleaned up finished job");
            report.actions.push(RecoveryAction::CleanedUp);
        }

        report.job = Some(job);
        Ok(report)
    }
}
