//! Job lifecycle: creation, inspection, cancellation and logging.

use super::{
    HistoryLog, Job, JobError, JobRecord, JobResult, JobSlot, JobStatus, JobType, Progress,
};
use crate::catalog::{CatalogQuery, ItemId};
use std::collections::HashSet;
use std::sync::Arc;

/// Creates, inspects and cancels the job occupying the slot.
#[derive(Clone)]
pub struct JobManager {
    slot: JobSlot,
    catalog: Arc<dyn CatalogQuery>,
    history: HistoryLog,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("slot", &self.slot)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

impl JobManager {
    /// Manager over a slot, a catalog and a history log.
    pub fn new(slot: JobSlot, catalog: Arc<dyn CatalogQuery>, history: HistoryLog) -> Self {
        Self {
            slot,
            catalog,
            history,
        }
    }

    /// The job slot.
    #[must_use]
    pub const fn slot(&self) -> &JobSlot {
        &self.slot
    }

    /// The history log.
    #[must_use]
    pub const fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Parse `job_type` and create a job.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidJobType`] before any I/O if the type is not
    /// `full` or `retry`, otherwise see [`JobManager::create`].
    pub async fn create_job(&self, job_type: &str) -> JobResult<Job> {
        let job_type: JobType = job_type.parse()?;
        self.create(job_type).await
    }

    /// Select candidates and install a new in-progress job.
    ///
    /// The caller must make sure no job is in progress. A job found in the
    /// slot anyway is replaced and its records are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NoItemsFound`] without writing anything when the
    /// catalog has no candidates, or a store/catalog error.
    pub async fn create(&self, job_type: JobType) -> JobResult<Job> {
        let candidates = self
            .catalog
            .find_candidates(job_type.selection_mode())
            .await?;

        let mut seen = HashSet::new();
        let queue: Vec<ItemId> = candidates
            .into_iter()
            .filter(|item| seen.insert(item.clone()))
            .collect();

        if queue.is_empty() {
            tracing::info!(job_type = %job_type, "No candidates for optimization job");
            return Err(JobError::NoItemsFound);
        }

        let previous = self.slot.current().await?;
        if let Some(previous) = &previous {
            if previous.is_in_progress() {
                tracing::warn!(
                    previous_job = %previous.id,
                    done = previous.done,
                    total = previous.total,
                    "Replacing a job that is still in progress"
                );
            }
        }

        let job = Job::new(job_type, queue.len() as u64);
        self.slot.install(&job, &queue).await?;

        if let Some(previous) = previous {
            self.slot.discard(previous.id).await?;
        }

        tracing::info!(job_id = %job.id, job_type = %job.job_type, total = job.total, "Created optimization job");
        Ok(job)
    }

    /// Fail with [`JobError::JobAlreadyRunning`] if a job is in progress.
    ///
    /// # Errors
    ///
    /// See above, or a store error.
    pub async fn ensure_idle(&self) -> JobResult<()> {
        match self.slot.current().await? {
            Some(job) if job.is_in_progress() => Err(JobError::JobAlreadyRunning),
            _ => Ok(()),
        }
    }

    /// Progress of the job in the slot.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NoActiveJob`] if the slot is empty.
    pub async fn progress(&self) -> JobResult<Progress> {
        let record = self
            .slot
            .current_record()
            .await?
            .ok_or(JobError::NoActiveJob)?;
        Ok(Progress::new(&record.job, record.remaining()))
    }

    /// Cancel the in-progress job.
    ///
    /// The queue is emptied in the same commit that marks the job cancelled,
    /// so no later batch picks up work; items already converted keep their
    /// outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NoActiveJob`] unless a job is in progress.
    pub async fn cancel_job(&self) -> JobResult<Job> {
        let job = self
            .slot
            .current()
            .await?
            .filter(Job::is_in_progress)
            .ok_or(JobError::NoActiveJob)?;

        let (JobRecord { job, .. }, ()) = self
            .slot
            .update_record(job.id, |record| {
                record.job.is_in_progress().then(|| {
                    record.queue.clear();
                    record.job.finish(JobStatus::Cancelled);
                })
            })
            .await?
            .ok_or(JobError::NoActiveJob)?;

        tracing::info!(job_id = %job.id, done = job.done, failed = job.failed, total = job.total, "Cancelled optimization job");
        self.log_finished_job(&job).await
    }

    /// Write the history entry for a terminal job and set its `logged` flag.
    ///
    /// Safe to repeat: the log ignores jobs it already holds.
    ///
    /// # Errors
    ///
    /// Returns error if the history or job record cannot be written.
    pub async fn log_finished_job(&self, job: &Job) -> JobResult<Job> {
        self.history.log_completed_job(job).await?;

        let updated = self
            .slot
            .update_job(job.id, |j| (!j.logged).then(|| j.logged = true))
            .await?;

        Ok(updated.map_or_else(
            || Job {
                logged: true,
                ..job.clone()
            },
            |(job, ())| job,
        ))
    }
}
