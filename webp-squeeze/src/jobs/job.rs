//! Job record and related types.

use super::JobError;
use crate::catalog::SelectionMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Create a new random job ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<JobId> for Uuid {
    fn from(id: JobId) -> Self {
        id.0
    }
}

/// Kind of optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Convert every item without a WebP derivative.
    Full,
    /// Re-attempt items whose last conversion failed.
    Retry,
}

impl JobType {
    /// Catalog selection for this job type.
    #[must_use]
    pub const fn selection_mode(self) -> SelectionMode {
        match self {
            Self::Full => SelectionMode::Unoptimized,
            Self::Retry => SelectionMode::Failed,
        }
    }

    /// Wire name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Retry => "retry",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobType {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("full") {
            Ok(Self::Full)
        } else if s.eq_ignore_ascii_case("retry") {
            Ok(Self::Retry)
        } else {
            Err(JobError::InvalidJobType(s.to_string()))
        }
    }
}

/// Lifecycle state of a job. An idle system has no job record at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Batches are still being processed.
    InProgress,
    /// The queue drained.
    Completed,
    /// An operator stopped the job.
    Cancelled,
}

impl JobStatus {
    /// Check if the job is in a terminal state (completed or cancelled).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Get a human-readable status name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Persisted job record, stored under `job:{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier.
    pub id: JobId,
    /// Kind of run.
    pub job_type: JobType,
    /// Lifecycle state.
    pub status: JobStatus,
    /// Items queued at creation.
    pub total: u64,
    /// Items converted successfully.
    pub done: u64,
    /// Items whose conversion failed.
    pub failed: u64,
    /// Bytes saved by this run's successful items.
    pub saved_bytes: u64,
    /// When the job was created.
    pub start_time: DateTime<Utc>,
    /// When the job reached a terminal state.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Terminal job waiting for the recovery monitor to remove it.
    #[serde(default)]
    pub cleanup_on_next_visit: bool,
    /// A history entry has been written for this job.
    #[serde(default)]
    pub logged: bool,
}

impl Job {
    /// Fresh in-progress job over `total` queued items.
    #[must_use]
    pub fn new(job_type: JobType, total: u64) -> Self {
        Self {
            id: JobId::new(),
            job_type,
            status: JobStatus::InProgress,
            total,
            done: 0,
            failed: 0,
            saved_bytes: 0,
            start_time: Utc::now(),
            finished_at: None,
            cleanup_on_next_visit: false,
            logged: false,
        }
    }

    /// Items attempted so far.
    #[must_use]
    pub const fn processed(&self) -> u64 {
        self.done + self.failed
    }

    /// Whether batches may still run.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.status == JobStatus::InProgress
    }

    /// Move to a terminal state and schedule cleanup.
    pub fn finish(&mut self, status: JobStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.cleanup_on_next_visit = true;
        self.finished_at = Some(Utc::now());
    }
}

/// Snapshot returned by `GetProgress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Job identifier.
    pub job_id: JobId,
    /// Kind of run.
    pub job_type: JobType,
    /// Lifecycle state.
    pub status: JobStatus,
    /// Items converted successfully.
    pub done: u64,
    /// Items that failed.
    pub failed: u64,
    /// Items queued at creation.
    pub total: u64,
    /// Items still queued.
    pub remaining: u64,
    /// The job will be removed on the next administrative call.
    pub cleanup_pending: bool,
}

impl Progress {
    /// Snapshot of `job` with `remaining` queued items.
    #[must_use]
    pub const fn new(job: &Job, remaining: u64) -> Self {
        Self {
            job_id: job.id,
            job_type: job.job_type,
            status: job.status,
            done: job.done,
            failed: job.failed,
            total: job.total,
            remaining,
            cleanup_pending: job.cleanup_on_next_visit,
        }
    }

    /// Completed share of the job in percent.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = (self.done + self.failed).saturating_mul(100) / self.total;
        u8::try_from(pct.min(100)).unwrap_or(100)
    }
}
