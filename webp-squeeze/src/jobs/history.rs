//! Rolling log of finished optimization runs.
//!
//! The log lives under `optimization_log` as a most-recent-first array capped
//! at a configured length. Each appended entry is mirrored into
//! `last_run_summary` and its `saved_bytes` are added to the monotonic
//! `total_saved_bytes` counter.

use super::{Job, JobError, JobId, JobResult, JobStatus, JobType};
use crate::store::{self, keys, StateStore, StoreError, Versioned};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Job the entry summarizes.
    pub job_id: JobId,
    /// When the entry was logged.
    pub date: DateTime<Utc>,
    /// Kind of run.
    pub job_type: JobType,
    /// `completed` or `cancelled`.
    pub outcome: JobStatus,
    /// Items converted by this run.
    pub optimized: u64,
    /// Items that failed in this run.
    pub failed: u64,
    /// Bytes saved by this run.
    pub saved_bytes: u64,
}

impl HistoryEntry {
    /// Summarize a terminal job.
    #[must_use]
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            date: Utc::now(),
            job_type: job.job_type,
            outcome: job.status,
            optimized: job.done,
            failed: job.failed,
            saved_bytes: job.saved_bytes,
        }
    }

    /// Check if this entry passes `filter`.
    #[must_use]
    pub fn matches(&self, filter: &HistoryFilter) -> bool {
        filter.job_type.is_none_or(|t| t == self.job_type)
            && filter.since.is_none_or(|since| self.date >= since)
            && filter.until.is_none_or(|until| self.date <= until)
    }
}

/// Criteria for [`HistoryLog::page`]. Empty criteria match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    /// Only runs of this type.
    pub job_type: Option<JobType>,
    /// Only entries logged at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only entries logged at or before this instant.
    pub until: Option<DateTime<Utc>>,
}

/// One page of history, most recent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    /// Entries on this page.
    pub entries: Vec<HistoryEntry>,
    /// 1-indexed page number.
    pub page: usize,
    /// Requested page size.
    pub page_size: usize,
    /// Entries matching the filter across all pages.
    pub total_entries: usize,
    /// Number of pages.
    pub total_pages: usize,
}

/// Persisted run history and the aggregate savings counter.
#[derive(Clone)]
pub struct HistoryLog {
    store: Arc<dyn StateStore>,
    cap: usize,
    max_retries: u32,
}

impl std::fmt::Debug for HistoryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryLog")
            .field("cap", &self.cap)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl HistoryLog {
    /// Log over `store` keeping at most `cap` entries.
    pub fn new(store: Arc<dyn StateStore>, cap: usize, max_retries: u32) -> Self {
        Self {
            store,
            cap: cap.max(1),
            max_retries: max_retries.max(1),
        }
    }

    /// Maximum number of retained entries.
    #[must_use]
    pub const fn cap(&self) -> usize {
        self.cap
    }

    /// Record a terminal job.
    ///
    /// Returns `false` if an entry for the job already exists, in which case
    /// neither the summary nor the counter is touched.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::StateConflict`] if the log keeps changing
    /// underneath us, or the underlying store error.
    pub async fn log_completed_job(&self, job: &Job) -> JobResult<bool> {
        let entry = HistoryEntry::from_job(job);

        let mut appended = false;
        for _ in 0..self.max_retries {
            let current = store::read::<Vec<HistoryEntry>>(self.store(), keys::OPTIMIZATION_LOG).await?;
            let (version, mut entries) =
                current.map_or((None, Vec::new()), |v| (Some(v.version), v.value));

            if entries.iter().any(|e| e.job_id == job.id) {
                tracing::debug!(job_id = %job.id, "History entry already present");
                return Ok(false);
            }

            entries.insert(0, entry.clone());
            entries.truncate(self.cap);

            match store::swap(self.store(), keys::OPTIMIZATION_LOG, version, &entries).await {
                Ok(_) => {
                    appended = true;
                    break;
                }
                Err(StoreError::Conflict { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        if !appended {
            return Err(JobError::StateConflict {
                key: keys::OPTIMIZATION_LOG.to_string(),
            });
        }

        store::write(self.store(), keys::LAST_RUN_SUMMARY, &entry).await?;
        let total = self.add_saved_bytes(entry.saved_bytes).await?;

        tracing::info!(
            job_id = %job.id,
            job_type = %job.job_type,
            outcome = %job.status,
            optimized = entry.optimized,
            failed = entry.failed,
            saved_bytes = entry.saved_bytes,
            total_saved_bytes = total,
            "Logged optimization run"
        );

        Ok(true)
    }

    /// All entries, most recent first.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or the log is corrupt.
    pub async fn entries(&self) -> JobResult<Vec<HistoryEntry>> {
        Ok(store::read::<Vec<HistoryEntry>>(self.store(), keys::OPTIMIZATION_LOG)
            .await?
            .map(|v| v.value)
            .unwrap_or_default())
    }

    /// Get paginated history with an optional filter.
    ///
    /// `page` is 1-indexed; page 0 is treated as page 1. A `page_size` of 0
    /// yields empty pages.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or the log is corrupt.
    pub async fn page(
        &self,
        page: usize,
        page_size: usize,
        filter: &HistoryFilter,
    ) -> JobResult<HistoryPage> {
        let filtered: Vec<HistoryEntry> = self
            .entries()
            .await?
            .into_iter()
            .filter(|entry| entry.matches(filter))
            .collect();

        let total_entries = filtered.len();
        let page = page.max(1);
        let start = (page - 1).saturating_mul(page_size);
        let entries = filtered
            .into_iter()
            .skip(start)
            .take(page_size)
            .collect();

        Ok(HistoryPage {
            entries,
            page,
            page_size,
            total_entries,
            total_pages: total_entries.div_ceil(page_size.max(1)),
        })
    }

    /// Most recent run, from the log head or the summary record.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or a record is corrupt.
    pub async fn last_run(&self) -> JobResult<Option<HistoryEntry>> {
        if let Some(head) = self.entries().await?.into_iter().next() {
            return Ok(Some(head));
        }
        Ok(store::read::<HistoryEntry>(self.store(), keys::LAST_RUN_SUMMARY)
            .await?
            .map(|v| v.value))
    }

    /// Bytes saved by every logged run.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or the counter is corrupt.
    pub async fn total_saved_bytes(&self) -> JobResult<u64> {
        Ok(store::read::<u64>(self.store(), keys::TOTAL_SAVED_BYTES)
            .await?
            .map_or(0, |v| v.value))
    }

    /// Delete the rolling log. The summary and counter are kept.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn clear_log(&self) -> JobResult<()> {
        self.store.delete(keys::OPTIMIZATION_LOG).await?;
        tracing::info!("Cleared optimization history");
        Ok(())
    }

    fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    async fn add_saved_bytes(&self, bytes: u64) -> JobResult<u64> {
        for _ in 0..self.max_retries {
            let current = store::read::<u64>(self.store(), keys::TOTAL_SAVED_BYTES).await?;
            let (version, total) = current.map_or((None, 0), |Versioned { version, value }| {
                (Some(version), value)
            });
            let next = total.saturating_add(bytes);

            match store::swap(self.store(), keys::TOTAL_SAVED_BYTES, version, &next).await {
                Ok(_) => return Ok(next),
                Err(StoreError::Conflict { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Err(JobError::StateConflict {
            key: keys::TOTAL_SAVED_BYTES.to_string(),
        })
    }
}
