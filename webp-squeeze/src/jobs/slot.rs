//! Typed access to the global job slot.
//!
//! The slot is a pointer key (`current_job`) naming a job record
//! (`job:{id}`). The record holds the job together with its queue, so
//! draining items and counting them is a single commit. All
//! read-modify-write cycles go through [`JobSlot::update_record`], which
//! retries on version conflicts up to a configured bound.

use super::{Job, JobError, JobId, JobResult};
use crate::catalog::ItemId;
use crate::store::{self, keys, StateStore, StoreError, Versioned};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Item ids waiting to be processed, front first.
pub type Queue = Vec<ItemId>;

/// A job and its queue as stored under `job:{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// The job.
    #[serde(flatten)]
    pub job: Job,
    /// Items still to process. Empty once the job is terminal.
    #[serde(default)]
    pub queue: Queue,
}

impl JobRecord {
    /// Items still queued.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.queue.len() as u64
    }
}

/// Handle on the job slot and its records.
#[derive(Clone)]
pub struct JobSlot {
    store: Arc<dyn StateStore>,
    max_retries: u32,
}

impl std::fmt::Debug for JobSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSlot")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl JobSlot {
    /// Slot over `store`, giving up after `max_retries` lost races.
    pub fn new(store: Arc<dyn StateStore>, max_retries: u32) -> Self {
        Self {
            store,
            max_retries: max_retries.max(1),
        }
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    /// Configured retry bound.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Id the slot points at.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or the pointer is corrupt.
    pub async fn current_id(&self) -> JobResult<Option<Versioned<JobId>>> {
        Ok(store::read(self.store(), keys::CURRENT_JOB).await?)
    }

    /// Record the slot points at, if both pointer and record exist.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or a record is corrupt.
    pub async fn current_record(&self) -> JobResult<Option<JobRecord>> {
        let Some(pointer) = self.current_id().await? else {
            return Ok(None);
        };
        Ok(self.record(pointer.value).await?.map(|v| v.value))
    }

    /// Job the slot points at.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or a record is corrupt.
    pub async fn current(&self) -> JobResult<Option<Job>> {
        Ok(self.current_record().await?.map(|record| record.job))
    }

    /// Job record and queue by id.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or the record is corrupt.
    pub async fn record(&self, id: JobId) -> JobResult<Option<Versioned<JobRecord>>> {
        Ok(store::read(self.store(), &keys::job(id)).await?)
    }

    /// Job by id.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or the record is corrupt.
    pub async fn job(&self, id: JobId) -> JobResult<Option<Versioned<Job>>> {
        Ok(self.record(id).await?.map(|v| Versioned {
            version: v.version,
            value: v.value.job,
        }))
    }

    /// Queue of a job, `None` if the record is gone.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or the record is corrupt.
    pub async fn queue(&self, id: JobId) -> JobResult<Option<Queue>> {
        Ok(self.record(id).await?.map(|v| v.value.queue))
    }

    /// Number of items still queued for a job. A missing record counts as empty.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or the record is corrupt.
    pub async fn queue_len(&self, id: JobId) -> JobResult<u64> {
        Ok(self.record(id).await?.map_or(0, |v| v.value.remaining()))
    }

    /// Persist the record, then point the slot at it.
    ///
    /// # Errors
    ///
    /// Returns error if either write fails. An unreferenced record is inert.
    pub async fn install(&self, job: &Job, queue: &[ItemId]) -> JobResult<()> {
        let record = JobRecord {
            job: job.clone(),
            queue: queue.to_vec(),
        };
        store::write(self.store(), &keys::job(job.id), &record).await?;
        store::write(self.store(), keys::CURRENT_JOB, &job.id).await?;
        Ok(())
    }

    /// Read-modify-write a job record and its queue in one commit.
    ///
    /// `f` runs against the freshest record on every attempt and may decline
    /// the update by returning `None`. Returns `None` when the record is
    /// missing or the update was declined, otherwise the committed record and
    /// the value produced by `f`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::StateConflict`] when every attempt lost a race, or
    /// the underlying store error.
    pub async fn update_record<R, F>(&self, id: JobId, mut f: F) -> JobResult<Option<(JobRecord, R)>>
    where
        F: FnMut(&mut JobRecord) -> Option<R> + Send,
        R: Send,
    {
        let key = keys::job(id);
        for attempt in 1..=self.max_retries {
            let Some(Versioned { version, mut value }) =
                store::read::<JobRecord>(self.store(), &key).await?
            else {
                return Ok(None);
            };

            let Some(out) = f(&mut value) else {
                return Ok(None);
            };

            match store::swap(self.store(), &key, Some(version), &value).await {
                Ok(_) => return Ok(Some((value, out))),
                Err(StoreError::Conflict { .. }) => {
                    tracing::debug!(key, attempt, "Compare-and-set lost, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(key, retries = self.max_retries, "Giving up after repeated conflicts");
        Err(JobError::StateConflict { key })
    }

    /// Read-modify-write the job part of a record, leaving its queue alone.
    ///
    /// # Errors
    ///
    /// Same as [`JobSlot::update_record`].
    pub async fn update_job<R, F>(&self, id: JobId, mut f: F) -> JobResult<Option<(Job, R)>>
    where
        F: FnMut(&mut Job) -> Option<R> + Send,
        R: Send,
    {
        Ok(self
            .update_record(id, |record| f(&mut record.job))
            .await?
            .map(|(record, out)| (record.job, out)))
    }

    /// Delete a job's record, leaving the pointer alone.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn discard(&self, id: JobId) -> JobResult<()> {
        self.store.delete(&keys::job(id)).await?;
        Ok(())
    }

    /// Remove the record and, if it still names `id`, the slot pointer.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn clear(&self, id: JobId) -> JobResult<()> {
        self.discard(id).await?;

        if let Some(pointer) = self.current_id().await? {
            if pointer.value == id {
                match self
                    .store
                    .compare_and_delete(keys::CURRENT_JOB, pointer.version)
                    .await
                {
                    // a new job took the slot in between
                    Ok(()) | Err(StoreError::Conflict { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Ok(())
    }

    /// Remove the slot pointer regardless of what it names.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn clear_pointer(&self) -> JobResult<()> {
        self.store.delete(keys::CURRENT_JOB).await?;
        Ok(())
    }
}
