//! Chunked, resumable batch processing.

use super::{Job, JobError, JobManager, JobRecord, JobResult, JobStatus};
use crate::catalog::{ItemCodec, ItemId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Smallest accepted batch.
pub const MIN_BATCH_SIZE: usize = 1;

/// Largest accepted batch.
pub const MAX_BATCH_SIZE: usize = 50;

/// Clamp a caller-supplied batch size to `[MIN_BATCH_SIZE, MAX_BATCH_SIZE]`.
#[must_use]
pub fn clamp_batch_size(requested: i64) -> usize {
    let clamped = requested.clamp(MIN_BATCH_SIZE as i64, MAX_BATCH_SIZE as i64);
    usize::try_from(clamped).unwrap_or(MIN_BATCH_SIZE)
}

/// Result of one `ProcessBatch` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Items handed to the codec in this call.
    pub processed: usize,
    /// Items still queued.
    pub remaining: u64,
    /// Job status after the call.
    pub status: JobStatus,
    /// Job-wide success counter.
    pub done: u64,
    /// Job-wide failure counter.
    pub failed: u64,
}

/// Counter changes produced by one batch.
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    done: u64,
    failed: u64,
    saved_bytes: u64,
}

impl Tally {
    const fn is_empty(&self) -> bool {
        self.done == 0 && self.failed == 0
    }

    fn record(&mut self, outcome: Option<u64>) {
        match outcome {
            Some(bytes) => {
                self.done += 1;
                self.saved_bytes = self.saved_bytes.saturating_add(bytes);
            }
            None => self.failed += 1,
        }
    }

    fn apply(&self, job: &mut Job) {
        job.done = job.done.saturating_add(self.done);
        job.failed = job.failed.saturating_add(self.failed);
        job.saved_bytes = job.saved_bytes.saturating_add(self.saved_bytes);
    }
}

/// Pulls bounded slices off the queue and converts them one at a time.
#[derive(Clone)]
pub struct BatchRunner {
    manager: JobManager,
    codec: Arc<dyn ItemCodec>,
    quality: u8,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("quality", &self.quality)
            .finish_non_exhaustive()
    }
}

impl BatchRunner {
    /// Runner converting at `quality`.
    pub fn new(manager: JobManager, codec: Arc<dyn ItemCodec>, quality: u8) -> Self {
        Self {
            manager,
            codec,
            quality,
        }
    }

    /// Quality passed to the codec.
    #[must_use]
    pub const fn quality(&self) -> u8 {
        self.quality
    }

    /// Process up to `batch_size` queued items of the in-progress job.
    ///
    /// Items are converted strictly in queue order. A codec failure is
    /// counted and logged but never aborts the batch. Removing the items
    /// from the queue, counting them and completing the job is one commit,
    /// and only items still queued at that point are counted, so concurrent
    /// callers cannot push `done + failed` past `total`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NoActiveJob`] if no job is in progress or its
    /// queue is empty, [`JobError::StateConflict`] on sustained contention,
    /// or a store error.
    pub async fn process_batch(&self, batch_size: i64) -> JobResult<BatchReport> {
        let size = clamp_batch_size(batch_size);
        let slot = self.manager.slot();

        let JobRecord { job, queue } = slot
            .current_record()
            .await?
            .filter(|record| record.job.is_in_progress() && !record.queue.is_empty())
            .ok_or(JobError::NoActiveJob)?;

        let slice: Vec<ItemId> = queue.into_iter().take(size).collect();
        tracing::debug!(job_id = %job.id, batch = slice.len(), "Processing batch");

        let mut outcomes: HashMap<&ItemId, Option<u64>> = HashMap::with_capacity(slice.len());
        for item in &slice {
            match self.codec.transcode(item, self.quality).await {
                Ok(transcoded) => {
                    tracing::debug!(job_id = %job.id, item = %item, bytes_saved = transcoded.bytes_saved, "Item optimized");
                    outcomes.insert(item, Some(transcoded.bytes_saved));
                }
                Err(failure) => {
                    tracing::warn!(job_id = %job.id, item = %item, reason = %failure, "Item failed");
                    outcomes.insert(item, None);
                }
            }
        }

        let committed = slot
            .update_record(job.id, |record| {
                if !record.job.is_in_progress() {
                    return None;
                }

                let mut tally = Tally::default();
                record.queue.retain(|item| match outcomes.get(item) {
                    Some(outcome) => {
                        tally.record(*outcome);
                        false
                    }
                    None => true,
                });
                tally.apply(&mut record.job);

                let completes = record.queue.is_empty();
                if completes {
                    record.job.finish(JobStatus::Completed);
                }
                (completes || !tally.is_empty()).then_some(completes)
            })
            .await?;

        let (job, remaining) = match committed {
            Some((record, true)) => {
                tracing::info!(
                    job_id = %record.job.id,
                    done = record.job.done,
                    failed = record.job.failed,
                    saved_bytes = record.job.saved_bytes,
                    "Optimization job completed"
                );
                (self.manager.log_finished_job(&record.job).await?, 0)
            }
            Some((record, false)) => {
                let remaining = record.remaining();
                (record.job, remaining)
            }
            None => match slot.record(job.id).await? {
                Some(current) => {
                    let remaining = current.value.remaining();
                    (current.value.job, remaining)
                }
                None => (job, 0),
            },
        };

        Ok(BatchReport {
            processed: slice.len(),
            remaining,
            status: job.status,
            done: job.done,
            failed: job.failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CodecFailure, MemoryLibrary, MockItemCodec, Transcoded};
    use crate::jobs::{HistoryLog, JobSlot};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use tokio::sync::OnceCell;

    fn setup(library: &MemoryLibrary, codec: Arc<dyn ItemCodec>) -> (JobManager, BatchRunner) {
        let store = Arc::new(MemoryStore::new());
        let manager = JobManager::new(
            JobSlot::new(store.clone(), 8),
            Arc::new(library.clone()),
            HistoryLog::new(store, 20, 8),
        );
        let runner = BatchRunner::new(manager.clone(), codec, 80);
        (manager, runner)
    }

    #[test]
    fn test_clamp_batch_size() {
        assert_eq!(clamp_batch_size(0), 1);
        assert_eq!(clamp_batch_size(-7), 1);
        assert_eq!(clamp_batch_size(10), 10);
        assert_eq!(clamp_batch_size(51), 50);
        assert_eq!(clamp_batch_size(i64::MAX), 50);
    }

    #[tokio::test]
    async fn test_oversized_batch_is_clamped() {
        let items: Vec<String> = (0..60).map(|n| format!("img-{n}.jpg")).collect();
        let library = MemoryLibrary::with_items(items);
        let (manager, runner) = setup(&library, Arc::new(library.clone()));
        manager.create_job("full").await.unwrap();

        let report = runner.process_batch(1000).await.unwrap();
        assert_eq!(report.processed, 50);
        assert_eq!(report.remaining, 10);
    }

    #[tokio::test]
    async fn test_codec_receives_quality_in_order() {
        let library = MemoryLibrary::with_items(["a", "b", "c"]);
        let mut codec = MockItemCodec::new();
        let mut seq = mockall::Sequence::new();
        for expected in ["a", "b"] {
            codec
                .expect_transcode()
                .withf(move |item, quality| item.as_str() == expected && *quality == 80)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_, _| Ok(Transcoded { bytes_saved: 5 }));
        }

        let (manager, runner) = setup(&library, Arc::new(codec));
        manager.create_job("full").await.unwrap();

        let report = runner.process_batch(2).await.unwrap();
        assert_eq!(report.done, 2);
        assert_eq!(report.remaining, 1);
    }

    #[tokio::test]
    async fn test_failure_never_aborts_batch() {
        let library = MemoryLibrary::with_items(["a"]);
        let mut codec = MockItemCodec::new();
        codec
            .expect_transcode()
            .returning(|_, _| Err(CodecFailure::new("corrupt")));

        let (manager, runner) = setup(&library, Arc::new(codec));
        manager.create_job("full").await.unwrap();

        let report = runner.process_batch(5).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.done, 0);
        assert_eq!(report.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_no_active_job() {
        let library = MemoryLibrary::new();
        let (_manager, runner) = setup(&library, Arc::new(library.clone()));
        assert!(matches!(
            runner.process_batch(10).await,
            Err(JobError::NoActiveJob)
        ));
    }

    /// Codec that cancels the job while the first item is being converted.
    struct CancellingCodec {
        manager: OnceCell<JobManager>,
    }

    #[async_trait]
    impl ItemCodec for CancellingCodec {
        async fn transcode(&self, _item: &ItemId, _quality: u8) -> Result<Transcoded, CodecFailure> {
            if let Some(manager) = self.manager.get() {
                let _ = manager.cancel_job().await;
            }
            Ok(Transcoded { bytes_saved: 1 })
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_batch_does_not_resurrect_queue() {
        let library = MemoryLibrary::with_items(["a", "b", "c"]);
        let codec = Arc::new(CancellingCodec {
            manager: OnceCell::new(),
        });
        let (manager, runner) = setup(&library, codec.clone());
        codec.manager.set(manager.clone()).unwrap();

        let job = manager.create_job("full").await.unwrap();
        let report = runner.process_batch(2).await.unwrap();

        assert_eq!(report.status, JobStatus::Cancelled);
        assert_eq!(report.processed, 2);
        assert_eq!(manager.slot().queue_len(job.id).await.unwrap(), 0);

        let stored = manager.slot().job(job.id).await.unwrap().unwrap().value;
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert!(stored.processed() <= stored.total);
        assert_eq!(manager.history().entries().await.unwrap().len(), 1);
    }
}
