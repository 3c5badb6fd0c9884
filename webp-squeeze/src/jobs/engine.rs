//! The batch engine facade handed to transports.

use super::{
    BatchReport, BatchRunner, DashboardStats, HistoryFilter, HistoryLog, HistoryPage, Job,
    JobManager, JobResult, JobSlot, JobType, Progress, RecoveryMonitor, RecoveryReport,
};
use crate::catalog::{CatalogQuery, CodecFailure, ItemCodec, ItemId, Transcoded};
use crate::config::SqueezeConfig;
use crate::store::{keys, StateStore};
use std::sync::Arc;

/// Wires the job manager, batch runner, recovery monitor and history log to
/// their collaborators.
///
/// Cloning is cheap; every clone shares the same store and collaborators.
/// The engine does not recover implicitly: transports call
/// [`JobEngine::recover_if_needed`] at the start of every entry point.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use webp_squeeze::catalog::MemoryLibrary;
/// use webp_squeeze::config::SqueezeConfig;
/// use webp_squeeze::jobs::{JobEngine, JobStatus};
/// use webp_squeeze::store::MemoryStore;
///
/// # async fn example() -> Result<(), webp_squeeze::jobs::JobError> {
/// let library = Arc::new(MemoryLibrary::with_items(["a.jpg", "b.jpg"]));
/// let engine = JobEngine::new(
///     Arc::new(MemoryStore::new()),
///     library.clone(),
///     library,
///     &SqueezeConfig::default(),
/// );
///
/// engine.create_job("full").await?;
/// let report = engine.process_batch(None).await?;
/// assert_eq!(report.status, JobStatus::Completed);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct JobEngine {
    store: Arc<dyn StateStore>,
    catalog: Arc<dyn CatalogQuery>,
    codec: Arc<dyn ItemCodec>,
    manager: JobManager,
    runner: BatchRunner,
    recovery: RecoveryMonitor,
    default_batch_size: usize,
    optimize_on_upload: bool,
}

impl std::fmt::Debug for JobEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobEngine")
            .field("manager", &self.manager)
            .field("runner", &self.runner)
            .field("default_batch_size", &self.default_batch_size)
            .field("optimize_on_upload", &self.optimize_on_upload)
            .finish_non_exhaustive()
    }
}

impl JobEngine {
    /// Build an engine from its collaborators and configuration.
    pub fn new(
        store: Arc<dyn StateStore>,
        catalog: Arc<dyn CatalogQuery>,
        codec: Arc<dyn ItemCodec>,
        config: &SqueezeConfig,
    ) -> Self {
        let config = config.clone().normalized();
        let retries = config.jobs.max_cas_retries;

        let slot = JobSlot::new(store.clone(), retries);
        let history = HistoryLog::new(store.clone(), config.jobs.history_cap, retries);
        let manager = JobManager::new(slot, catalog.clone(), history);
        let runner = BatchRunner::new(manager.clone(), codec.clone(), config.codec.quality);
        let recovery = RecoveryMonitor::new(manager.clone());

        Self {
            store,
            catalog,
            codec,
            manager,
            runner,
            recovery,
            default_batch_size: config.jobs.default_batch_size,
            optimize_on_upload: config.codec.optimize_on_upload,
        }
    }

    /// The job manager.
    #[must_use]
    pub const fn manager(&self) -> &JobManager {
        &self.manager
    }

    /// The history log.
    #[must_use]
    pub const fn history_log(&self) -> &HistoryLog {
        self.manager.history()
    }

    /// Batch size used when the caller does not pass one.
    #[must_use]
    pub const fn default_batch_size(&self) -> usize {
        self.default_batch_size
    }

    /// Repair the slot; see [`RecoveryMonitor::recover_if_needed`].
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn recover_if_needed(&self) -> JobResult<RecoveryReport> {
        self.recovery.recover_if_needed().await
    }

    /// Create a job, refusing while another one is in progress.
    ///
    /// # Errors
    ///
    /// Returns [`super::JobError::InvalidJobType`] before any I/O,
    /// [`super::JobError::JobAlreadyRunning`] if the slot is busy,
    /// [`super::JobError::NoItemsFound`] if nothing needs work, or a store
    /// error.
    pub async fn create_job(&self, job_type: &str) -> JobResult<Job> {
        let job_type: JobType = job_type.parse()?;
        self.manager.ensure_idle().await?;
        self.manager.create(job_type).await
    }

    /// Progress of the job in the slot.
    ///
    /// # Errors
    ///
    /// Returns [`super::JobError::NoActiveJob`] if the slot is empty.
    pub async fn progress(&self) -> JobResult<Progress> {
        self.manager.progress().await
    }

    /// Process one batch, defaulting to the configured batch size.
    ///
    /// # Errors
    ///
    /// See [`BatchRunner::process_batch`].
    pub async fn process_batch(&self, batch_size: Option<i64>) -> JobResult<BatchReport> {
        let size = batch_size
            .unwrap_or_else(|| i64::try_from(self.default_batch_size).unwrap_or(i64::MAX));
        self.runner.process_batch(size).await
    }

    /// Cancel the in-progress job.
    ///
    /// # Errors
    ///
    /// Returns [`super::JobError::NoActiveJob`] unless a job is in progress.
    pub async fn cancel_job(&self) -> JobResult<Job> {
        self.manager.cancel_job().await
    }

    /// One page of run history.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn history(
        &self,
        page: usize,
        page_size: usize,
        filter: &HistoryFilter,
    ) -> JobResult<HistoryPage> {
        self.history_log().page(page, page_size, filter).await
    }

    /// Delete the rolling history log.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn clear_history(&self) -> JobResult<()> {
        self.history_log().clear_log().await
    }

    /// Library counts, savings and the active job.
    ///
    /// # Errors
    ///
    /// Returns error if the store or catalog fails.
    pub async fn dashboard_stats(&self) -> JobResult<DashboardStats> {
        let library = self.catalog.summary().await?;
        let total_saved = self.history_log().total_saved_bytes().await?;
        let last_run = self.history_log().last_run().await?;
        let active_job = match self.manager.progress().await {
            Ok(progress) => Some(progress),
            Err(super::JobError::NoActiveJob) => None,
            Err(e) => return Err(e),
        };

        Ok(DashboardStats::new(library, total_saved, last_run, active_job))
    }

    /// Convert a newly added item right away, outside any job.
    ///
    /// Returns `None` when upload optimization is disabled. Job counters and
    /// history are never touched.
    pub async fn optimize_upload(&self, item: &ItemId) -> Option<Result<Transcoded, CodecFailure>> {
        if !self.optimize_on_upload {
            tracing::debug!(item = %item, "Upload optimization disabled");
            return None;
        }

        let result = self.codec.transcode(item, self.runner.quality()).await;
        match &result {
            Ok(transcoded) => {
                tracing::info!(item = %item, bytes_saved = transcoded.bytes_saved, "Optimized upload");
            }
            Err(failure) => {
                tracing::warn!(item = %item, reason = %failure, "Upload optimization failed");
            }
        }
        Some(result)
    }

    /// Delete every engine key: the job in the slot, its queue, the history
    /// log, the last-run summary and the aggregate counter.
    ///
    /// Item outcomes belong to the catalog and are kept.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn wipe(&self) -> JobResult<()> {
        let slot = self.manager.slot();
        if let Some(pointer) = slot.current_id().await? {
            slot.discard(pointer.value).await?;
        }
        slot.clear_pointer().await?;

        for key in [
            keys::OPTIMIZATION_LOG,
            keys::LAST_RUN_SUMMARY,
            keys::TOTAL_SAVED_BYTES,
        ] {
            self.store.delete(key).await?;
        }

        tracing::warn!("Wiped all optimization state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryLibrary;
    use crate::jobs::{JobError, JobStatus};
    use crate::store::MemoryStore;

    fn engine_with(library: &MemoryLibrary, config: &SqueezeConfig) -> (MemoryStore, JobEngine) {
        let store = MemoryStore::new();
        let engine = JobEngine::new(
            Arc::new(store.clone()),
            Arc::new(library.clone()),
            Arc::new(library.clone()),
            config,
        );
        (store, engine)
    }

    #[tokio::test]
    async fn test_create_refuses_while_running() {
        let library = MemoryLibrary::with_items(["a", "b"]);
        let (_store, engine) = engine_with(&library, &SqueezeConfig::default());

        engine.create_job("full").await.unwrap();
        assert!(matches!(
            engine.create_job("full").await,
            Err(JobError::JobAlreadyRunning)
        ));
        assert!(matches!(
            engine.create_job("bogus").await,
            Err(JobError::InvalidJobType(_))
        ));
    }

    #[tokio::test]
    async fn test_default_batch_size_applies() {
        let items: Vec<String> = (0..12).map(|n| format!("{n}.png")).collect();
        let library = MemoryLibrary::with_items(items);
        let mut config = SqueezeConfig::default();
        config.jobs.default_batch_size = 4;
        let (_store, engine) = engine_with(&library, &config);

        engine.create_job("full").await.unwrap();
        let report = engine.process_batch(None).await.unwrap();
        assert_eq!(report.processed, 4);
        assert_eq!(report.remaining, 8);
    }

    #[tokio::test]
    async fn test_quality_is_clamped_and_forwarded() {
        let library = MemoryLibrary::with_items(["a"]);
        let mut config = SqueezeConfig::default();
        config.codec.quality = 30;
        let (_store, engine) = engine_with(&library, &config);

        engine.create_job("full").await.unwrap();
        engine.process_batch(Some(1)).await.unwrap();
        assert_eq!(library.last_quality(), Some(50));
    }

    #[tokio::test]
    async fn test_optimize_upload_respects_setting() {
        let library = MemoryLibrary::with_items(["new.jpg"]);
        let (_store, disabled) = engine_with(&library, &SqueezeConfig::default());
        assert!(disabled.optimize_upload(&"new.jpg".into()).await.is_none());
        assert!(library.calls().is_empty());

        let mut config = SqueezeConfig::default();
        config.codec.optimize_on_upload = true;
        let (_store, enabled) = engine_with(&library, &config);
        let result = enabled.optimize_upload(&"new.jpg".into()).await.unwrap();
        assert!(result.is_ok());
        assert!(enabled.history_log().entries().await.unwrap().is_empty());
        assert_eq!(enabled.history_log().total_saved_bytes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dashboard_stats() {
        let library = MemoryLibrary::with_items(["a", "b", "c"]);
        library.set_saving("a", 2 * 1024 * 1024);
        library.set_saving("b", 0);
        library.fail_item("c", "broken");
        let (_store, engine) = engine_with(&library, &SqueezeConfig::default());

        engine.create_job("full").await.unwrap();
        engine.process_batch(Some(10)).await.unwrap();

        let stats = engine.dashboard_stats().await.unwrap();
        assert_eq!(stats.total_items, 3);
        assert_eq!(stats.optimized_items, 2);
        assert_eq!(stats.failed_items, 1);
        assert_eq!(stats.total_saved, "2.00 MB");
        assert_eq!(stats.last_run.unwrap().outcome, JobStatus::Completed);
        assert_eq!(stats.active_job.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_wipe_removes_engine_keys() {
        let library = MemoryLibrary::with_items(["a", "b"]);
        let (store, engine) = engine_with(&library, &SqueezeConfig::default());

        engine.create_job("full").await.unwrap();
        engine.process_batch(Some(1)).await.unwrap();
        engine.cancel_job().await.unwrap();
        assert!(!store.is_empty());

        engine.wipe().await.unwrap();
        assert!(store.is_empty());
        assert_eq!(engine.history_log().total_saved_bytes().await.unwrap(), 0);
    }
}
