//! Testing utilities for webp-squeeze
//!
//! - [`TestEngine`] - an engine over an in-memory store and library
//! - [`drive_to_completion`] - the polling loop a UI would run
//! - [`assert_counter_invariants`] - checks the job counters against the queue
//!
//! # Example
//!
//! ```rust
//! use webp_squeeze::testing::{drive_to_completion, TestEngine};
//!
//! # async fn example() {
//! let test = TestEngine::with_items(["a.jpg", "b.jpg", "c.jpg"]);
//! test.engine.create_job("full").await.unwrap();
//!
//! let reports = drive_to_completion(&test.engine, 2).await.unwrap();
//! assert_eq!(reports.len(), 2);
//! # }
//! ```

use crate::catalog::MemoryLibrary;
use crate::config::SqueezeConfig;
use crate::jobs::{BatchReport, JobEngine, JobError, JobResult, JobStatus};
use crate::store::MemoryStore;
use std::sync::Arc;

/// Upper bound on batches [`drive_to_completion`] will run.
const MAX_BATCHES: usize = 10_000;

/// Engine over a [`MemoryStore`] and a [`MemoryLibrary`], both exposed for
/// inspection and fault injection.
#[derive(Debug, Clone)]
pub struct TestEngine {
    /// Backing store
    pub store: MemoryStore,
    /// Catalog and codec
    pub library: MemoryLibrary,
    /// Engine under test
    pub engine: JobEngine,
}

impl TestEngine {
    /// Engine over `items` with the default configuration.
    #[must_use]
    pub fn with_items<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<crate::catalog::ItemId>,
    {
        Self::with_config(items, &SqueezeConfig::default())
    }

    /// Engine over `items` with a custom configuration.
    #[must_use]
    pub fn with_config<I, T>(items: I, config: &SqueezeConfig) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<crate::catalog::ItemId>,
    {
        let store = MemoryStore::new();
        let library = MemoryLibrary::with_items(items);
        let engine = Self::engine_over(&store, &library, config);
        Self {
            store,
            library,
            engine,
        }
    }

    /// A second engine sharing this one's store and library, as another
    /// process would.
    #[must_use]
    pub fn restarted(&self, config: &SqueezeConfig) -> JobEngine {
        Self::engine_over(&self.store, &self.library, config)
    }

    fn engine_over(store: &MemoryStore, library: &MemoryLibrary, config: &SqueezeConfig) -> JobEngine {
        JobEngine::new(
            Arc::new(store.clone()),
            Arc::new(library.clone()),
            Arc::new(library.clone()),
            config,
        )
    }
}

/// Run batches until the job leaves `in_progress`, returning every report.
///
/// # Errors
///
/// Returns the first engine error, or [`JobError::StateConflict`] if the job
/// never finishes.
pub async fn drive_to_completion(engine: &JobEngine, batch_size: i64) -> JobResult<Vec<BatchReport>> {
    let mut reports = Vec::new();
    for _ in 0..MAX_BATCHES {
        let report = engine.process_batch(Some(batch_size)).await?;
        reports.push(report);
        if report.status != JobStatus::InProgress {
            return Ok(reports);
        }
    }
    Err(JobError::StateConflict {
        key: "batch loop did not terminate".to_string(),
    })
}

/// Assert `done + failed <= total` and, while in progress,
/// `done + failed == total - remaining`.
///
/// # Panics
///
/// Panics if an invariant does not hold.
pub async fn assert_counter_invariants(engine: &JobEngine) {
    let Ok(progress) = engine.progress().await else {
        return;
    };

    assert!(
        progress.done + progress.failed <= progress.total,
        "done ({}) + failed ({}) exceeds total ({})",
        progress.done,
        progress.failed,
        progress.total
    );

    if progress.status == JobStatus::InProgress {
        assert_eq!(
            progress.done + progress.failed,
            progress.total - progress.remaining,
            "counters disagree with the queue"
        );
    }
}
