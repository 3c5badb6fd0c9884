//! Resumable WebP optimization jobs
//!
//! A job converts a set of library items selected at creation time. Its
//! state lives entirely in the [`StateStore`](crate::store::StateStore), so
//! processing can stop after any batch and resume from another process.
//!
//! # Lifecycle
//!
//! ```text
//! (idle) --create--> in_progress --queue drained--> completed --+
//!                         |                                      +--recovery--> (idle)
//!                         +--------cancel---------> cancelled ---+
//! ```
//!
//! - [`JobManager`] creates, inspects and cancels the job in the slot
//! - [`BatchRunner`] converts bounded slices of the queue
//! - [`RecoveryMonitor`] completes stalled jobs, writes missing history
//!   entries and deletes finished jobs
//! - [`HistoryLog`] keeps the rolling run log and the savings counter
//! - [`JobEngine`] wires all of the above for transports
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use webp_squeeze::catalog::MemoryLibrary;
//! use webp_squeeze::config::SqueezeConfig;
//! use webp_squeeze::jobs::{JobEngine, JobStatus};
//! use webp_squeeze::store::MemoryStore;
//!
//! # async fn example() -> Result<(), webp_squeeze::jobs::JobError> {
//! let library = Arc::new(MemoryLibrary::with_items(["1.jpg", "2.jpg", "3.png"]));
//! let engine = JobEngine::new(
//!     Arc::new(MemoryStore::new()),
//!     library.clone(),
//!     library,
//!     &SqueezeConfig::default(),
//! );
//!
//! engine.recover_if_needed().await?;
//! engine.create_job("full").await?;
//! loop {
//!     let report = engine.process_batch(Some(2)).await?;
//!     if report.status == JobStatus::Completed {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod history;
mod job;
mod manager;
mod recovery;
mod runner;
mod slot;
mod stats;

pub use engine::JobEngine;
pub use error::{JobError, JobResult};
pub use history::{HistoryEntry, HistoryFilter, HistoryLog, HistoryPage};
pub use job::{Job, JobId, JobStatus, JobType, Progress};
pub use manager::JobManager;
pub use recovery::{RecoveryAction, RecoveryMonitor, RecoveryReport};
pub use runner::{clamp_batch_size, BatchReport, BatchRunner, MAX_BATCH_SIZE, MIN_BATCH_SIZE};
pub use slot::{JobRecord, JobSlot, Queue};
pub use stats::{format_bytes, DashboardStats};
