//! webp-squeeze: resumable batch conversion of image libraries to WebP
//!
//! The crate is built around a batch job engine that survives restarts,
//! closed browser tabs and partial failures:
//! - **jobs**: job creation, chunked processing, recovery and run history
//! - **store**: versioned key/value persistence with compare-and-set
//! - **catalog**: the media library and per-item codec the engine drives
//!
//! An axum JSON API ([`handlers`]) and the `webp-squeeze` CLI bind the engine
//! to transports.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use webp_squeeze::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     observability::init()?;
//!
//!     let config = SqueezeConfig::load_for_service("media")?;
//!     let store = config.store.open().await?;
//!     let library = Arc::new(LocalLibrary::new("./uploads", store.clone()));
//!
//!     let state = SqueezeState::new(config, store, library.clone(), library);
//!     handlers::serve(state).await?;
//!     Ok(())
//! }
//! ```

#![allow(clippy::missing_errors_doc)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod observability;
pub mod state;
pub mod store;
pub mod testing;

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! ```rust
    //! use webp_squeeze::prelude::*;
    //! ```

    pub use crate::catalog::{
        CatalogQuery, CodecFailure, ItemCodec, ItemId, ItemOutcome, LibrarySummary, LocalLibrary,
        MemoryLibrary, SelectionMode, Transcoded,
    };
    pub use crate::config::SqueezeConfig;
    pub use crate::error::{ApiError, SqueezeError};
    pub use crate::handlers;
    pub use crate::jobs::{
        BatchReport, HistoryEntry, HistoryFilter, Job, JobEngine, JobError, JobId, JobResult,
        JobStatus, JobType, Progress,
    };
    pub use crate::observability;
    pub use crate::state::SqueezeState;
    pub use crate::store::{FileStore, MemoryStore, StateStore};
}
