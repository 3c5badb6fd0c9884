//! Job-related error types.

use crate::catalog::CatalogError;
use crate::store::StoreError;
use thiserror::Error;

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Errors returned by the batch engine.
///
/// Per-item codec failures are not errors at this level: they are counted
/// in the job's `failed` counter.
#[derive(Debug, Error)]
pub enum JobError {
    /// The requested job type is neither `full` nor `retry`.
    #[error("invalid job type: {0:?} (expected \"full\" or \"retry\")")]
    InvalidJobType(String),

    /// The catalog returned no candidates.
    #[error("no images found for optimization")]
    NoItemsFound,

    /// No job is in progress.
    #[error("no active optimization job")]
    NoActiveJob,

    /// Another job already occupies the slot.
    #[error("an optimization job is already running")]
    JobAlreadyRunning,

    /// Compare-and-set retries were exhausted.
    #[error("too much contention updating {key}")]
    StateConflict {
        /// Key that kept changing underneath us.
        key: String,
    },

    /// The state store failed.
    #[error(transparent)]
    Store(StoreError),

    /// Persisted state could not be decoded.
    #[error("corrupt persisted state: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The catalog could not be queried.
    #[error("catalog unavailable: {0}")]
    Catalog(CatalogError),
}

impl JobError {
    /// Stable snake_case code for transports.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidJobType(_) => "invalid_job_type",
            Self::NoItemsFound => "no_items_found",
            Self::NoActiveJob => "no_active_job",
            Self::JobAlreadyRunning => "job_already_running",
            Self::StateConflict { .. } => "state_conflict",
            Self::Store(_) => "store_unavailable",
            Self::Serialization(_) => "corrupt_state",
            Self::Catalog(_) => "catalog_unavailable",
        }
    }

    /// Whether the error is fatal rather than a caller precondition.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Serialization(_) | Self::Catalog(_)
        )
    }
}

impl From<StoreError> for JobError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { key } => Self::StateConflict { key },
            StoreError::Serialization(e) => Self::Serialization(e),
            other => Self::Store(other),
        }
    }
}

impl From<CatalogError> for JobError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Store(e) => e.into(),
            other @ CatalogError::Scan(_) => Self::Catalog(other),
        }
    }
}
