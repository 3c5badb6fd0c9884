//! Media catalog and codec collaborators
//!
//! The batch engine never touches pixels or directories itself. It asks a
//! [`CatalogQuery`] which items need work and hands each item to an
//! [`ItemCodec`]. The codec owns per-item bookkeeping ([`ItemOutcome`]), so a
//! retry job can later select exactly the items that failed.
//!
//! Two adapters ship with the crate:
//! - [`MemoryLibrary`] - scripted catalog and codec for tests and demos
//! - [`LocalLibrary`] - a directory of JPEG/PNG files converted with `image`

mod local;
mod memory;

pub use local::LocalLibrary;
pub use memory::MemoryLibrary;

use crate::store::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifier of a single library item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Which items a new job should pick up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Every item without a successful conversion, failed ones included.
    Unoptimized,
    /// Only items whose last attempt failed.
    Failed,
}

/// Library-wide counts for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySummary {
    /// Convertible items in the library.
    pub total: u64,
    /// Items with a successful conversion.
    pub optimized: u64,
    /// Items whose last attempt failed.
    pub failed: u64,
}

impl LibrarySummary {
    /// Items still lacking a successful conversion.
    #[must_use]
    pub const fn unoptimized(&self) -> u64 {
        self.total.saturating_sub(self.optimized)
    }
}

/// Per-item state recorded by a codec after each attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// A WebP derivative exists.
    pub optimized: bool,
    /// The last attempt failed.
    pub failed: bool,
    /// Failure reason of the last attempt.
    pub message: Option<String>,
    /// Bytes saved by the last successful conversion.
    pub bytes_saved: u64,
    /// When the item was last attempted.
    pub last_attempt: Option<DateTime<Utc>>,
}

impl ItemOutcome {
    /// Outcome of a successful conversion.
    #[must_use]
    pub fn success(bytes_saved: u64) -> Self {
        Self {
            optimized: true,
            failed: false,
            message: None,
            bytes_saved,
            last_attempt: Some(Utc::now()),
        }
    }

    /// Outcome of a failed conversion. A prior derivative is kept.
    #[must_use]
    pub fn failure(previous: Option<&Self>, reason: impl Into<String>) -> Self {
        Self {
            optimized: previous.is_some_and(|p| p.optimized),
            failed: true,
            message: Some(reason.into()),
            bytes_saved: previous.map_or(0, |p| p.bytes_saved),
            last_attempt: Some(Utc::now()),
        }
    }
}

/// Result of a successful transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcoded {
    /// Original size minus derivative size, floored at zero.
    pub bytes_saved: u64,
}

/// A single item could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct CodecFailure {
    /// Human readable reason.
    pub reason: String,
}

impl CodecFailure {
    /// Create a failure with a reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors raised while querying a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Item state could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The library could not be scanned.
    #[error("library scan failed: {0}")]
    Scan(String),
}

/// Selects items for a job and reports library counts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogQuery: Send + Sync {
    /// Items matching `mode`, in a stable order.
    async fn find_candidates(&self, mode: SelectionMode) -> Result<Vec<ItemId>, CatalogError>;

    /// Library-wide counts.
    async fn summary(&self) -> Result<LibrarySummary, CatalogError>;
}

/// Converts one item to WebP at the given quality.
///
/// Implementations record the [`ItemOutcome`] themselves. A failure is a
/// per-item condition and is never escalated by the engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemCodec: Send + Sync {
    /// Convert `item`.
    async fn transcode(&self, item: &ItemId, quality: u8) -> Result<Transcoded, CodecFailure>;
}
