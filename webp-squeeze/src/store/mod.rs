//! Versioned key/value persistence
//!
//! The batch engine keeps all of its state (the job slot, queues, the history
//! log and the aggregate counters) behind the [`StateStore`] trait. Every
//! value carries a version so that read-modify-write cycles can be committed
//! with [`StateStore::compare_and_set`] instead of blind overwrites.
//!
//! Two backends ship with the crate:
//! - [`MemoryStore`] - process-local, used by tests and the embedded server
//! - [`FileStore`] - a single JSON document on disk, survives restarts
//!
//! # Example
//!
//! ```rust
//! use webp_squeeze::store::{self, MemoryStore, StateStore};
//!
//! # async fn example() -> Result<(), webp_squeeze::store::StoreError> {
//! let store = MemoryStore::new();
//! let version = store::write(&store, "answer", &42_u64).await?;
//!
//! let current = store::read::<u64>(&store, "answer").await?.unwrap();
//! assert_eq!(current.version, version);
//! assert_eq!(current.value, 42);
//! # Ok(())
//! # }
//! ```

mod file;
pub mod keys;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a [`StateStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend cannot be reached or refused the operation.
    #[error("state store unavailable: {0}")]
    Unavailable(String),

    /// A compare-and-set lost against a concurrent writer.
    #[error("version conflict on key {key}")]
    Conflict {
        /// Key whose version did not match.
        key: String,
    },

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error from a disk-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A value together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T = Value> {
    /// Opaque, monotonically increasing version.
    pub version: u64,
    /// The stored value.
    pub value: T,
}

/// Durable key/value storage with optimistic concurrency.
///
/// Versions are unique across the whole store, so a key that is deleted and
/// recreated never reuses a version a concurrent reader may still hold.
/// There are no multi-key transactions: every call is its own commit.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a key.
    async fn get(&self, key: &str) -> StoreResult<Option<Versioned>>;

    /// Unconditionally write a key, returning the new version.
    async fn set(&self, key: &str, value: Value) -> StoreResult<u64>;

    /// Write a key only if its current version equals `expected`
    /// (`None` meaning the key must not exist).
    ///
    /// Returns [`StoreError::Conflict`] when the precondition fails.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<u64>,
        value: Value,
    ) -> StoreResult<u64>;

    /// Delete a key only if its current version equals `expected`.
    ///
    /// Deleting an already absent key succeeds.
    async fn compare_and_delete(&self, key: &str, expected: u64) -> StoreResult<()>;

    /// Delete a key. Absent keys are not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Read and decode a typed value.
pub async fn read<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> StoreResult<Option<Versioned<T>>> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };

    Ok(Some(Versioned {
        version: raw.version,
        value: serde_json::from_value(raw.value)?,
    }))
}

/// Encode and unconditionally write a typed value.
pub async fn write<T: Serialize + ?Sized>(
    store: &dyn StateStore,
    key: &str,
    value: &T,
) -> StoreResult<u64> {
    let value = serde_json::to_value(value)?;
    store.set(key, value).await
}

/// Encode and write a typed value with a version precondition.
pub async fn swap<T: Serialize + ?Sized>(
    store: &dyn StateStore,
    key: &str,
    expected: Option<u64>,
    value: &T,
) -> StoreResult<u64> {
    let value = serde_json::to_value(value)?;
    store.compare_and_set(key, expected, value).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Counter {
        hits: u32,
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let store = MemoryStore::new();
        write(&store, "counter", &Counter { hits: 3 }).await.unwrap();

        let loaded = read::<Counter>(&store, "counter").await.unwrap().unwrap();
        assert_eq!(loaded.value, Counter { hits: 3 });
    }

    #[tokio::test]
    async fn test_swap_rejects_stale_version() {
        let store = MemoryStore::new();
        let first = write(&store, "counter", &Counter { hits: 1 }).await.unwrap();
        swap(&store, "counter", Some(first), &Counter { hits: 2 })
            .await
            .unwrap();

        let err = swap(&store, "counter", Some(first), &Counter { hits: 9 })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let loaded = read::<Counter>(&store, "counter").await.unwrap().unwrap();
        assert_eq!(loaded.value.hits, 2);
    }

    #[tokio::test]
    async fn test_read_rejects_mismatched_shape() {
        let store = MemoryStore::new();
        write(&store, "counter", "not a counter").await.unwrap();

        let err = read::<Counter>(&store, "counter").await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
