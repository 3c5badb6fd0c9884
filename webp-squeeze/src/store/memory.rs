//! In-memory state store

use super::{StateStore, StoreError, StoreResult, Versioned};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    seq: u64,
    entries: HashMap<String, Versioned>,
}

impl Inner {
    fn next_version(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

/// Process-local [`StateStore`].
///
/// Cloning shares the underlying map. [`MemoryStore::set_unavailable`] makes
/// every call fail with [`StoreError::Unavailable`], which lets tests exercise
/// the fatal error path.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated unavailability.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of keys currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Whether the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Sorted list of stored keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.read().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Versioned>> {
        self.check()?;
        Ok(self.inner.read().entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<u64> {
        self.check()?;
        let mut inner = self.inner.write();
        let version = inner.next_version();
        inner
            .entries
            .insert(key.to_string(), Versioned { version, value });
        Ok(version)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<u64>,
        value: Value,
    ) -> StoreResult<u64> {
        self.check()?;
        let mut inner = self.inner.write();
        let current = inner.entries.get(key).map(|entry| entry.version);
        if current != expected {
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }

        let version = inner.next_version();
        inner
            .entries
            .insert(key.to_string(), Versioned { version, value });
        Ok(version)
    }

    async fn compare_and_delete(&self, key: &str, expected: u64) -> StoreResult<()> {
        self.check()?;
        let mut inner = self.inner.write();
        match inner.entries.get(key) {
            None => Ok(()),
            Some(entry) if entry.version == expected => {
                inner.entries.remove(key);
                Ok(())
            }
            Some(_) => Err(StoreError::Conflict {
                key: key.to_string(),
            }),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.check()?;
        self.inner.write().entries.remove(key);
        Ok(())
    }
}
