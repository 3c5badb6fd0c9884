//! JSON-file state store
//!
//! The whole state lives in one JSON document:
//!
//! ```json
//! { "seq": 7, "entries": { "current_job": { "version": 7, "value": "..." } } }
//! ```
//!
//! Every operation takes an advisory lock on a sibling `.lock` file, shared
//! for reads and exclusive for writes, and reloads the document under it.
//! Handles in different processes therefore see each other's commits and
//! their version checks hold across processes. Writes go through a sibling
//! temp file and an atomic rename, so a crash mid-write leaves the previous
//! document intact.

use super::{StateStore, StoreError, StoreResult, Versioned};
use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    version: u64,
    value: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    seq: u64,
    entries: BTreeMap<String, Entry>,
}

impl Document {
    fn load(path: &Path) -> StoreResult<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn save(&self, path: &Path) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp = sibling(path, "tmp");

        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    fn version(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|entry| entry.version)
    }

    fn insert(&mut self, key: &str, value: Value) -> u64 {
        self.seq += 1;
        let version = self.seq;
        self.entries
            .insert(key.to_string(), Entry { version, value });
        version
    }
}

/// `path` with `suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[derive(Debug, Clone, Copy)]
enum Access {
    Shared,
    Exclusive,
}

/// Disk-backed [`StateStore`], safe to share between processes.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStore {
    /// Open a store, creating its parent directory if needed. A missing
    /// document reads as empty.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed, or if
    /// its parent directory cannot be created.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let store = Self {
            lock_path: sibling(&path, "lock"),
            path,
        };
        store.with_document(Access::Shared, |_| Ok(((), false))).await?;

        tracing::debug!(path = %store.path.display(), "Opened file state store");
        Ok(store)
    }

    /// Location of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` against the freshest document while holding the lock.
    ///
    /// `op` returns its result and whether it changed the document; a changed
    /// document is saved before the lock is released.
    async fn with_document<T, F>(&self, access: Access, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Document) -> StoreResult<(T, bool)> + Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();

        tokio::task::spawn_blocking(move || {
            let lock = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .truncate(false)
                .open(&lock_path)?;
            match access {
                Access::Shared => FileExt::lock_shared(&lock)?,
                Access::Exclusive => FileExt::lock_exclusive(&lock)?,
            }

            let mut doc = Document::load(&path)?;
            let (out, changed) = op(&mut doc)?;
            if changed {
                doc.save(&path)?;
            }

            // closing the handle releases the lock
            drop(lock);
            Ok(out)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("state store task failed: {e}")))?
    }
}

fn conflict(key: &str) -> StoreError {
    StoreError::Conflict {
        key: key.to_string(),
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Versioned>> {
        let key = key.to_string();
        self.with_document(Access::Shared, move |doc| {
            let found = doc.entries.get(&key).map(|entry| Versioned {
                version: entry.version,
                value: entry.value.clone(),
            });
            Ok((found, false))
        })
        .await
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<u64> {
        let key = key.to_string();
        self.with_document(Access::Exclusive, move |doc| Ok((doc.insert(&key, value), true)))
            .await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<u64>,
        value: Value,
    ) -> StoreResult<u64> {
        let key = key.to_string();
        self.with_document(Access::Exclusive, move |doc| {
            if doc.version(&key) != expected {
                return Err(conflict(&key));
            }
            Ok((doc.insert(&key, value), true))
        })
        .await
    }

    async fn compare_and_delete(&self, key: &str, expected: u64) -> StoreResult<()> {
        let key = key.to_string();
        self.with_document(Access::Exclusive, move |doc| match doc.version(&key) {
            None => Ok(((), false)),
            Some(version) if version == expected => {
                doc.entries.remove(&key);
                Ok(((), true))
            }
            Some(_) => Err(conflict(&key)),
        })
        .await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let key = key.to_string();
        self.with_document(Access::Exclusive, move |doc| {
            Ok(((), doc.entries.remove(&key).is_some()))
        })
        .await
    }
}
