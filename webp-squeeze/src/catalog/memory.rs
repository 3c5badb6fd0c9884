//! Scripted in-memory library

use super::{
    CatalogError, CatalogQuery, CodecFailure, ItemCodec, ItemId, ItemOutcome, LibrarySummary,
    SelectionMode, Transcoded,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_SAVING: u64 = 1024;

#[derive(Debug, Default)]
struct Inner {
    items: Vec<ItemId>,
    outcomes: HashMap<ItemId, ItemOutcome>,
    failures: HashMap<ItemId, String>,
    savings: HashMap<ItemId, u64>,
    calls: Vec<(ItemId, u8)>,
}

/// In-memory catalog and codec.
///
/// Items keep insertion order. Conversions succeed with a fixed saving
/// unless the item was scripted to fail with [`MemoryLibrary::fail_item`].
/// Every transcode call is recorded for later inspection.
///
/// # Example
///
/// ```rust
/// use webp_squeeze::catalog::{CatalogQuery, MemoryLibrary, SelectionMode};
///
/// # async fn example() {
/// let library = MemoryLibrary::with_items(["a.jpg", "b.png"]);
/// library.fail_item("b.png", "truncated file");
///
/// let pending = library.find_candidates(SelectionMode::Unoptimized).await.unwrap();
/// assert_eq!(pending.len(), 2);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLibrary {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryLibrary {
    /// Empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Library holding `items` in the given order.
    #[must_use]
    pub fn with_items<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ItemId>,
    {
        let library = Self::new();
        for item in items {
            library.add_item(item);
        }
        library
    }

    /// Append an item. Known items are ignored.
    pub fn add_item(&self, item: impl Into<ItemId>) {
        let item = item.into();
        let mut inner = self.inner.write();
        if !inner.items.contains(&item) {
            inner.items.push(item);
        }
    }

    /// Make every future conversion of `item` fail with `reason`.
    pub fn fail_item(&self, item: impl Into<ItemId>, reason: impl Into<String>) {
        self.inner.write().failures.insert(item.into(), reason.into());
    }

    /// Let future conversions of `item` succeed again.
    pub fn heal_item(&self, item: impl Into<ItemId>) {
        self.inner.write().failures.remove(&item.into());
    }

    /// Bytes a successful conversion of `item` reports.
    pub fn set_saving(&self, item: impl Into<ItemId>, bytes: u64) {
        self.inner.write().savings.insert(item.into(), bytes);
    }

    /// Mark `item` as already converted.
    pub fn mark_optimized(&self, item: impl Into<ItemId>) {
        self.inner
            .write()
            .outcomes
            .insert(item.into(), ItemOutcome::success(0));
    }

    /// Recorded outcome of `item`.
    #[must_use]
    pub fn outcome(&self, item: &str) -> Option<ItemOutcome> {
        self.inner.read().outcomes.get(&ItemId::from(item)).cloned()
    }

    /// Items passed to the codec, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<ItemId> {
        self.inner
            .read()
            .calls
            .iter()
            .map(|(item, _)| item.clone())
            .collect()
    }

    /// Quality used by the most recent conversion.
    #[must_use]
    pub fn last_quality(&self) -> Option<u8> {
        self.inner.read().calls.last().map(|(_, quality)| *quality)
    }
}

#[async_trait]
impl CatalogQuery for MemoryLibrary {
    async fn find_candidates(&self, mode: SelectionMode) -> Result<Vec<ItemId>, CatalogError> {
        let inner = self.inner.read();
        let matches = |item: &&ItemId| {
            let outcome = inner.outcomes.get(*item);
            match mode {
                SelectionMode::Unoptimized => !outcome.is_some_and(|o| o.optimized),
                SelectionMode::Failed => outcome.is_some_and(|o| o.failed),
            }
        };

        Ok(inner.items.iter().filter(matches).cloned().collect())
    }

    async fn summary(&self) -> Result<LibrarySummary, CatalogError> {
        let inner = self.inner.read();
        let count = |pred: fn(&ItemOutcome) -> bool| {
            inner
                .items
                .iter()
                .filter(|item| inner.outcomes.get(*item).is_some_and(pred))
                .count() as u64
        };

        Ok(LibrarySummary {
            total: inner.items.len() as u64,
            optimized: count(|o| o.optimized),
            failed: count(|o| o.failed),
        })
    }
}

#[async_trait]
impl ItemCodec for MemoryLibrary {
    async fn transcode(&self, item: &ItemId, quality: u8) -> Result<Transcoded, CodecFailure> {
        let mut inner = self.inner.write();
        inner.calls.push((item.clone(), quality));

        let failure = if inner.items.contains(item) {
            inner.failures.get(item).cloned()
        } else {
            Some(format!("unknown item {item}"))
        };

        if let Some(reason) = failure {
            let outcome = ItemOutcome::failure(inner.outcomes.get(item), reason.clone());
            inner.outcomes.insert(item.clone(), outcome);
            return Err(CodecFailure::new(reason));
        }

        let bytes_saved = inner.savings.get(item).copied().unwrap_or(DEFAULT_SAVING);
        inner
            .outcomes
            .insert(item.clone(), ItemOutcome::success(bytes_saved));
        Ok(Transcoded { bytes_saved })
    }
}
