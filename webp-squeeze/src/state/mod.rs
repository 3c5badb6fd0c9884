//! Application state management
//!
//! Bundles configuration and the batch engine for axum handlers.

use crate::{
    catalog::{CatalogQuery, ItemCodec},
    config::SqueezeConfig,
    jobs::JobEngine,
    store::StateStore,
};
use std::sync::Arc;

/// Shared state for webp-squeeze handlers
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use webp_squeeze::{catalog::MemoryLibrary, config::SqueezeConfig, state::SqueezeState, store::MemoryStore};
///
/// let library = Arc::new(MemoryLibrary::new());
/// let state = SqueezeState::new(
///     SqueezeConfig::default(),
///     Arc::new(MemoryStore::new()),
///     library.clone(),
///     library,
/// );
/// assert_eq!(state.config().codec.quality, 80);
/// ```
#[derive(Clone, Debug)]
pub struct SqueezeState {
    /// Application configuration
    config: Arc<SqueezeConfig>,

    /// Batch engine
    engine: JobEngine,
}

impl SqueezeState {
    /// Create state from configuration and collaborators
    pub fn new(
        config: SqueezeConfig,
        store: Arc<dyn StateStore>,
        catalog: Arc<dyn CatalogQuery>,
        codec: Arc<dyn ItemCodec>,
    ) -> Self {
        let config = config.normalized();
        let engine = JobEngine::new(store, catalog, codec, &config);
        Self {
            config: Arc::new(config),
            engine,
        }
    }

    /// Get configuration reference
    #[must_use]
    pub fn config(&self) -> &SqueezeConfig {
        &self.config
    }

    /// Get the batch engine
    #[must_use]
    pub const fn engine(&self) -> &JobEngine {
        &self.engine
    }
}
