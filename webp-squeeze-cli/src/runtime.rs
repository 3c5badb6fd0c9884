//! Engine wiring shared by every command

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use webp_squeeze::catalog::{CatalogQuery, ItemCodec, LocalLibrary};
use webp_squeeze::config::SqueezeConfig;
use webp_squeeze::jobs::JobEngine;
use webp_squeeze::state::SqueezeState;
use webp_squeeze::store::StateStore;

/// Service name used when `--service` is not given
pub const DEFAULT_SERVICE: &str = "default";

/// Options accepted by every command
#[derive(Debug, Clone, Args)]
pub struct GlobalOptions {
    /// Root directory of the media library
    #[arg(short, long, global = true, default_value = ".")]
    pub library: PathBuf,

    /// Service name used to locate configuration files
    #[arg(long, global = true, default_value = DEFAULT_SERVICE)]
    pub service: String,

    /// Configuration file to use instead of the search path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print engine logs to the terminal
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalOptions {
    /// Options for `library` with everything else defaulted
    #[must_use]
    pub fn for_library(library: impl Into<PathBuf>) -> Self {
        Self {
            library: library.into(),
            service: DEFAULT_SERVICE.to_string(),
            config: None,
            verbose: false,
        }
    }

    /// Load configuration from `--config` or the service search path
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source cannot be parsed.
    pub fn load_config(&self) -> Result<SqueezeConfig> {
        match &self.config {
            Some(path) => SqueezeConfig::load_from(&path.to_string_lossy())
                .with_context(|| format!("Failed to load configuration from {}", path.display())),
            None => SqueezeConfig::load_for_service(&self.service)
                .context("Failed to load configuration"),
        }
    }
}

/// Configuration, collaborators and engine for one CLI invocation
#[derive(Clone)]
pub struct Runtime {
    config: SqueezeConfig,
    store: Arc<dyn StateStore>,
    catalog: Arc<dyn CatalogQuery>,
    codec: Arc<dyn ItemCodec>,
    engine: JobEngine,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Open the configured store and the library directory
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or the store
    /// cannot be opened.
    pub async fn open(options: &GlobalOptions) -> Result<Self> {
        let config = options.load_config()?;
        let store = config.store.open().await.with_context(|| {
            format!(
                "Failed to open state store at {}",
                config.store.path.display()
            )
        })?;

        let library = Arc::new(LocalLibrary::new(&options.library, store.clone()));
        Ok(Self::new(config, store, library.clone(), library))
    }

    /// Runtime over explicit collaborators
    #[must_use]
    pub fn new(
        config: SqueezeConfig,
        store: Arc<dyn StateStore>,
        catalog: Arc<dyn CatalogQuery>,
        codec: Arc<dyn ItemCodec>,
    ) -> Self {
        let config = config.normalized();
        let engine = JobEngine::new(store.clone(), catalog.clone(), codec.clone(), &config);
        Self {
            config,
            store,
            catalog,
            codec,
            engine,
        }
    }

    /// Effective configuration
    #[must_use]
    pub const fn config(&self) -> &SqueezeConfig {
        &self.config
    }

    /// Batch engine
    #[must_use]
    pub const fn engine(&self) -> &JobEngine {
        &self.engine
    }

    /// HTTP state over the same collaborators, with `config` applied
    #[must_use]
    pub fn state(&self, config: SqueezeConfig) -> SqueezeState {
        SqueezeState::new(
            config,
            self.store.clone(),
            self.catalog.clone(),
            self.codec.clone(),
        )
    }
}
