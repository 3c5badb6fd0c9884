//! Configuration management for webp-squeeze
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `SQUEEZE_` prefix, `__` nesting)
//! 2. `./squeeze.toml` (development)
//! 3. `~/.config/webp-squeeze/{service}/config.toml` (user config, XDG)
//! 4. `/etc/webp-squeeze/{service}/config.toml` (system config)
//! 5. Hardcoded defaults (fallback)
//!
//! # Example Configuration
//!
//! ```toml
//! # squeeze.toml
//! [jobs]
//! default_batch_size = 10
//! history_cap = 20
//! max_cas_retries = 8
//!
//! [codec]
//! quality = 80
//! optimize_on_upload = false
//!
//! [store]
//! backend = "file"
//! path = "./squeeze-state.json"
//!
//! [server]
//! bind = "127.0.0.1:3000"
//! request_timeout_ms = 30000
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use webp_squeeze::config::SqueezeConfig;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = SqueezeConfig::load_for_service("media")?;
//! let quality = config.codec.quality;
//! # Ok(())
//! # }
//! ```

use crate::store::{FileStore, MemoryStore, StateStore, StoreResult};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Lowest accepted WebP quality.
pub const MIN_QUALITY: u8 = 50;

/// Highest accepted WebP quality.
pub const MAX_QUALITY: u8 = 100;

/// Batch engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    /// Items per batch when the caller does not say (clamped to 1..=50)
    pub default_batch_size: usize,

    /// Entries kept in the rolling history log
    pub history_cap: usize,

    /// Compare-and-set attempts before giving up with a conflict
    pub max_cas_retries: u32,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            default_batch_size: 10,
            history_cap: 20,
            max_cas_retries: 8,
        }
    }
}

/// Codec settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecSettings {
    /// WebP quality (clamped to 50..=100)
    pub quality: u8,

    /// Convert new uploads immediately, outside any job
    pub optimize_on_upload: bool,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            quality: 80,
            optimize_on_upload: false,
        }
    }
}

/// State store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local, lost on exit
    Memory,
    /// Single JSON document on disk
    File,
}

/// State store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Backend to open
    pub backend: StoreBackend,

    /// Document path for the file backend
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            path: PathBuf::from("./squeeze-state.json"),
        }
    }
}

impl StoreSettings {
    /// Open the configured backend.
    ///
    /// # Errors
    ///
    /// Returns error if the file backend cannot read its document.
    pub async fn open(&self) -> StoreResult<Arc<dyn StateStore>> {
        Ok(match self.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::File => Arc::new(FileStore::open(&self.path).await?),
        })
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen address
    pub bind: String,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

impl ServerSettings {
    /// Per-request timeout
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Complete webp-squeeze configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SqueezeConfig {
    /// Batch engine settings
    pub jobs: JobSettings,

    /// Codec settings
    pub codec: CodecSettings,

    /// State store settings
    pub store: StoreSettings,

    /// HTTP server settings
    pub server: ServerSettings,
}

impl SqueezeConfig {
    /// Load configuration for a named service
    ///
    /// Searches for configuration in XDG-compliant locations with precedence:
    /// 1. Environment variables (`SQUEEZE_*`, use `__` for nesting)
    /// 2. `./squeeze.toml`
    /// 3. `~/.config/webp-squeeze/{service_name}/config.toml`
    /// 4. `/etc/webp-squeeze/{service_name}/config.toml`
    /// 5. Defaults
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - A configuration file cannot be read or parsed
    /// - Configuration values fail type conversion
    pub fn load_for_service(service_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::new()
            // 5. Start with defaults (lowest priority)
            .merge(Toml::string(&toml::to_string(&Self::default())?));

        // 4. System config
        let system_config = PathBuf::from("/etc/webp-squeeze")
            .join(service_name)
            .join("config.toml");
        if system_config.exists() {
            figment = figment.merge(Toml::file(&system_config));
        }

        // 3. User config
        let user_config = Self::recommended_path(service_name);
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        // 2. Local config
        let local_config = PathBuf::from("./squeeze.toml");
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        // 1. Environment variables
        figment = figment.merge(Env::prefixed("SQUEEZE_").split("__").lowercase(true));

        let config: Self = figment.extract()?;
        Ok(config.normalized())
    }

    /// Load configuration from a specific file
    ///
    /// A missing file yields the defaults. Environment variables still
    /// override the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file contains invalid TOML or values of the
    /// wrong type.
    pub fn load_from(path: &str) -> anyhow::Result<Self> {
        let config: Self = Figment::new()
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SQUEEZE_").split("__").lowercase(true))
            .extract()?;

        Ok(config.normalized())
    }

    /// Get the recommended XDG config path for a service
    ///
    /// # Example
    ///
    /// ```rust
    /// use webp_squeeze::config::SqueezeConfig;
    ///
    /// let path = SqueezeConfig::recommended_path("media");
    /// assert!(path.ends_with("config.toml"));
    /// ```
    #[must_use]
    pub fn recommended_path(service_name: &str) -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from("./squeeze.toml"),
            |config_dir| {
                config_dir
                    .join("webp-squeeze")
                    .join(service_name)
                    .join("config.toml")
            },
        )
    }

    /// Create config directory for a service
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create_config_dir(service_name: &str) -> anyhow::Result<PathBuf> {
        let config_path = Self::recommended_path(service_name);
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(config_path)
    }

    /// Clamp values into their accepted ranges.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.codec.quality = self.codec.quality.clamp(MIN_QUALITY, MAX_QUALITY);
        self.jobs.default_batch_size = self
            .jobs
            .default_batch_size
            .clamp(crate::jobs::MIN_BATCH_SIZE, crate::jobs::MAX_BATCH_SIZE);
        self.jobs.history_cap = self.jobs.history_cap.max(1);
        self.jobs.max_cas_retries = self.jobs.max_cas_retries.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = SqueezeConfig::default();
        assert_eq!(config.jobs.default_batch_size, 10);
        assert_eq!(config.jobs.history_cap, 20);
        assert_eq!(config.jobs.max_cas_retries, 8);
        assert_eq!(config.codec.quality, 80);
        assert!(!config.codec.optimize_on_upload);
        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(config.server.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_normalized_clamps() {
        let mut config = SqueezeConfig::default();
        config.codec.quality = 10;
        config.jobs.default_batch_size = 500;
        config.jobs.history_cap = 0;

        let config = config.normalized();
        assert_eq!(config.codec.quality, 50);
        assert_eq!(config.jobs.default_batch_size, 50);
        assert_eq!(config.jobs.history_cap, 1);
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        Jail::expect_with(|_jail| {
            let config = SqueezeConfig::load_from("/nonexistent/path/squeeze.toml")
                .map_err(|e| e.to_string())?;
            assert_eq!(config.jobs.history_cap, 20);
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                [codec]
                quality = 120

                [store]
                backend = "memory"

                [jobs]
                history_cap = 5
                "#,
            )?;

            let config = SqueezeConfig::load_from("custom.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.codec.quality, 100);
            assert_eq!(config.store.backend, StoreBackend::Memory);
            assert_eq!(config.jobs.history_cap, 5);
            assert_eq!(config.jobs.default_batch_size, 10);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_local_file() {
        Jail::expect_with(|jail| {
            jail.create_file("squeeze.toml", "[jobs]\ndefault_batch_size = 25\n")?;
            jail.set_env("SQUEEZE_JOBS__DEFAULT_BATCH_SIZE", "5");
            jail.set_env("SQUEEZE_CODEC__OPTIMIZE_ON_UPLOAD", "true");

            let config = SqueezeConfig::load_for_service("jail-test-service")
                .map_err(|e| e.to_string())?;
            assert_eq!(config.jobs.default_batch_size, 5);
            assert!(config.codec.optimize_on_upload);
            Ok(())
        });
    }

    #[test]
    fn test_local_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("squeeze.toml", "[server]\nbind = \"0.0.0.0:8080\"\n")?;

            let config = SqueezeConfig::load_for_service("jail-test-service")
                .map_err(|e| e.to_string())?;
            assert_eq!(config.server.bind, "0.0.0.0:8080");
            Ok(())
        });
    }

    #[test]
    fn test_recommended_path() {
        let path = SqueezeConfig::recommended_path("media");
        assert!(path.ends_with("config.toml"));
    }

    #[tokio::test]
    async fn test_open_memory_backend() {
        let settings = StoreSettings {
            backend: StoreBackend::Memory,
            ..StoreSettings::default()
        };
        let store = settings.open().await.unwrap();
        assert!(store.get("anything").await.unwrap().is_none());
    }
}
