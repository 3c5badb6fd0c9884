//! Observability (structured logging)
//!
//! Every engine operation emits `tracing` events with structured fields
//! (`job_id`, `item`, counters). This module installs the subscriber that
//! renders them.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging
///
/// Sets up:
/// - JSON formatting in release builds, pretty formatting in debug builds
/// - Level filtering from `RUST_LOG`, falling back to [`default_filter`]
///
/// # Errors
///
/// Returns error if a global subscriber is already installed.
///
/// # Example
///
/// ```rust,no_run
/// use webp_squeeze::observability;
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init()?;
/// tracing::info!("Service started");
/// # Ok(())
/// # }
/// ```
pub fn init() -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter()));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?;
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    }

    Ok(())
}

/// Filter used when `RUST_LOG` is unset.
#[must_use]
pub const fn default_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,webp_squeeze=debug,tower_http=debug"
    } else {
        "info"
    }
}
