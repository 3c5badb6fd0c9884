//! HTTP API server

use anyhow::{Context, Result};
use console::style;
use webp_squeeze::handlers;

use super::{recover, INFO};
use crate::Runtime;

/// Serve the JSON API until Ctrl-C
#[derive(Debug, Clone, Default)]
pub struct ServeCommand {
    bind: Option<String>,
}

impl ServeCommand {
    /// Command listening on `bind`, or the configured address
    #[must_use]
    pub const fn new(bind: Option<String>) -> Self {
        Self { bind }
    }

    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn execute(&self, runtime: &Runtime) -> Result<()> {
        recover(runtime.engine()).await?;

        let mut config = runtime.config().clone();
        if let Some(bind) = &self.bind {
            config.server.bind.clone_from(bind);
        }

        println!(
            "{} Serving on {} (Ctrl+C to stop)",
            INFO,
            style(format!("http://{}", config.server.bind)).cyan()
        );
        handlers::serve(runtime.state(config))
            .await
            .context("Server failed")
    }
}
