//! Delete all optimization state

use anyhow::{Context, Result};

use super::{confirm, SUCCESS};
use crate::Runtime;

/// Remove the current job, history and savings counter
#[derive(Debug, Clone, Copy, Default)]
pub struct WipeCommand {
    /// Skip confirmation prompt
    pub force: bool,
}

impl WipeCommand {
    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if the state store is unavailable.
    pub async fn execute(&self, runtime: &Runtime) -> Result<()> {
        if !confirm(
            self.force,
            "This will delete the current job, the history and the savings total.",
        )? {
            println!("Cancelled.");
            return Ok(());
        }

        runtime
            .engine()
            .wipe()
            .await
            .context("Failed to wipe optimization state")?;
        println!("{} Optimization state wiped", SUCCESS);
        Ok(())
    }
}
