//! Single-item optimization for new uploads

use anyhow::Result;
use console::style;
use webp_squeeze::catalog::ItemId;
use webp_squeeze::jobs::format_bytes;

use super::{recover, INFO, SUCCESS};
use crate::Runtime;

/// Optimize one newly added item outside any job
#[derive(Debug, Clone)]
pub struct UploadCommand {
    item: ItemId,
}

impl UploadCommand {
    /// Command for `item`, relative to the library root
    #[must_use]
    pub fn new(item: impl Into<ItemId>) -> Self {
        Self { item: item.into() }
    }

    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if the conversion fails or the store is unavailable.
    pub async fn execute(&self, runtime: &Runtime) -> Result<()> {
        recover(runtime.engine()).await?;

        match runtime.engine().optimize_upload(&self.item).await {
            None => {
                println!(
                    "{} Upload optimization is disabled (set {} to enable it)",
                    INFO,
                    style("codec.optimize_on_upload").cyan()
                );
                Ok(())
            }
            Some(Ok(transcoded)) => {
                println!(
                    "{} Optimized {} ({} saved)",
                    SUCCESS,
                    style(&self.item).cyan(),
                    format_bytes(transcoded.bytes_saved)
                );
                Ok(())
            }
            Some(Err(failure)) => anyhow::bail!("Failed to optimize {}: {failure}", self.item),
        }
    }
}
