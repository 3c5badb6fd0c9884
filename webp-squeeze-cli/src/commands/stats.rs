//! Dashboard figures

use anyhow::{Context, Result};
use console::style;

use super::{print_json, print_progress, recover, INFO};
use crate::Runtime;

/// Show library and savings figures
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsCommand {
    /// Print JSON instead of text
    pub json: bool,
}

impl StatsCommand {
    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if the state store or library is unavailable.
    pub async fn execute(&self, runtime: &Runtime) -> Result<()> {
        let engine = runtime.engine();
        recover(engine).await?;

        let stats = engine
            .dashboard_stats()
            .await
            .context("Failed to collect statistics")?;
        if self.json {
            return print_json(&stats);
        }

        println!("\n{} WebP Optimization", INFO);
        println!();
        println!("{}", style("Library").bold().underlined());
        println!("  Images:       {}", style(stats.total_items).cyan());
        println!("  Optimized:    {}", style(stats.optimized_items).green());
        println!("  Unoptimized:  {}", style(stats.unoptimized_items).yellow());
        println!("  Failed:       {}", style(stats.failed_items).red());
        println!();

        println!("{}", style("Savings").bold().underlined());
        println!("  Total saved:  {}", style(&stats.total_saved).green());
        match (&stats.last_run, &stats.last_run_saved) {
            (Some(run), Some(saved)) => println!(
                "  Last run:     {} ({} {}, {} saved)",
                run.date.format("%Y-%m-%d %H:%M"),
                run.job_type,
                run.outcome,
                saved
            ),
            _ => println!("  Last run:     {}", style("never").dim()),
        }
        println!();

        if let Some(progress) = &stats.active_job {
            print_progress(progress);
        }
        Ok(())
    }
}
