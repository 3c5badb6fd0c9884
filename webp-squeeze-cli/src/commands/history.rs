//! Run history CLI commands

use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use webp_squeeze::jobs::{format_bytes, HistoryFilter, JobStatus, JobType};

use super::{confirm, print_json, recover, INFO, SUCCESS};
use crate::Runtime;

/// History commands
#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// List finished runs, most recent first
    List {
        /// Page number (1-indexed)
        #[arg(short, long, default_value = "1")]
        page: usize,

        /// Entries per page
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Only runs of this type (`full` or `retry`)
        #[arg(short = 't', long)]
        job_type: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Delete the history log
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

impl HistoryCommand {
    /// Execute the history command
    ///
    /// # Errors
    ///
    /// Returns an error if the state store is unavailable or the type filter
    /// is not a job type.
    pub async fn execute(&self, runtime: &Runtime) -> Result<()> {
        match self {
            Self::List {
                page,
                limit,
                job_type,
                json,
            } => Self::list(runtime, *page, *limit, job_type.as_deref(), *json).await,
            Self::Clear { force } => Self::clear(runtime, *force).await,
        }
    }

    async fn list(
        runtime: &Runtime,
        page: usize,
        limit: usize,
        job_type: Option<&str>,
        json: bool,
    ) -> Result<()> {
        let engine = runtime.engine();
        recover(engine).await?;

        let filter = HistoryFilter {
            job_type: job_type.map(str::parse::<JobType>).transpose()?,
            ..HistoryFilter::default()
        };
        let page = engine
            .history(page, limit, &filter)
            .await
            .context("Failed to read history")?;

        if json {
            return print_json(&page);
        }

        println!("\n{} Optimization History", INFO);
        println!();
        if page.entries.is_empty() {
            println!("  {}", style("(No runs recorded)").dim());
            println!();
            return Ok(());
        }

        println!(
            "{:<20} {:<7} {:<10} {:>10} {:>8} {:>12}",
            "Date", "Type", "Outcome", "Optimized", "Failed", "Saved"
        );
        println!("{}", "─".repeat(72));
        for entry in &page.entries {
            let outcome = style(format!("{:<10}", entry.outcome.name()));
            let outcome = if entry.outcome == JobStatus::Completed {
                outcome.green()
            } else {
                outcome.yellow()
            };
            println!(
                "{:<20} {:<7} {} {:>10} {:>8} {:>12}",
                entry.date.format("%Y-%m-%d %H:%M:%S"),
                entry.job_type.name(),
                outcome,
                entry.optimized,
                entry.failed,
                format_bytes(entry.saved_bytes)
            );
        }
        println!();
        println!(
            "{}",
            style(format!(
                "Page {} of {} ({} runs)",
                page.page, page.total_pages, page.total_entries
            ))
            .dim()
        );
        Ok(())
    }

    async fn clear(runtime: &Runtime, force: bool) -> Result<()> {
        let engine = runtime.engine();
        recover(engine).await?;

        if !confirm(force, "This will delete the optimization history.")? {
            println!("Cancelled.");
            return Ok(());
        }

        engine
            .clear_history()
            .await
            .context("Failed to clear history")?;
        println!("{} Optimization history cleared", SUCCESS);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use webp_squeeze::catalog::MemoryLibrary;
    use webp_squeeze::config::SqueezeConfig;
    use webp_squeeze::store::MemoryStore;

    #[tokio::test]
    async fn test_list_and_clear() {
        let library = MemoryLibrary::with_items(["a"]);
        let runtime = Runtime::new(
            SqueezeConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(library.clone()),
            Arc::new(library),
        );
        let engine = runtime.engine();
        engine.create_job("full").await.unwrap();
        engine.process_batch(None).await.unwrap();

        let list = HistoryCommand::List {
            page: 1,
            limit: 20,
            job_type: Some("FULL".to_string()),
            json: false,
        };
        list.execute(&runtime).await.unwrap();

        HistoryCommand::Clear { force: true }
            .execute(&runtime)
            .await
            .unwrap();
        assert!(engine.history_log().entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_type_filter_is_an_error() {
        let library = MemoryLibrary::new();
        let runtime = Runtime::new(
            SqueezeConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(library.clone()),
            Arc::new(library),
        );
        let list = HistoryCommand::List {
            page: 1,
            limit: 20,
            job_type: Some("weekly".to_string()),
            json: true,
        };
        assert!(list.execute(&runtime).await.is_err());
    }
}
