//! CLI command implementations

pub mod history;
pub mod jobs;
pub mod serve;
pub mod stats;
pub mod upload;
pub mod wipe;

pub use history::HistoryCommand;
pub use jobs::JobsCommand;
pub use serve::ServeCommand;
pub use stats::StatsCommand;
pub use upload::UploadCommand;
pub use wipe::WipeCommand;

use anyhow::{Context, Result};
use console::{style, Emoji};
use dialoguer::Confirm;
use serde::Serialize;
use webp_squeeze::jobs::{JobEngine, Progress, RecoveryAction, RecoveryReport};

pub(crate) static SUCCESS: Emoji = Emoji("✓", "√");
pub(crate) static INFO: Emoji = Emoji("ℹ", "i");
pub(crate) static WARN: Emoji = Emoji("⚠", "!");

/// Run the recovery pass every command starts with, reporting any repair.
pub(crate) async fn recover(engine: &JobEngine) -> Result<RecoveryReport> {
    let report = engine
        .recover_if_needed()
        .await
        .context("Recovery pass failed")?;

    for action in &report.actions {
        println!("{} {}", INFO, style(describe(*action)).dim());
    }
    Ok(report)
}

pub(crate) const fn describe(action: RecoveryAction) -> &'static str {
    match action {
        RecoveryAction::CompletedStalled => "Completed a job whose queue had drained",
        RecoveryAction::Logged => "Recorded a finished job in history",
        RecoveryAction::CleanedUp => "Removed a finished job",
        RecoveryAction::ClearedDanglingPointer => "Cleared a reference to a missing job",
    }
}

pub(crate) fn print_progress(progress: &Progress) {
    println!("{}", style("Current Job").bold().underlined());
    println!("  ID:         {}", style(progress.job_id).cyan());
    println!("  Type:       {}", progress.job_type);
    println!("  Status:     {}", style(progress.status).yellow());
    println!(
        "  Processed:  {}/{} ({}%)",
        progress.done + progress.failed,
        progress.total,
        progress.percent()
    );
    println!("  Optimized:  {}", style(progress.done).green());
    println!("  Failed:     {}", style(progress.failed).red());
    println!("  Remaining:  {}", progress.remaining);
    println!();
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Ask before a destructive action unless `force` is set.
pub(crate) fn confirm(force: bool, warning: &str) -> Result<bool> {
    if force {
        return Ok(true);
    }

    println!("{} {warning}", style("Warning:").yellow());
    Confirm::new()
        .with_prompt("This action CANNOT be undone. Continue?")
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}
