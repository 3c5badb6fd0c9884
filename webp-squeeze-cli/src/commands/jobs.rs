//! Optimization job CLI commands

use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use webp_squeeze::jobs::{format_bytes, JobError, JobStatus};

use super::{describe, print_json, print_progress, recover, INFO, SUCCESS, WARN};
use crate::Runtime;

/// Job management commands
#[derive(Debug, Subcommand)]
pub enum JobsCommand {
    /// Queue every item that needs work
    Create {
        /// Job type (`full` or `retry`)
        #[arg(default_value = "full")]
        job_type: String,
    },

    /// Show progress of the current job
    Progress {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Process one batch of the current job
    Batch {
        /// Items to process (clamped to 1..=50)
        #[arg(short, long, allow_hyphen_values = true)]
        size: Option<i64>,
    },

    /// Process batches until the current job finishes
    Run {
        /// Items per batch (clamped to 1..=50)
        #[arg(short, long, allow_hyphen_values = true)]
        size: Option<i64>,

        /// Create a job of this type first (`full` or `retry`)
        #[arg(long)]
        create: Option<String>,
    },

    /// Cancel the current job
    Cancel,

    /// Repair an interrupted job
    Recover,
}

impl JobsCommand {
    /// Execute the jobs command
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The state store is unavailable
    /// - The job type is not `full` or `retry`
    /// - A job is already running (create)
    pub async fn execute(&self, runtime: &Runtime) -> Result<()> {
        match self {
            Self::Create { job_type } => Self::create(runtime, job_type).await.map(|_| ()),
            Self::Progress { json } => Self::progress(runtime, *json).await,
            Self::Batch { size } => Self::batch(runtime, *size).await,
            Self::Run { size, create } => Self::run(runtime, *size, create.as_deref()).await,
            Self::Cancel => Self::cancel(runtime).await,
            Self::Recover => Self::recover(runtime).await,
        }
    }

    /// Returns whether a job was created.
    async fn create(runtime: &Runtime, job_type: &str) -> Result<bool> {
        let engine = runtime.engine();
        recover(engine).await?;

        match engine.create_job(job_type).await {
            Ok(job) => {
                println!(
                    "{} Created {} job {} with {} images",
                    SUCCESS,
                    job.job_type,
                    style(job.id).cyan(),
                    style(job.total).bold()
                );
                Ok(true)
            }
            Err(JobError::NoItemsFound) => {
                println!("{} Nothing to optimize for a {} job", INFO, job_type.to_lowercase());
                Ok(false)
            }
            Err(JobError::JobAlreadyRunning) => anyhow::bail!(
                "A job is already running. Use `jobs run` to finish it or `jobs cancel` to stop it."
            ),
            Err(e) => Err(e).context("Failed to create job"),
        }
    }

    async fn progress(runtime: &Runtime, json: bool) -> Result<()> {
        let engine = runtime.engine();
        recover(engine).await?;

        match engine.progress().await {
            Ok(progress) if json => print_json(&progress),
            Ok(progress) => {
                print_progress(&progress);
                Ok(())
            }
            Err(JobError::NoActiveJob) => {
                println!("{} No job in progress", INFO);
                Ok(())
            }
            Err(e) => Err(e).context("Failed to read progress"),
        }
    }

    async fn batch(runtime: &Runtime, size: Option<i64>) -> Result<()> {
        let engine = runtime.engine();
        recover(engine).await?;

        let report = match engine.process_batch(size).await {
            Ok(report) => report,
            Err(JobError::NoActiveJob) => {
                println!("{} No job in progress", INFO);
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to process batch"),
        };

        println!(
            "{} Processed {} items, {} remaining ({} optimized, {} failed)",
            SUCCESS,
            report.processed,
            report.remaining,
            style(report.done).green(),
            style(report.failed).red()
        );
        if report.status == JobStatus::Completed {
            println!("{} Job completed", SUCCESS);
        }
        Ok(())
    }

    async fn run(runtime: &Runtime, size: Option<i64>, create: Option<&str>) -> Result<()> {
        let engine = runtime.engine();

        if let Some(job_type) = create {
            if !Self::create(runtime, job_type).await? {
                return Ok(());
            }
        } else {
            recover(engine).await?;
        }

        let progress = match engine.progress().await {
            Ok(progress) if progress.status == JobStatus::InProgress => progress,
            Ok(progress) => {
                println!("{} Job {} is already {}", INFO, progress.job_id, progress.status);
                return Ok(());
            }
            Err(JobError::NoActiveJob) => {
                println!("{} No job in progress. Start one with `jobs create`.", INFO);
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to read progress"),
        };

        let bar = ProgressBar::new(progress.total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .context("Failed to set progress style")?
                .progress_chars("=> "),
        );
        bar.set_position(progress.done + progress.failed);

        let status = loop {
            match engine.process_batch(size).await {
                Ok(report) => {
                    bar.set_position(report.done + report.failed);
                    bar.set_message(format!("{} failed", report.failed));
                    if report.status != JobStatus::InProgress {
                        break Some(report.status);
                    }
                }
                // Cancelled elsewhere, or the queue drained under another runner.
                Err(JobError::NoActiveJob) => break None,
                Err(e) => {
                    bar.abandon();
                    return Err(e).context("Batch failed; run the command again to resume");
                }
            }
        };
        bar.finish_and_clear();

        let report = recover(engine).await?;
        match (status, report.job) {
            (_, Some(job)) => {
                let icon = if job.status == JobStatus::Completed { SUCCESS } else { WARN };
                println!(
                    "{} Job {} {}: {} optimized, {} failed, {} saved",
                    icon,
                    style(job.id).cyan(),
                    job.status,
                    style(job.done).green(),
                    style(job.failed).red(),
                    format_bytes(job.saved_bytes)
                );
            }
            (Some(status), None) => println!("{} Job {}", SUCCESS, status),
            (None, None) => println!("{} Job stopped by another process", WARN),
        }
        Ok(())
    }

    async fn cancel(runtime: &Runtime) -> Result<()> {
        let engine = runtime.engine();
        recover(engine).await?;

        match engine.cancel_job().await {
            Ok(job) => {
                println!(
                    "{} Cancelled job {} after {} of {} images",
                    SUCCESS,
                    style(job.id).cyan(),
                    job.done + job.failed,
                    job.total
                );
                Ok(())
            }
            Err(JobError::NoActiveJob) => {
                println!("{} No job in progress", INFO);
                Ok(())
            }
            Err(e) => Err(e).context("Failed to cancel job"),
        }
    }

    async fn recover(runtime: &Runtime) -> Result<()> {
        let report = runtime
            .engine()
            .recover_if_needed()
            .await
            .context("Recovery pass failed")?;

        if report.is_noop() {
            println!("{} Nothing to repair", SUCCESS);
            return Ok(());
        }
        for action in &report.actions {
            println!("{} {}", SUCCESS, describe(*action));
        }
        Ok(())
    }
}
