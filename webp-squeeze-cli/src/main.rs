//! webp-squeeze CLI tool

use anyhow::Result;
use clap::{Parser, Subcommand};
use webp_squeeze_cli_lib::commands::{
    HistoryCommand, JobsCommand, ServeCommand, StatsCommand, UploadCommand, WipeCommand,
};
use webp_squeeze_cli_lib::{GlobalOptions, Runtime};

#[derive(Parser)]
#[command(name = "webp-squeeze")]
#[command(version)]
#[command(about = "Convert JPEG and PNG libraries to WebP in resumable batches", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the JSON API
    Serve {
        /// Listen address (overrides `server.bind`)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Manage the optimization job
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },
    /// Inspect or clear run history
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
    /// Show library and savings figures
    Stats {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Optimize one newly added image
    Upload {
        /// Image path relative to the library root
        item: String,
    },
    /// Delete the current job, history and savings total
    Wipe {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.global.verbose || matches!(cli.command, Commands::Serve { .. }) {
        webp_squeeze::observability::init()?;
    }
    let runtime = Runtime::open(&cli.global).await?;

    match cli.command {
        Commands::Serve { bind } => ServeCommand::new(bind).execute(&runtime).await?,
        Commands::Jobs { command } => command.execute(&runtime).await?,
        Commands::History { command } => command.execute(&runtime).await?,
        Commands::Stats { json } => StatsCommand { json }.execute(&runtime).await?,
        Commands::Upload { item } => UploadCommand::new(item).execute(&runtime).await?,
        Commands::Wipe { force } => WipeCommand { force }.execute(&runtime).await?,
    }

    Ok(())
}
