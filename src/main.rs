mod commands;
mod render;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ics_reminder_core::Settings;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ics-reminder")]
#[command(about = "Send one-time reminders for upcoming events in an ICS calendar feed")]
struct Cli {
    /// Settings file (TOML). Environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the feed once and send reminders for due events (default)
    Run {
        /// Show what would be sent without sending or recording anything
        #[arg(long)]
        dry_run: bool,

        /// Also list events that were skipped
        #[arg(short, long)]
        verbose: bool,
    },
    /// List events that have already been reminded
    Sent,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Run {
        dry_run: false,
        verbose: false,
    });

    match command {
        Commands::Run { dry_run, verbose } => {
            let settings = Settings::load(cli.config.as_deref())?;
            commands::run::run(&settings, dry_run, verbose).await
        }
        Commands::Sent => {
            let path = Settings::load_ledger_path(cli.config.as_deref())?;
            commands::sent::run(&path)
        }
    }
}
