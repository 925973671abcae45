mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "autosignup")]
#[command(about = "Drive a chat web app from sign-up to a working session", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account (or reuse the stored session) and verify the chat
    Run {
        /// Run the browser without a window
        #[arg(long)]
        headless: bool,

        /// Give up after this many cycles (overrides config flow.maxCycles)
        #[arg(long)]
        max_cycles: Option<u32>,
    },

    /// Classify a saved snapshot and show the planned action
    Classify {
        /// Snapshot text file, e.g. ~/.autosignup/debug/debug_snapshot.txt
        file: PathBuf,
    },

    /// Check configuration, credentials and browser availability
    Doctor,

    /// Write a default configuration
    Onboard {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Run { headless, max_cycles } => {
            commands::run::run(headless, max_cycles).await?;
        }
        Commands::Classify { file } => {
            commands::classify::run(&file)?;
        }
        Commands::Doctor => {
            commands::doctor::run().await?;
        }
        Commands::Onboard { force } => {
            commands::onboard::run(force).await?;
        }
    }

    Ok(())
}
