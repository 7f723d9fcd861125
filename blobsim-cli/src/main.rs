//! Blobsim CLI - Command-line interface
//!
//! Drives synthetic upload streams from the command line.

mod commands;

use std::path::PathBuf;

use blobsim_core::tracing_setup::{CliLogLevel, init_tracing};
use clap::Parser;

#[derive(Parser)]
#[command(name = "blobsim")]
#[command(about = "Synthetic upload streams for capacity testing")]
#[command(version)]
struct Cli {
    /// Console log level (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info, global = true)]
    log_level: CliLogLevel,

    /// Directory for the full-trace log of this run
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    if let Err(e) = commands::handle_command(cli.command).await {
        tracing::error!("{e}");
        anyhow::bail!(e.user_message());
    }

    Ok(())
}
