//! localdocs binary.
//!
//! Command-line entry point for the LocalDocs warm-up pipeline.

use anyhow::Context;
use clap::Parser;
use localdocs_core::{
    cli::commands::Commands,
    cli::handlers::{handle_config, handle_warm, init_logging},
    config::ServiceConfig,
};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ServiceConfig::load(cli.command.config_args())
        .context("Failed to load configuration")?;

    let logging = cli.command.logging();
    let _guard = init_logging(
        logging.effective_level(&config.logging),
        logging.effective_filter(&config.logging),
        config.logging.dir.as_deref(),
    )?;

    info!("localdocs {} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Warm(cmd) => handle_warm(cmd, config).await,
        Commands::Config(_) => handle_config(&config),
    }
}
