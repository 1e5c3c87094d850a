//! coverloop CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use coverloop::cli::{commands, handle_error, Cli, Commands};
use coverloop::infrastructure::config::ConfigLoader;
use coverloop::infrastructure::logging::{LogConfig, LoggerImpl};
use coverloop::services::CancellationSignal;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    if let Err(err) = run(cli).await {
        handle_error(err, json);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let _logger =
        LoggerImpl::init(&LogConfig::from(&config.logging)).context("Failed to initialise logging")?;

    let cancel = CancellationSignal::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current step");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Cover(args) => commands::cover::execute(args, config, cancel, cli.json).await,
        Commands::Build(args) => commands::build::execute(args, config, cancel, cli.json).await,
        Commands::Compare(args) => commands::compare::execute(args, config, cli.json).await,
    }
}
