use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::init_logging;
use cardbridge::config;

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    let loaded = config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let _log_guard = init_logging(&loaded.config.logging, cli.log_level.as_deref(), cli.debug)?;

    info!("Starting cardbridge v{}", env!("CARGO_PKG_VERSION"));
    match &loaded.path {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => warn!("Config file not found, using defaults"),
    }
    let cli_context = CliContext::new(loaded);

    match dispatch(&cli, &cli_context).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
