use anyhow::Result;

use super::cards::{cmd_activate, cmd_deactivate, cmd_holders};
use super::env::CliArgs;
use super::info::cmd_info;
use super::run::cmd_run;
use super::store::{cmd_init_schema, cmd_seed};
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    let output = cli.output.clone();
    match cli.command.clone() {
        Commands::InitSchema => cmd_init_schema(ctx, output).await,
        Commands::Seed(args) => cmd_seed(args, ctx).await,
        Commands::Activate(args) => cmd_activate(args, ctx, output).await,
        Commands::Deactivate(args) => cmd_deactivate(args, ctx, output).await,
        Commands::Holders(args) => cmd_holders(args, ctx, output).await,
        Commands::Run(args) => cmd_run(args, ctx, output).await,
        Commands::Info => cmd_info(ctx, output).await,
    }
}
