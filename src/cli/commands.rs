use clap::Subcommand;

use super::cards::{ActivateArgs, DeactivateArgs, HoldersArgs};
use super::run::RunArgs;
use super::store::SeedArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Create any missing legacy tables in the configured database
    InitSchema,

    /// Load locations, devices, companies, attributes and permissions from a YAML file
    Seed(SeedArgs),

    /// Grant a card the default (or given) permission
    Activate(ActivateArgs),

    /// Revoke a card
    Deactivate(DeactivateArgs),

    /// List active cards of a company with their holders
    Holders(HoldersArgs),

    /// Poll the inbox and apply requests until interrupted
    Run(RunArgs),

    /// Show build, configuration and database information
    Info,
}
