use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::task;
use tracing::info;

use cardbridge_acs_store::{AcsStore, ReferenceData, RowCounts};

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct SeedArgs {
    /// Reference data file (locations, devices, companies, attributes, permissions)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

pub async fn cmd_init_schema(ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let store = ctx.store().await?;
    let counts = task::spawn_blocking(move || -> Result<RowCounts> {
        let mut session = store.session()?;
        Ok(session.row_counts()?)
    })
    .await
    .context("store task failed")??;

    info!(path = %ctx.config().store.path.display(), "schema ready");
    emit(&output, &counts, |counts: &RowCounts| {
        println!("Schema ready at {}", ctx.config().store.path.display());
        print_counts(counts);
    })
}

pub async fn cmd_seed(args: SeedArgs, ctx: &CliContext) -> Result<()> {
    let data = ReferenceData::load(&args.file)
        .with_context(|| format!("Failed to load reference data from {}", args.file.display()))?;
    let store = ctx.store().await?;
    let summary = (
        data.locations.len(),
        data.devices.len(),
        data.companies.len(),
        data.permissions.len(),
    );
    task::spawn_blocking(move || store.seed(&data))
        .await
        .context("store task failed")?
        .context("Failed to apply reference data")?;

    let (locations, devices, companies, permissions) = summary;
    info!(
        file = %args.file.display(),
        locations, devices, companies, permissions, "reference data seeded"
    );
    println!(
        "Seeded {} location(s), {} device(s), {} company(ies), {} permission(s)",
        locations, devices, companies, permissions
    );
    Ok(())
}

pub fn print_counts(counts: &RowCounts) {
    println!("- Names: {}", counts.names);
    println!("- Correlation keys: {}", counts.correlation_keys);
    println!("- Cards: {} ({} active)", counts.cards, counts.active_cards);
    println!("- Combos: {}", counts.combos);
    println!("- Device groups: {}", counts.device_groups);
    println!("- Acl entries: {}", counts.acls);
    println!("- Card slot rows: {}", counts.slot_rows);
}
