use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use cardbridge_acl_engine::{ActivationOutcome, DeactivationOutcome};
use cardbridge_acs_store::CardHolder;
use cardbridge_core_types::{AclId, CardCode, Enrollment};

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct ActivateArgs {
    #[arg(long)]
    pub first_name: String,

    #[arg(long)]
    pub last_name: String,

    /// Company name as stored in the legacy database
    #[arg(long)]
    pub company: String,

    /// External user id the correlation key is derived from
    #[arg(long)]
    pub user_id: String,

    /// Card code as printed; leading zeros are stripped
    #[arg(long)]
    pub card: String,

    /// Permission name (defaults to engine.default_permission)
    #[arg(long)]
    pub permission: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct DeactivateArgs {
    /// Card code as printed
    pub card: String,
}

#[derive(Args, Clone, Debug)]
pub struct HoldersArgs {
    /// Company name as stored in the legacy database
    pub company: String,
}

pub async fn cmd_activate(args: ActivateArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let engine = ctx.engine().await?;
    let enrollment = Enrollment {
        first_name: args.first_name,
        last_name: args.last_name,
        company: args.company,
        external_user_id: args.user_id,
        card: CardCode::parse(&args.card)?,
    };
    let permission = args
        .permission
        .unwrap_or_else(|| engine.config().default_permission.clone());
    let outcome = engine
        .activate_card(&enrollment, &permission)
        .await
        .with_context(|| format!("Failed to activate card {}", enrollment.card))?;

    emit(&output, &outcome, |outcome: &ActivationOutcome| {
        println!(
            "Card {} active for name {} ({})",
            outcome.card_id,
            outcome.name_id,
            if outcome.created_card { "new card" } else { "existing card" }
        );
        println!("- Combo: {}", outcome.combo_id);
        println!("- Acl slots: {}", join_ids(&outcome.acl_ids));
        if !outcome.dropped_acls.is_empty() {
            println!("- Dropped (no free slot): {}", join_ids(&outcome.dropped_acls));
        }
    })
}

pub async fn cmd_deactivate(
    args: DeactivateArgs,
    ctx: &CliContext,
    output: OutputFormat,
) -> Result<()> {
    let engine = ctx.engine().await?;
    let card = CardCode::parse(&args.card)?;
    let outcome = engine
        .deactivate_card(&card)
        .await
        .with_context(|| format!("Failed to deactivate card {}", card))?;

    emit(&output, &outcome, |outcome: &DeactivationOutcome| match outcome {
        DeactivationOutcome::Deactivated { card_id } => {
            println!("Card {} deactivated", card_id)
        }
        DeactivationOutcome::NeverActivated => {
            println!("No card with code {}; nothing to do", card)
        }
    })
}

#[derive(Serialize)]
struct HolderList {
    company: String,
    holders: Vec<CardHolder>,
}

pub async fn cmd_holders(args: HoldersArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let engine = ctx.engine().await?;
    let holders = engine
        .active_card_holders(&args.company)
        .await
        .with_context(|| format!("Failed to list holders for {}", args.company))?;
    let list = HolderList {
        company: args.company,
        holders,
    };

    emit(&output, &list, |list: &HolderList| {
        println!("{}: {} active card(s)", list.company, list.holders.len());
        for holder in &list.holders {
            println!(
                "  {:<10} {} {} [{}]",
                holder.card,
                holder.first_name,
                holder.last_name,
                holder
                    .correlation_key
                    .as_ref()
                    .map(|key| key.as_str())
                    .unwrap_or("-")
            );
        }
    })
}

fn join_ids(ids: &[AclId]) -> String {
    if ids.is_empty() {
        return "(none)".to_string();
    }
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
