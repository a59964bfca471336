use anyhow::{Context, Result};
use humantime::format_duration;
use serde::Serialize;
use tokio::task;

use cardbridge_acs_store::{AcsStore, RowCounts};

use super::context::CliContext;
use super::output::{emit, OutputFormat};
use super::store::print_counts;

#[derive(Serialize)]
struct SystemInfo {
    version: &'static str,
    build_date: &'static str,
    git_hash: &'static str,
    git_branch: &'static str,
    config_path: Option<String>,
    database: String,
    location_group: i64,
    default_permission: String,
    correlation_field: String,
    barrier: String,
    poll_interval: String,
    inbox: String,
    outbox: String,
    /// Absent when the database file does not exist yet.
    counts: Option<RowCounts>,
}

pub async fn cmd_info(ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let config = ctx.config();
    let counts = if config.store.path.exists() {
        let store = ctx.store().await?;
        let counts = task::spawn_blocking(move || -> Result<RowCounts> {
            let mut session = store.session()?;
            Ok(session.row_counts()?)
        })
        .await
        .context("store task failed")??;
        Some(counts)
    } else {
        None
    };

    let info = SystemInfo {
        version: env!("CARGO_PKG_VERSION"),
        build_date: env!("BUILD_DATE"),
        git_hash: env!("GIT_HASH"),
        git_branch: env!("GIT_BRANCH"),
        config_path: ctx.config_path().map(|path| path.display().to_string()),
        database: config.store.path.display().to_string(),
        location_group: config.engine.location_group.0,
        default_permission: config.engine.default_permission.clone(),
        correlation_field: config.engine.correlation_field.clone(),
        barrier: format!(
            "{} x {}",
            config.engine.barrier.attempts,
            format_duration(config.engine.barrier.interval)
        ),
        poll_interval: format_duration(config.dispatcher.poll_interval).to_string(),
        inbox: config.ingest.inbox.display().to_string(),
        outbox: config.ingest.outbox.display().to_string(),
        counts,
    };

    emit(&output, &info, |info: &SystemInfo| {
        println!("cardbridge System Information");
        println!("=============================");
        println!("Version: {}", info.version);
        println!("Build Date: {}", info.build_date);
        println!("Git Commit: {} ({})", info.git_hash, info.git_branch);
        println!();

        println!("Configuration:");
        println!(
            "- Config File: {}",
            info.config_path.as_deref().unwrap_or("(defaults)")
        );
        println!("- Database: {}", info.database);
        println!("- Location Group: {}", info.location_group);
        println!("- Default Permission: {}", info.default_permission);
        println!("- Correlation Field: {}", info.correlation_field);
        println!("- Download Barrier: {}", info.barrier);
        println!("- Poll Interval: {}", info.poll_interval);
        println!("- Inbox: {}", info.inbox);
        println!("- Outbox: {}", info.outbox);
        println!();

        match &info.counts {
            Some(counts) => {
                println!("Database:");
                print_counts(counts);
            }
            None => println!("Database: not created yet (run `cardbridge init-schema`)"),
        }
    })
}
