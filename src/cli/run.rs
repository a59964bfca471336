use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use cardbridge::ingest::{IngestDirSource, OutboxStatusSink};
use cardbridge_dispatcher::{metrics, CycleReport, RequestDispatcher};

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Process whatever is in the inbox once and exit
    #[arg(long)]
    pub once: bool,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let config = ctx.config();
    let engine = ctx.engine().await?;
    let permission = engine.config().default_permission.clone();
    let dispatcher = RequestDispatcher::new(
        Arc::new(IngestDirSource::new(&config.ingest.inbox)),
        Arc::new(OutboxStatusSink::new(&config.ingest.outbox)),
        Arc::new(engine),
        permission,
        config.dispatcher.clone(),
    );

    let run_id = Uuid::new_v4();
    let span = info_span!("service", %run_id);
    info!(
        parent: &span,
        inbox = %config.ingest.inbox.display(),
        outbox = %config.ingest.outbox.display(),
        interval = %humantime::format_duration(config.dispatcher.poll_interval),
        "request service starting"
    );

    if args.once {
        let report = dispatcher.poll_once().instrument(span).await;
        return emit(&output, &report, |report: &CycleReport| {
            println!(
                "Polled {}, processed {} ({} success, {} not done), {} duplicate(s), {} skipped",
                report.polled,
                report.processed,
                report.succeeded,
                report.not_done,
                report.duplicates,
                report.skipped
            );
        });
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received; stopping after the current cycle");
                signal_token.cancel();
            }
            Err(err) => warn!(error = %err, "could not listen for interrupts"),
        }
    });

    dispatcher.run(shutdown).instrument(span.clone()).await;

    let totals = metrics::snapshot();
    info!(
        parent: &span,
        polled = totals.polled,
        succeeded = totals.succeeded,
        not_done = totals.not_done,
        duplicates = totals.duplicates,
        source_failures = totals.source_failures,
        report_failures = totals.report_failures,
        "request service stopped"
    );
    Ok(())
}
