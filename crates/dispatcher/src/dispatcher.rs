use std::sync::Arc;

use serde::Serialize;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cardbridge_acl_engine::{CardAccess, DeactivationOutcome};
use cardbridge_core_types::{
    BridgeError, CardAction, CardRequest, RawCardRequest, RequestId, RequestStatus,
};

use crate::api::{StatusSink, UpdateSource};
use crate::config::DispatcherConfig;
use crate::ledger::RequestLedger;
use crate::metrics;

/// Tally of one poll cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub polled: usize,
    pub processed: usize,
    pub duplicates: usize,
    pub succeeded: usize,
    pub not_done: usize,
    /// Requests without an id; they cannot be reported.
    pub skipped: usize,
}

/// Polls the update source and applies each request at most once.
pub struct RequestDispatcher {
    source: Arc<dyn UpdateSource>,
    sink: Arc<dyn StatusSink>,
    access: Arc<dyn CardAccess>,
    ledger: Arc<RequestLedger>,
    permission: String,
    config: DispatcherConfig,
}

impl RequestDispatcher {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        sink: Arc<dyn StatusSink>,
        access: Arc<dyn CardAccess>,
        permission: impl Into<String>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            source,
            sink,
            access,
            ledger: Arc::new(RequestLedger::new()),
            permission: permission.into(),
            config,
        }
    }

    pub fn ledger(&self) -> &RequestLedger {
        &self.ledger
    }

    pub async fn poll_once(&self) -> CycleReport {
        let mut report = CycleReport::default();
        let batch = match self.source.poll().await {
            Ok(batch) => batch,
            Err(err) => {
                warn!(error = %err, "update source poll failed");
                metrics::record_source_failure();
                return report;
            }
        };
        report.polled = batch.len();
        metrics::record_polled(batch.len());

        for raw in batch {
            let Some(id) = raw.request_id() else {
                warn!(method = ?raw.method, "request without id skipped");
                report.skipped += 1;
                metrics::record_skipped();
                continue;
            };
            if !self.ledger.accept(&id) {
                debug!(request_id = %id, "request already handled");
                report.duplicates += 1;
                metrics::record_duplicate();
                continue;
            }

            report.processed += 1;
            let status = self.handle(&id, raw).await;
            self.ledger.finish(&id, status);
            match status {
                RequestStatus::Success => {
                    report.succeeded += 1;
                    metrics::record_succeeded();
                }
                RequestStatus::NotDone => {
                    report.not_done += 1;
                    metrics::record_not_done();
                }
            }

            if let Err(err) = self.sink.report(&id, status).await {
                warn!(request_id = %id, status = %status, error = %err, "status report failed");
                metrics::record_report_failure();
            }
        }
        report
    }

    async fn handle(&self, id: &RequestId, raw: RawCardRequest) -> RequestStatus {
        let request = match CardRequest::try_from(raw) {
            Ok(request) => request,
            Err(err) => {
                warn!(request_id = %id, error = %err, "malformed request");
                return RequestStatus::NotDone;
            }
        };
        match self.apply(&request).await {
            Ok(()) => RequestStatus::Success,
            Err(err) => {
                error!(
                    request_id = %id,
                    method = %request.method(),
                    card = %request.card(),
                    kind = %err.kind(),
                    error = %err.message(),
                    "request failed"
                );
                RequestStatus::NotDone
            }
        }
    }

    async fn apply(&self, request: &CardRequest) -> Result<(), BridgeError> {
        match &request.action {
            CardAction::Enable(enrollment) => {
                let outcome = self.access.activate(enrollment, &self.permission).await?;
                info!(
                    request_id = %request.id,
                    card_id = %outcome.card_id,
                    name_id = %outcome.name_id,
                    created = outcome.created_card,
                    "card enabled"
                );
            }
            CardAction::Disable { card } => match self.access.deactivate(card).await? {
                DeactivationOutcome::Deactivated { card_id } => {
                    info!(request_id = %request.id, card_id = %card_id, "card disabled");
                }
                DeactivationOutcome::NeverActivated => {
                    info!(request_id = %request.id, card = %card, "card was never active");
                }
            },
        }
        Ok(())
    }

    /// Polls on a fixed interval until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.config.poll_interval, "dispatcher started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.poll_once().await;
                    if report.polled > 0 {
                        info!(
                            polled = report.polled,
                            processed = report.processed,
                            duplicates = report.duplicates,
                            succeeded = report.succeeded,
                            not_done = report.not_done,
                            skipped = report.skipped,
                            "poll cycle finished"
                        );
                    }
                }
            }
        }
        info!(handled = self.ledger.len(), "dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use cardbridge_acl_engine::ActivationOutcome;
    use cardbridge_core_types::{AclId, CardCode, CardId, ComboId, Enrollment, ErrorKind, NameId};

    use super::*;
    use crate::error::DispatchError;
    use crate::ledger::RequestState;

    #[derive(Default)]
    struct QueueSource {
        batches: Mutex<VecDeque<Result<Vec<RawCardRequest>, DispatchError>>>,
    }

    impl QueueSource {
        fn push(&self, batch: Vec<RawCardRequest>) {
            self.batches.lock().push_back(Ok(batch));
        }

        fn fail(&self) {
            self.batches
                .lock()
                .push_back(Err(DispatchError::Source("offline".into())));
        }
    }

    #[async_trait]
    impl UpdateSource for QueueSource {
        async fn poll(&self) -> Result<Vec<RawCardRequest>, DispatchError> {
            self.batches.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        reports: Mutex<Vec<(RequestId, RequestStatus)>>,
        broken: bool,
    }

    #[async_trait]
    impl StatusSink for RecordingSink {
        async fn report(&self, id: &RequestId, status: RequestStatus) -> Result<(), DispatchError> {
            if self.broken {
                return Err(DispatchError::Sink("down".into()));
            }
            self.reports.lock().push((id.clone(), status));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeAccess {
        activations: AtomicUsize,
        deactivations: AtomicUsize,
        fail_with: Option<ErrorKind>,
    }

    #[async_trait]
    impl CardAccess for FakeAccess {
        async fn activate(
            &self,
            _enrollment: &Enrollment,
            permission_name: &str,
        ) -> Result<ActivationOutcome, BridgeError> {
            assert_eq!(permission_name, "Default");
            self.activations.fetch_add(1, Ordering::SeqCst);
            if let Some(kind) = self.fail_with {
                return Err(BridgeError::new(kind, "forced"));
            }
            Ok(ActivationOutcome {
                name_id: NameId(1),
                card_id: CardId(1),
                combo_id: ComboId(1),
                acl_ids: vec![AclId(1)],
                dropped_acls: Vec::new(),
                created_card: true,
            })
        }

        async fn deactivate(&self, _card: &CardCode) -> Result<DeactivationOutcome, BridgeError> {
            self.deactivations.fetch_add(1, Ordering::SeqCst);
            Ok(DeactivationOutcome::NeverActivated)
        }
    }

    fn enable(id: &str) -> RawCardRequest {
        RawCardRequest {
            id: Some(id.into()),
            method: Some("enable".into()),
            first_name: Some("Ann".into()),
            last_name: Some("Lee".into()),
            company: Some("Acme".into()),
            external_user_id: Some("u-42".into()),
            card_code: Some("0042".into()),
        }
    }

    fn dispatcher(
        source: Arc<QueueSource>,
        sink: Arc<RecordingSink>,
        access: Arc<FakeAccess>,
    ) -> RequestDispatcher {
        RequestDispatcher::new(
            source,
            sink,
            access,
            "Default",
            DispatcherConfig {
                poll_interval: Duration::from_millis(10),
            },
        )
    }

    #[tokio::test]
    async fn redelivered_request_is_processed_and_reported_once() {
        let source = Arc::new(QueueSource::default());
        let sink = Arc::new(RecordingSink::default());
        let access = Arc::new(FakeAccess::default());
        let dispatcher = dispatcher(source.clone(), sink.clone(), access.clone());

        source.push(vec![enable("r1"), enable("r1")]);
        source.push(vec![enable("r1")]);
        let first = dispatcher.poll_once().await;
        let second = dispatcher.poll_once().await;

        assert_eq!(first.processed, 1);
        assert_eq!(first.duplicates, 1);
        assert_eq!(second.duplicates, 1);
        assert_eq!(access.activations.load(Ordering::SeqCst), 1);
        assert_eq!(
            *sink.reports.lock(),
            vec![(RequestId::new("r1"), RequestStatus::Success)]
        );
        assert_eq!(
            dispatcher.ledger().state(&RequestId::new("r1")),
            Some(RequestState::Finished(RequestStatus::Success))
        );
    }

    #[tokio::test]
    async fn malformed_and_failed_requests_are_not_done() {
        let source = Arc::new(QueueSource::default());
        let sink = Arc::new(RecordingSink::default());
        let access = Arc::new(FakeAccess {
            fail_with: Some(ErrorKind::BarrierTimeout),
            ..FakeAccess::default()
        });
        let dispatcher = dispatcher(source.clone(), sink.clone(), access.clone());

        let mut unknown_method = enable("r2");
        unknown_method.method = Some("suspend".into());
        let mut bad_card = enable("r3");
        bad_card.card_code = Some("12ab".into());
        source.push(vec![enable("r1"), unknown_method, bad_card]);

        let report = dispatcher.poll_once().await;
        assert_eq!(report.processed, 3);
        assert_eq!(report.not_done, 3);
        assert_eq!(access.activations.load(Ordering::SeqCst), 1);
        assert!(sink
            .reports
            .lock()
            .iter()
            .all(|(_, status)| *status == RequestStatus::NotDone));
    }

    #[tokio::test]
    async fn missing_id_is_skipped_without_report() {
        let source = Arc::new(QueueSource::default());
        let sink = Arc::new(RecordingSink::default());
        let access = Arc::new(FakeAccess::default());
        let dispatcher = dispatcher(source.clone(), sink.clone(), access.clone());

        let mut anonymous = enable("x");
        anonymous.id = None;
        let mut blank = enable("x");
        blank.id = Some("  ".into());
        source.push(vec![anonymous, blank]);

        let report = dispatcher.poll_once().await;
        assert_eq!(report.skipped, 2);
        assert_eq!(report.processed, 0);
        assert!(sink.reports.lock().is_empty());
        assert!(dispatcher.ledger().is_empty());
    }

    #[tokio::test]
    async fn disable_routes_to_deactivate() {
        let source = Arc::new(QueueSource::default());
        let sink = Arc::new(RecordingSink::default());
        let access = Arc::new(FakeAccess::default());
        let dispatcher = dispatcher(source.clone(), sink.clone(), access.clone());

        source.push(vec![RawCardRequest {
            id: Some("r9".into()),
            method: Some("Disable".into()),
            card_code: Some("42".into()),
            ..RawCardRequest::default()
        }]);
        let report = dispatcher.poll_once().await;
        assert_eq!(report.succeeded, 1);
        assert_eq!(access.deactivations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn collaborator_failures_do_not_stop_the_cycle() {
        let source = Arc::new(QueueSource::default());
        let sink = Arc::new(RecordingSink {
            broken: true,
            ..RecordingSink::default()
        });
        let access = Arc::new(FakeAccess::default());
        let dispatcher = dispatcher(source.clone(), sink.clone(), access.clone());

        source.fail();
        assert_eq!(dispatcher.poll_once().await, CycleReport::default());

        source.push(vec![enable("r1")]);
        let report = dispatcher.poll_once().await;
        assert_eq!(report.succeeded, 1);
        // Unreported but terminal: a redelivery stays ignored.
        source.push(vec![enable("r1")]);
        assert_eq!(dispatcher.poll_once().await.duplicates, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_until_cancelled() {
        let source = Arc::new(QueueSource::default());
        let sink = Arc::new(RecordingSink::default());
        let access = Arc::new(FakeAccess::default());
        let dispatcher = Arc::new(dispatcher(source.clone(), sink.clone(), access.clone()));
        source.push(vec![enable("r1")]);
        source.push(vec![enable("r2")]);

        let shutdown = CancellationToken::new();
        let task = {
            let dispatcher = dispatcher.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { dispatcher.run(shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(35)).await;
        shutdown.cancel();
        task.await.unwrap();

        assert_eq!(sink.reports.lock().len(), 2);
        assert_eq!(access.activations.load(Ordering::SeqCst), 2);
    }
}
