//! Inbox file to status report, through the real engine and an in-memory legacy database.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cardbridge::ingest::{IngestDirSource, OutboxStatusSink, StatusReport};
use cardbridge_acl_engine::{AclEngine, BarrierConfig, EngineConfig};
use cardbridge_acs_store::{AcsStore, ReferenceData, SqliteAcsStore};
use cardbridge_core_types::{never_expires, FixedClock, RequestStatus};
use cardbridge_dispatcher::{CycleReport, DispatcherConfig, RequestDispatcher};
use chrono::NaiveDate;
use serde_json::json;
use tempfile::TempDir;
use tokio::task::JoinHandle;

const REFERENCE: &str = r#"
locations:
  - id: 1
    name: Main
devices:
  - location: 1
    device: 0
    name: Front door
companies:
  - id: 7
    name: Acme
attributes:
  - num: 1
    name: ID
permissions:
  - id: 10
    name: Default
    grants:
      - device: 0
        time_zones: [1]
"#;

struct Bridge {
    _dir: TempDir,
    inbox: PathBuf,
    outbox: PathBuf,
    store: Arc<SqliteAcsStore>,
    clock: Arc<FixedClock>,
    dispatcher: RequestDispatcher,
}

fn bridge(barrier: BarrierConfig) -> Bridge {
    let dir = tempfile::tempdir().unwrap();
    let inbox = dir.path().join("inbox");
    let outbox = dir.path().join("outbox");

    let store = Arc::new(SqliteAcsStore::open_in_memory().unwrap());
    store
        .seed(&ReferenceData::from_yaml(REFERENCE).unwrap())
        .unwrap();
    let clock = Arc::new(FixedClock::new(
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(15, 9, 0)
            .unwrap(),
    ));
    let engine = AclEngine::connect(
        store.clone(),
        clock.clone(),
        EngineConfig {
            barrier,
            ..EngineConfig::default()
        },
    )
    .unwrap();
    let dispatcher = RequestDispatcher::new(
        Arc::new(IngestDirSource::new(&inbox)),
        Arc::new(OutboxStatusSink::new(&outbox)),
        Arc::new(engine),
        "Default",
        DispatcherConfig::default(),
    );

    Bridge {
        _dir: dir,
        inbox,
        outbox,
        store,
        clock,
        dispatcher,
    }
}

fn fast_barrier() -> BarrierConfig {
    BarrierConfig {
        attempts: 2_000,
        interval: Duration::from_millis(1),
    }
}

fn drop_request(inbox: &Path, file: &str, body: serde_json::Value) {
    fs::create_dir_all(inbox).unwrap();
    fs::write(inbox.join(file), body.to_string()).unwrap();
}

fn read_report(outbox: &Path, id: &str) -> StatusReport {
    let text = fs::read_to_string(outbox.join(format!("{id}.status.json"))).unwrap();
    serde_json::from_str(&text).unwrap()
}

fn spawn_comm_server(store: Arc<SqliteAcsStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            store.acknowledge_downloads().unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
}

fn r1() -> serde_json::Value {
    json!({
        "id": "r1",
        "method": "enable",
        "first_name": "Ann",
        "last_name": "Lee",
        "company": "Acme",
        "woo_id": "u-42",
        "card_num": "0042"
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn enable_request_is_applied_and_reported_once() {
    let bridge = bridge(fast_barrier());
    let comm = spawn_comm_server(bridge.store.clone());

    drop_request(&bridge.inbox, "001.json", r1());
    let report = bridge.dispatcher.poll_once().await;
    assert_eq!(
        report,
        CycleReport {
            polled: 1,
            processed: 1,
            succeeded: 1,
            ..CycleReport::default()
        }
    );
    assert_eq!(read_report(&bridge.outbox, "r1").status, RequestStatus::Success);

    {
        let mut session = bridge.store.session().unwrap();
        let cards = session.cards_by_code("42").unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].card_num, "0042");
        assert!(cards[0].active);
        assert_eq!(cards[0].stop_date, never_expires());
        let counts = session.row_counts().unwrap();
        assert_eq!(counts.names, 1);
        assert_eq!(counts.correlation_keys, 1);
        assert_eq!(counts.combos, 1);
    }

    fs::remove_file(bridge.outbox.join("r1.status.json")).unwrap();
    drop_request(&bridge.inbox, "002.json", r1());
    let report = bridge.dispatcher.poll_once().await;
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.processed, 0);
    assert!(!bridge.outbox.join("r1.status.json").exists());
    assert_eq!(bridge.store.session().unwrap().row_counts().unwrap().cards, 1);

    comm.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deactivate_then_reactivate_reuses_the_card_row() {
    let bridge = bridge(fast_barrier());
    let comm = spawn_comm_server(bridge.store.clone());

    drop_request(&bridge.inbox, "001.json", r1());
    bridge.dispatcher.poll_once().await;

    bridge.clock.advance(chrono::Duration::days(2));
    drop_request(
        &bridge.inbox,
        "002.json",
        json!({"id": "r2", "method": "disable", "card": "42", "company": "Acme"}),
    );
    let report = bridge.dispatcher.poll_once().await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(read_report(&bridge.outbox, "r2").status, RequestStatus::Success);
    {
        let mut session = bridge.store.session().unwrap();
        let card = &session.cards_by_code("42").unwrap()[0];
        assert!(!card.active);
        assert_eq!(
            card.stop_date,
            NaiveDate::from_ymd_opt(2026, 3, 16)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    let mut again = r1();
    again["id"] = json!("r3");
    drop_request(&bridge.inbox, "003.json", again);
    let report = bridge.dispatcher.poll_once().await;
    assert_eq!(report.succeeded, 1);
    {
        let mut session = bridge.store.session().unwrap();
        let cards = session.cards_by_code("42").unwrap();
        assert_eq!(cards.len(), 1);
        assert!(cards[0].active);
        assert_eq!(cards[0].stop_date, never_expires());
        assert_eq!(session.row_counts().unwrap().names, 1);
    }

    comm.abort();
}

#[tokio::test]
async fn disabling_an_unknown_card_succeeds_without_writes() {
    let bridge = bridge(BarrierConfig {
        attempts: 1,
        interval: Duration::from_millis(1),
    });
    drop_request(
        &bridge.inbox,
        "001.json",
        json!([{"id": "r9", "method": "disable", "card": "977"}]),
    );
    let report = bridge.dispatcher.poll_once().await;
    assert_eq!(report.succeeded, 1);
    assert_eq!(read_report(&bridge.outbox, "r9").status, RequestStatus::Success);
    assert_eq!(bridge.store.session().unwrap().row_counts().unwrap().cards, 0);
    assert!(!bridge.store.full_download_pending().unwrap());
}

#[tokio::test]
async fn barrier_timeout_and_malformed_requests_report_not_done() {
    let bridge = bridge(BarrierConfig {
        attempts: 2,
        interval: Duration::from_millis(1),
    });
    drop_request(
        &bridge.inbox,
        "001.json",
        json!([
            r1(),
            {"id": "r5", "method": "enable", "card": "7"},
            {"method": "disable", "card": "7"}
        ]),
    );
    let report = bridge.dispatcher.poll_once().await;
    assert_eq!(report.polled, 3);
    assert_eq!(report.not_done, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(read_report(&bridge.outbox, "r1").status, RequestStatus::NotDone);
    assert_eq!(read_report(&bridge.outbox, "r5").status, RequestStatus::NotDone);

    // The timed-out activation stays committed; the comm server picks it up later.
    let cards = bridge.store.session().unwrap().cards_by_code("42").unwrap();
    assert_eq!(cards.len(), 1);
    assert!(bridge.store.full_download_pending().unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn numeric_fields_and_unreadable_siblings_are_all_reported() {
    let bridge = bridge(fast_barrier());
    let comm = spawn_comm_server(bridge.store.clone());

    drop_request(
        &bridge.inbox,
        "001.json",
        json!([
            {
                "id": "r1",
                "method": "enable",
                "first_name": "Ann",
                "last_name": "Lee",
                "company": "Acme",
                "user_id": 42,
                "card": "0042"
            },
            {"id": "r2", "method": "disable", "card": 77},
            {"id": 3, "method": ["enable"], "card": "9"}
        ]),
    );
    let report = bridge.dispatcher.poll_once().await;
    assert_eq!(report.polled, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.not_done, 1);
    assert_eq!(read_report(&bridge.outbox, "r1").status, RequestStatus::Success);
    assert_eq!(read_report(&bridge.outbox, "r2").status, RequestStatus::Success);
    assert_eq!(read_report(&bridge.outbox, "3").status, RequestStatus::NotDone);
    assert!(!bridge.inbox.join("001.json.rejected").exists());

    {
        let mut session = bridge.store.session().unwrap();
        assert_eq!(session.cards_by_code("42").unwrap().len(), 1);
        assert_eq!(session.row_counts().unwrap().correlation_keys, 1);
    }

    comm.abort();
}
