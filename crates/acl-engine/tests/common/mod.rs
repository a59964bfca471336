#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cardbridge_acl_engine::{AclEngine, BarrierConfig, EngineConfig};
use cardbridge_acs_store::{AcsStore, ReferenceData, RowCounts, SqliteAcsStore};
use cardbridge_core_types::{CardCode, Enrollment, FixedClock};
use chrono::{NaiveDate, NaiveDateTime};
use tokio::task::JoinHandle;

pub const REFERENCE: &str = r#"
locations:
  - id: 1
    name: Main
devices:
  - location: 1
    device: 0
    name: Front door
  - location: 1
    device: 1
    name: Gym
  - location: 1
    device: 2
    name: Roof
companies:
  - id: 7
    name: Acme
  - id: 8
    name: Globex
attributes:
  - num: 1
    name: ID
permissions:
  - id: 10
    name: Default
    grants:
      - device: 0
        time_zones: [1]
  - id: 11
    name: Lobby
    grants:
      - device: 0
        time_zones: [2]
      - device: 1
        time_zones: [2]
  - id: 12
    name: Lobby Copy
    grants:
      - device: 1
        time_zones: [2]
      - device: 0
        time_zones: [2]
  - id: 13
    name: Wide
    grants:
      - device: 1
        time_zones: [3, 4, 5, 6]
      - device: 2
        time_zones: [7, 8]
"#;

pub struct Harness {
    pub store: Arc<SqliteAcsStore>,
    pub clock: Arc<FixedClock>,
    pub engine: AclEngine,
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

pub fn fast_barrier() -> BarrierConfig {
    BarrierConfig {
        attempts: 2_000,
        interval: Duration::from_millis(1),
    }
}

pub fn harness_with(barrier: BarrierConfig) -> Harness {
    let store = Arc::new(SqliteAcsStore::open_in_memory().unwrap());
    store
        .seed(&ReferenceData::from_yaml(REFERENCE).unwrap())
        .unwrap();
    let clock = Arc::new(FixedClock::new(at(2026, 3, 14, 15, 9)));
    let config = EngineConfig {
        barrier,
        ..EngineConfig::default()
    };
    let engine = AclEngine::connect(store.clone(), clock.clone(), config).unwrap();
    Harness {
        store,
        clock,
        engine,
    }
}

pub fn harness() -> Harness {
    harness_with(fast_barrier())
}

impl Harness {
    pub fn counts(&self) -> RowCounts {
        self.store.session().unwrap().row_counts().unwrap()
    }

    /// Stands in for the comm server: keeps clearing download flags until aborted.
    pub fn spawn_comm_server(&self) -> JoinHandle<()> {
        let store = self.store.clone();
        tokio::spawn(async move {
            loop {
                store.acknowledge_downloads().unwrap();
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    }
}

pub fn enrollment(first: &str, last: &str, company: &str, user: &str, card: &str) -> Enrollment {
    Enrollment {
        first_name: first.into(),
        last_name: last.into(),
        company: company.into(),
        external_user_id: user.into(),
        card: CardCode::parse(card).unwrap(),
    }
}

pub fn ann() -> Enrollment {
    enrollment("Ann", "Lee", "Acme", "u-42", "0042")
}
