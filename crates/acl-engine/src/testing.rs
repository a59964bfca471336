use chrono::{NaiveDate, NaiveDateTime};

use cardbridge_acs_store::{ReferenceData, SqliteAcsStore};
use cardbridge_core_types::{CardCode, Enrollment};

const REFERENCE: &str = r#"
locations:
  - id: 1
    name: Main
devices:
  - location: 1
    device: 0
  - location: 1
    device: 5
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
      - device: 5
        time_zones: [1, 2]
  - id: 11
    name: Visitor
    grants:
      - device: 5
        time_zones: [2]
  - id: 12
    name: Broken
    grants:
      - device: 200
        time_zones: [1]
"#;

pub(crate) fn seeded_store() -> SqliteAcsStore {
    let store = SqliteAcsStore::open_in_memory().unwrap();
    store
        .seed(&ReferenceData::from_yaml(REFERENCE).unwrap())
        .unwrap();
    store
}

pub(crate) fn enrollment(
    first: &str,
    last: &str,
    company: &str,
    user: &str,
    card: &str,
) -> Enrollment {
    Enrollment {
        first_name: first.into(),
        last_name: last.into(),
        company: company.into(),
        external_user_id: user.into(),
        card: CardCode::parse(card).unwrap(),
    }
}

pub(crate) fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}
