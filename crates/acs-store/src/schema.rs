//! Legacy table layout and reference-data seeding.
//!
//! Column names follow the access-control product's own schema so a mirror can be swapped for
//! the real database without touching queries.

use std::path::Path;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use cardbridge_core_types::DEVICE_UNIVERSE;

use crate::errors::StoreError;

const BASE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS LOC (
    Loc INTEGER PRIMARY KEY,
    Name TEXT NOT NULL DEFAULT '',
    PlFlag INTEGER NOT NULL DEFAULT 0,
    DlFlag INTEGER NOT NULL DEFAULT 0,
    FullDlFlag INTEGER NOT NULL DEFAULT 0,
    NodeCs INTEGER NOT NULL DEFAULT 0,
    CodeCs INTEGER NOT NULL DEFAULT 0,
    AclCs INTEGER NOT NULL DEFAULT 0,
    DGrpCs INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS DEV (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    Loc INTEGER NOT NULL,
    Device INTEGER NOT NULL,
    Name TEXT NOT NULL DEFAULT '',
    DlFlag INTEGER NOT NULL DEFAULT 0,
    CkSum INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS IO (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    Loc INTEGER NOT NULL,
    Name TEXT NOT NULL DEFAULT '',
    DlFlag INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS COMPANY (
    Company INTEGER PRIMARY KEY,
    Name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS NAMES (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    LocGrp INTEGER NOT NULL,
    FName TEXT NOT NULL,
    LName TEXT NOT NULL,
    Company INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS UdfName (
    UdfNum INTEGER PRIMARY KEY,
    Name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS UDF (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    LocGrp INTEGER NOT NULL,
    NameID INTEGER NOT NULL,
    UdfNum INTEGER NOT NULL,
    UdfText TEXT
);
CREATE TABLE IF NOT EXISTS AclGrpName (
    ID INTEGER PRIMARY KEY,
    Name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS AclGrpCombo (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    AclGrpNameID INTEGER NOT NULL,
    ComboID INTEGER NOT NULL,
    LocGrp INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS ACLGrp (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    AclGrpNameID INTEGER NOT NULL,
    Dev INTEGER NOT NULL,
    Tz1 INTEGER NOT NULL DEFAULT 0,
    Tz2 INTEGER NOT NULL DEFAULT 0,
    Tz3 INTEGER NOT NULL DEFAULT 0,
    Tz4 INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS ACL (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    Loc INTEGER NOT NULL,
    Acl INTEGER NOT NULL,
    Tz INTEGER NOT NULL,
    DGrp INTEGER NOT NULL,
    DlFlag INTEGER NOT NULL DEFAULT 0,
    CkSum INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS CARDS (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    NameID INTEGER NOT NULL,
    LocGrp INTEGER NOT NULL,
    Code TEXT NOT NULL,
    StartDate TEXT NOT NULL,
    StopDate TEXT NOT NULL,
    Status INTEGER NOT NULL,
    CardNum TEXT NOT NULL,
    DlFlag INTEGER NOT NULL DEFAULT 0,
    AclGrpComboID INTEGER
);
CREATE TABLE IF NOT EXISTS LocCards (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    Loc INTEGER NOT NULL,
    CardID INTEGER NOT NULL,
    DlFlag INTEGER NOT NULL DEFAULT 0,
    CkSum INTEGER NOT NULL DEFAULT 0,
    Acl INTEGER NOT NULL DEFAULT -1,
    Acl1 INTEGER NOT NULL DEFAULT -1,
    Acl2 INTEGER NOT NULL DEFAULT -1,
    Acl3 INTEGER NOT NULL DEFAULT -1,
    Acl4 INTEGER NOT NULL DEFAULT -1
);
CREATE INDEX IF NOT EXISTS idx_cards_code ON CARDS (Code);
CREATE INDEX IF NOT EXISTS idx_udf_text ON UDF (UdfNum, UdfText);
CREATE INDEX IF NOT EXISTS idx_combo_id ON AclGrpCombo (ComboID);
"#;

/// `D0, D1, ..., D127`
pub(crate) fn device_columns() -> String {
    (0..DEVICE_UNIVERSE)
        .map(|index| format!("D{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn device_group_table() -> String {
    let columns = (0..DEVICE_UNIVERSE)
        .map(|index| format!("    D{index} INTEGER NOT NULL DEFAULT 0"))
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "CREATE TABLE IF NOT EXISTS DGRP (\n    DGrp INTEGER PRIMARY KEY,\n    DlFlag INTEGER NOT NULL DEFAULT 0,\n    CkSum INTEGER NOT NULL DEFAULT 0,\n{columns}\n);"
    )
}

/// Creates any missing legacy table. Existing tables are left untouched.
pub fn install(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(BASE_TABLES)?;
    conn.execute_batch(&device_group_table())?;
    Ok(())
}

/// Static rows the engine reads but never writes: locations, devices, companies, attribute
/// names and the permission buckets with their device grants.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceData {
    #[serde(default)]
    pub locations: Vec<LocationSeed>,
    #[serde(default)]
    pub devices: Vec<DeviceSeed>,
    #[serde(default)]
    pub companies: Vec<CompanySeed>,
    #[serde(default)]
    pub attributes: Vec<AttributeSeed>,
    #[serde(default)]
    pub permissions: Vec<PermissionSeed>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocationSeed {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSeed {
    pub location: i64,
    pub device: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompanySeed {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttributeSeed {
    pub num: i64,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionSeed {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub grants: Vec<GrantSeed>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrantSeed {
    pub device: i64,
    /// Up to four time zones; missing entries are stored as 0.
    pub time_zones: Vec<i64>,
}

impl ReferenceData {
    pub fn from_yaml(text: &str) -> Result<Self, StoreError> {
        let data: Self =
            serde_yaml::from_str(text).map_err(|err| StoreError::InvalidSeed(err.to_string()))?;
        data.validate()?;
        Ok(data)
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        for permission in &self.permissions {
            for grant in &permission.grants {
                if grant.time_zones.len() > 4 {
                    return Err(StoreError::InvalidSeed(format!(
                        "permission '{}' grants device {} more than four time zones",
                        permission.name, grant.device
                    )));
                }
            }
        }
        Ok(())
    }

    /// Writes the rows with replace semantics so re-seeding is harmless.
    pub(crate) fn apply(&self, conn: &Connection) -> Result<(), StoreError> {
        self.validate()?;
        for location in &self.locations {
            conn.execute(
                "INSERT OR REPLACE INTO LOC (Loc, Name) VALUES (?1, ?2)",
                params![location.id, location.name],
            )?;
        }
        for device in &self.devices {
            let existing: i64 = conn.query_row(
                "SELECT COUNT(*) FROM DEV WHERE Loc = ?1 AND Device = ?2",
                params![device.location, device.device],
                |row| row.get(0),
            )?;
            if existing == 0 {
                conn.execute(
                    "INSERT INTO DEV (Loc, Device, Name) VALUES (?1, ?2, ?3)",
                    params![device.location, device.device, device.name],
                )?;
                conn.execute(
                    "INSERT INTO IO (Loc, Name) VALUES (?1, ?2)",
                    params![device.location, device.name],
                )?;
            }
        }
        for company in &self.companies {
            conn.execute(
                "INSERT OR REPLACE INTO COMPANY (Company, Name) VALUES (?1, ?2)",
                params![company.id, company.name],
            )?;
        }
        for attribute in &self.attributes {
            conn.execute(
                "INSERT OR REPLACE INTO UdfName (UdfNum, Name) VALUES (?1, ?2)",
                params![attribute.num, attribute.name],
            )?;
        }
        for permission in &self.permissions {
            conn.execute(
                "INSERT OR REPLACE INTO AclGrpName (ID, Name) VALUES (?1, ?2)",
                params![permission.id, permission.name],
            )?;
            conn.execute(
                "DELETE FROM ACLGrp WHERE AclGrpNameID = ?1",
                params![permission.id],
            )?;
            for grant in &permission.grants {
                let mut zones = [0i64; 4];
                for (slot, zone) in zones.iter_mut().zip(&grant.time_zones) {
                    *slot = *zone;
                }
                conn.execute(
                    "INSERT INTO ACLGrp (AclGrpNameID, Dev, Tz1, Tz2, Tz3, Tz4) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![permission.id, grant.device, zones[0], zones[1], zones[2], zones[3]],
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_columns_cover_universe() {
        let columns = device_columns();
        assert!(columns.starts_with("D0, D1"));
        assert!(columns.ends_with("D127"));
        assert_eq!(columns.split(", ").count(), DEVICE_UNIVERSE);
    }

    #[test]
    fn rejects_more_than_four_time_zones() {
        let yaml = r#"
permissions:
  - id: 1
    name: Tenant
    grants:
      - device: 3
        time_zones: [1, 2, 3, 4, 5]
"#;
        let err = ReferenceData::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, StoreError::InvalidSeed(_)));
    }

    #[test]
    fn install_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        install(&conn).unwrap();
        install(&conn).unwrap();
        let columns: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('DGRP')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(columns, 3 + DEVICE_UNIVERSE as i64);
    }
}
