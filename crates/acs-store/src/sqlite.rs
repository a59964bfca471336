use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDateTime;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use cardbridge_core_types::{
    AclId, CardId, ComboId, CompanyId, CorrelationKey, DeviceGroupId, DeviceSet, LocationId,
    NameId, PermissionNameId, TimeZoneId, UdfNum, DEVICE_UNIVERSE,
};

use crate::api::{AcsSession, AcsStore, StoreResult};
use crate::model::{
    CardHolder, CardRow, CardSlots, DeviceGrant, DeviceGroupRow, NewCard, NewName, RowCounts,
};
use crate::schema::{self, device_columns, ReferenceData};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Legacy schema hosted in SQLite behind a single guarded connection.
pub struct SqliteAcsStore {
    conn: Mutex<Connection>,
}

impl SqliteAcsStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        debug!(path = %path.as_ref().display(), "opened acs database");
        Ok(Self::from_connection(conn))
    }

    /// Fresh in-memory database with the schema installed.
    pub fn open_in_memory() -> StoreResult<Self> {
        let store = Self::from_connection(Connection::open_in_memory()?);
        store.install_schema()?;
        Ok(store)
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn install_schema(&self) -> StoreResult<()> {
        schema::install(&self.conn.lock())
    }

    pub fn seed(&self, data: &ReferenceData) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        data.apply(&tx)?;
        tx.commit()?;
        debug!(
            companies = data.companies.len(),
            permissions = data.permissions.len(),
            "reference data applied"
        );
        Ok(())
    }

    /// What the comm server does once it has pushed pending changes to the panels: clears
    /// every download flag. Returns the number of locations that were pending.
    pub fn acknowledge_downloads(&self) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let cleared = conn.execute(
            "UPDATE LOC SET PlFlag = 0, DlFlag = 0, FullDlFlag = 0 \
             WHERE PlFlag <> 0 OR DlFlag <> 0 OR FullDlFlag <> 0",
            [],
        )?;
        conn.execute_batch(
            "UPDATE DEV SET DlFlag = 0;
             UPDATE IO SET DlFlag = 0;
             UPDATE DGRP SET DlFlag = 0;
             UPDATE ACL SET DlFlag = 0;
             UPDATE LocCards SET DlFlag = 0;
             UPDATE CARDS SET DlFlag = 1;",
        )?;
        Ok(cleared)
    }
}

impl AcsStore for SqliteAcsStore {
    fn session(&self) -> StoreResult<Box<dyn AcsSession + '_>> {
        let session = SqliteSession::begin(self.conn.lock())?;
        Ok(Box::new(session))
    }

    fn full_download_pending(&self) -> StoreResult<bool> {
        let conn = self.conn.lock();
        Ok(conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM LOC WHERE FullDlFlag <> 0)",
            [],
            |row| row.get(0),
        )?)
    }
}

pub struct SqliteSession<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl<'a> SqliteSession<'a> {
    fn begin(conn: MutexGuard<'a, Connection>) -> StoreResult<Self> {
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    fn max_id(&self, sql: &str) -> StoreResult<Option<i64>> {
        Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
    }
}

impl Drop for SqliteSession<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => debug!("acs session rolled back"),
            Err(err) => warn!(error = %err, "acs session rollback failed"),
        }
    }
}

fn card_row(row: &Row<'_>) -> rusqlite::Result<CardRow> {
    Ok(CardRow {
        id: CardId(row.get(0)?),
        name_id: NameId(row.get(1)?),
        code: row.get(2)?,
        card_num: row.get(3)?,
        active: row.get(4)?,
        combo_id: row.get::<_, Option<i64>>(5)?.map(ComboId),
        start_date: row.get(6)?,
        stop_date: row.get(7)?,
        download_flag: row.get(8)?,
    })
}

fn device_group_row(row: &Row<'_>) -> rusqlite::Result<DeviceGroupRow> {
    let mut bits = 0u128;
    for index in 0..DEVICE_UNIVERSE {
        let flag: i64 = row.get(index + 1)?;
        if flag != 0 {
            bits |= 1u128 << index;
        }
    }
    Ok(DeviceGroupRow {
        id: DeviceGroupId(row.get(0)?),
        devices: DeviceSet::from_bits(bits),
    })
}

impl AcsSession for SqliteSession<'_> {
    fn udf_num(&mut self, attribute: &str) -> StoreResult<Option<UdfNum>> {
        let num = self
            .conn
            .query_row(
                "SELECT UdfNum FROM UdfName WHERE Name = ?1",
                params![attribute],
                |row| row.get(0),
            )
            .optional()?;
        Ok(num.map(UdfNum))
    }

    fn names_by_correlation_key(
        &mut self,
        udf: UdfNum,
        key: &CorrelationKey,
    ) -> StoreResult<Vec<NameId>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT NameID FROM UDF WHERE UdfNum = ?1 AND UdfText = ?2 ORDER BY NameID",
        )?;
        let rows = stmt.query_map(params![udf.0, key.as_str()], |row| row.get(0).map(NameId))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn company_id(&mut self, company: &str) -> StoreResult<Option<CompanyId>> {
        let id = self
            .conn
            .query_row(
                "SELECT Company FROM COMPANY WHERE Name = ?1",
                params![company],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(CompanyId))
    }

    fn names_by_fields(
        &mut self,
        first_name: &str,
        last_name: &str,
        company: CompanyId,
    ) -> StoreResult<Vec<NameId>> {
        let mut stmt = self.conn.prepare(
            "SELECT ID FROM NAMES WHERE FName = ?1 AND LName = ?2 AND Company = ?3 ORDER BY ID",
        )?;
        let rows = stmt.query_map(params![first_name, last_name, company.0], |row| {
            row.get(0).map(NameId)
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_name(&mut self, name: &NewName<'_>) -> StoreResult<NameId> {
        self.conn.execute(
            "INSERT INTO NAMES (LocGrp, FName, LName, Company) VALUES (?1, ?2, ?3, ?4)",
            params![
                name.location_group.0,
                name.first_name,
                name.last_name,
                name.company.0
            ],
        )?;
        Ok(NameId(self.conn.last_insert_rowid()))
    }

    fn udf_text(&mut self, name: NameId, udf: UdfNum) -> StoreResult<Option<String>> {
        let text = self
            .conn
            .query_row(
                "SELECT UdfText FROM UDF WHERE NameID = ?1 AND UdfNum = ?2 ORDER BY ID",
                params![name.0, udf.0],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(text.map(Option::unwrap_or_default))
    }

    fn insert_udf_text(
        &mut self,
        location_group: LocationId,
        name: NameId,
        udf: UdfNum,
        text: &str,
    ) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO UDF (LocGrp, NameID, UdfNum, UdfText) VALUES (?1, ?2, ?3, ?4)",
            params![location_group.0, name.0, udf.0, text],
        )?;
        Ok(())
    }

    fn update_udf_text(&mut self, name: NameId, udf: UdfNum, text: &str) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE UDF SET UdfText = ?3 WHERE NameID = ?1 AND UdfNum = ?2",
            params![name.0, udf.0, text],
        )?;
        Ok(())
    }

    fn permission_name_id(&mut self, permission: &str) -> StoreResult<Option<PermissionNameId>> {
        let id = self
            .conn
            .query_row(
                "SELECT ID FROM AclGrpName WHERE Name = ?1",
                params![permission],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.map(PermissionNameId))
    }

    fn combos(&mut self) -> StoreResult<Vec<(ComboId, BTreeSet<PermissionNameId>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT ComboID, AclGrpNameID FROM AclGrpCombo ORDER BY ComboID")?;
        let rows = stmt.query_map([], |row| {
            Ok((ComboId(row.get(0)?), PermissionNameId(row.get(1)?)))
        })?;
        let mut grouped: BTreeMap<ComboId, BTreeSet<PermissionNameId>> = BTreeMap::new();
        for row in rows {
            let (combo, member) = row?;
            grouped.entry(combo).or_default().insert(member);
        }
        Ok(grouped.into_iter().collect())
    }

    fn combo_members(&mut self, combo: ComboId) -> StoreResult<BTreeSet<PermissionNameId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT AclGrpNameID FROM AclGrpCombo WHERE ComboID = ?1")?;
        let rows = stmt.query_map(params![combo.0], |row| row.get(0).map(PermissionNameId))?;
        Ok(rows.collect::<Result<BTreeSet<_>, _>>()?)
    }

    fn max_combo_id(&mut self) -> StoreResult<Option<ComboId>> {
        Ok(self
            .max_id("SELECT MAX(ComboID) FROM AclGrpCombo")?
            .map(ComboId))
    }

    fn insert_combo_member(
        &mut self,
        location_group: LocationId,
        combo: ComboId,
        permission: PermissionNameId,
    ) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO AclGrpCombo (AclGrpNameID, ComboID, LocGrp) VALUES (?1, ?2, ?3)",
            params![permission.0, combo.0, location_group.0],
        )?;
        Ok(())
    }

    fn device_grants(&mut self, combo: ComboId) -> StoreResult<Vec<DeviceGrant>> {
        let mut stmt = self.conn.prepare(
            "SELECT AclGrpNameID, Dev, Tz1, Tz2, Tz3, Tz4 FROM ACLGrp \
             WHERE AclGrpNameID IN (SELECT AclGrpNameID FROM AclGrpCombo WHERE ComboID = ?1) \
             ORDER BY AclGrpNameID, ID",
        )?;
        let rows = stmt.query_map(params![combo.0], |row| {
            Ok(DeviceGrant {
                permission: PermissionNameId(row.get(0)?),
                device: row.get(1)?,
                time_zones: [
                    TimeZoneId(row.get(2)?),
                    TimeZoneId(row.get(3)?),
                    TimeZoneId(row.get(4)?),
                    TimeZoneId(row.get(5)?),
                ],
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn device_groups(&mut self) -> StoreResult<Vec<DeviceGroupRow>> {
        let sql = format!("SELECT DGrp, {} FROM DGRP ORDER BY DGrp", device_columns());
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], device_group_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn max_device_group_id(&mut self) -> StoreResult<Option<DeviceGroupId>> {
        Ok(self
            .max_id("SELECT MAX(DGrp) FROM DGRP")?
            .map(DeviceGroupId))
    }

    fn insert_device_group(&mut self, group: &DeviceGroupRow) -> StoreResult<()> {
        let mut values: Vec<i64> = Vec::with_capacity(DEVICE_UNIVERSE + 3);
        values.extend([group.id.0, 1, 0]);
        values.extend((0..DEVICE_UNIVERSE).map(|index| i64::from(group.devices.contains(index))));
        let placeholders = (1..=values.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO DGRP (DGrp, DlFlag, CkSum, {}) VALUES ({placeholders})",
            device_columns()
        );
        self.conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(())
    }

    fn acl_for(&mut self, time_zone: TimeZoneId, group: DeviceGroupId) -> StoreResult<Option<AclId>> {
        let acl = self
            .conn
            .query_row(
                "SELECT Acl FROM ACL WHERE Tz = ?1 AND DGrp = ?2 ORDER BY Acl",
                params![time_zone.0, group.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(acl.map(AclId))
    }

    fn max_acl_id(&mut self) -> StoreResult<Option<AclId>> {
        Ok(self.max_id("SELECT MAX(Acl) FROM ACL")?.map(AclId))
    }

    fn insert_acl(
        &mut self,
        location: LocationId,
        acl: AclId,
        time_zone: TimeZoneId,
        group: DeviceGroupId,
    ) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO ACL (Loc, Acl, Tz, DGrp, DlFlag, CkSum) VALUES (?1, ?2, ?3, ?4, 1, 0)",
            params![location.0, acl.0, time_zone.0, group.0],
        )?;
        Ok(())
    }

    fn cards_by_code(&mut self, code: &str) -> StoreResult<Vec<CardRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT ID, NameID, Code, CardNum, Status, AclGrpComboID, StartDate, StopDate, DlFlag \
             FROM CARDS WHERE Code = ?1 ORDER BY ID",
        )?;
        let rows = stmt.query_map(params![code], card_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_card(&mut self, card: &NewCard<'_>) -> StoreResult<CardId> {
        self.conn.execute(
            "INSERT INTO CARDS \
             (NameID, LocGrp, Code, StartDate, StopDate, Status, CardNum, DlFlag, AclGrpComboID) \
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, 0, ?7)",
            params![
                card.name_id.0,
                card.location_group.0,
                card.code,
                card.start_date,
                card.stop_date,
                card.card_num,
                card.combo_id.0
            ],
        )?;
        Ok(CardId(self.conn.last_insert_rowid()))
    }

    fn set_card_combo(&mut self, card: CardId, combo: ComboId) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE CARDS SET AclGrpComboID = ?2, DlFlag = 0 WHERE ID = ?1",
            params![card.0, combo.0],
        )?;
        Ok(())
    }

    fn activate_card(
        &mut self,
        card: CardId,
        owner: NameId,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE CARDS SET NameID = ?2, StartDate = ?3, StopDate = ?4, Status = 1, DlFlag = 0 \
             WHERE ID = ?1",
            params![card.0, owner.0, start, stop],
        )?;
        Ok(())
    }

    fn deactivate_card(&mut self, card: CardId, stop: NaiveDateTime) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE CARDS SET StopDate = ?2, Status = 0, DlFlag = 0 WHERE ID = ?1",
            params![card.0, stop],
        )?;
        Ok(())
    }

    fn card_slots(&mut self, card: CardId) -> StoreResult<Option<CardSlots>> {
        let columns = self
            .conn
            .query_row(
                "SELECT Acl, Acl1, Acl2, Acl3, Acl4 FROM LocCards WHERE CardID = ?1 ORDER BY ID",
                params![card.0],
                |row| {
                    Ok([
                        row.get::<_, i64>(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ])
                },
            )
            .optional()?;
        Ok(columns.map(CardSlots::from_columns))
    }

    fn upsert_card_slots(
        &mut self,
        location: LocationId,
        card: CardId,
        slots: &CardSlots,
    ) -> StoreResult<()> {
        let [acl, acl1, acl2, acl3, acl4] = slots.columns();
        let updated = self.conn.execute(
            "UPDATE LocCards SET Loc = ?2, DlFlag = 1, CkSum = 0, \
             Acl = ?3, Acl1 = ?4, Acl2 = ?5, Acl3 = ?6, Acl4 = ?7 WHERE CardID = ?1",
            params![card.0, location.0, acl, acl1, acl2, acl3, acl4],
        )?;
        if updated == 0 {
            self.conn.execute(
                "INSERT INTO LocCards (Loc, CardID, DlFlag, CkSum, Acl, Acl1, Acl2, Acl3, Acl4) \
                 VALUES (?1, ?2, 1, 0, ?3, ?4, ?5, ?6, ?7)",
                params![location.0, card.0, acl, acl1, acl2, acl3, acl4],
            )?;
        }
        Ok(())
    }

    fn mark_card_slots_dirty(&mut self, card: CardId) -> StoreResult<usize> {
        Ok(self.conn.execute(
            "UPDATE LocCards SET DlFlag = 1, CkSum = 0 WHERE CardID = ?1",
            params![card.0],
        )?)
    }

    fn raise_sync_flags(&mut self) -> StoreResult<()> {
        self.conn.execute_batch(
            "UPDATE DEV SET DlFlag = 1, CkSum = 0;
             UPDATE IO SET DlFlag = 1;
             UPDATE LOC SET PlFlag = 1, DlFlag = 1, FullDlFlag = 1,
                 NodeCs = 0, CodeCs = 0, AclCs = 0, DGrpCs = 0;",
        )?;
        Ok(())
    }

    fn active_card_holders(
        &mut self,
        company: &str,
        udf: Option<UdfNum>,
    ) -> StoreResult<Vec<CardHolder>> {
        let mut stmt = self.conn.prepare(
            "SELECT N.ID, N.FName, N.LName, C.Name, U.UdfText, K.Code \
             FROM CARDS K \
             JOIN NAMES N ON N.ID = K.NameID \
             JOIN COMPANY C ON C.Company = N.Company \
             LEFT JOIN UDF U ON U.NameID = N.ID AND U.UdfNum = ?2 \
             WHERE K.Status = 1 AND C.Name = ?1 \
             ORDER BY N.LName, N.FName, K.Code",
        )?;
        let rows = stmt.query_map(params![company, udf.map(|num| num.0)], |row| {
            Ok(CardHolder {
                name_id: NameId(row.get(0)?),
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                company: row.get(3)?,
                correlation_key: row
                    .get::<_, Option<String>>(4)?
                    .map(CorrelationKey::from_stored),
                card: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn row_counts(&mut self) -> StoreResult<RowCounts> {
        Ok(self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM NAMES), (SELECT COUNT(*) FROM UDF), \
             (SELECT COUNT(*) FROM CARDS), (SELECT COUNT(*) FROM CARDS WHERE Status = 1), \
             (SELECT COUNT(DISTINCT ComboID) FROM AclGrpCombo), (SELECT COUNT(*) FROM DGRP), \
             (SELECT COUNT(*) FROM ACL), (SELECT COUNT(*) FROM LocCards)",
            [],
            |row| {
                Ok(RowCounts {
                    names: row.get(0)?,
                    correlation_keys: row.get(1)?,
                    cards: row.get(2)?,
                    active_cards: row.get(3)?,
                    combos: row.get(4)?,
                    device_groups: row.get(5)?,
                    acls: row.get(6)?,
                    slot_rows: row.get(7)?,
                })
            },
        )?)
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}
