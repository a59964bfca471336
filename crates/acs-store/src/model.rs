use chrono::NaiveDateTime;
use serde::Serialize;

use cardbridge_core_types::{
    AclId, CardId, ComboId, CompanyId, CorrelationKey, DeviceGroupId, DeviceSet, LocationId,
    NameId, PermissionNameId, TimeZoneId,
};

/// A `CARDS` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardRow {
    pub id: CardId,
    pub name_id: NameId,
    pub code: String,
    pub card_num: String,
    pub active: bool,
    pub combo_id: Option<ComboId>,
    pub start_date: NaiveDateTime,
    pub stop_date: NaiveDateTime,
    pub download_flag: i64,
}

#[derive(Clone, Debug)]
pub struct NewName<'a> {
    pub location_group: LocationId,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub company: CompanyId,
}

#[derive(Clone, Debug)]
pub struct NewCard<'a> {
    pub name_id: NameId,
    pub location_group: LocationId,
    pub code: &'a str,
    pub card_num: &'a str,
    pub combo_id: ComboId,
    pub start_date: NaiveDateTime,
    pub stop_date: NaiveDateTime,
}

/// One `ACLGrp` row: a device and up to four time zones granted through a permission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceGrant {
    pub permission: PermissionNameId,
    pub device: i64,
    pub time_zones: [TimeZoneId; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceGroupRow {
    pub id: DeviceGroupId,
    pub devices: DeviceSet,
}

/// Acl ids held by a `LocCards` row, primary slot first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CardSlots([Option<AclId>; CardSlots::CAPACITY]);

impl CardSlots {
    pub const CAPACITY: usize = 5;
    /// Column value of an unused slot.
    pub const UNUSED: i64 = -1;

    /// Fills the slots in the given order and hands back whatever did not fit.
    pub fn fill(acls: &[AclId]) -> (Self, Vec<AclId>) {
        let mut slots = [None; Self::CAPACITY];
        for (slot, acl) in slots.iter_mut().zip(acls) {
            *slot = Some(*acl);
        }
        let dropped = acls.iter().skip(Self::CAPACITY).copied().collect();
        (Self(slots), dropped)
    }

    pub fn from_columns(columns: [i64; Self::CAPACITY]) -> Self {
        let mut slots = [None; Self::CAPACITY];
        for (slot, value) in slots.iter_mut().zip(columns) {
            if value != Self::UNUSED {
                *slot = Some(AclId(value));
            }
        }
        Self(slots)
    }

    pub fn columns(&self) -> [i64; Self::CAPACITY] {
        self.0.map(|slot| slot.map(|acl| acl.0).unwrap_or(Self::UNUSED))
    }

    pub fn assigned(&self) -> Vec<AclId> {
        self.0.iter().flatten().copied().collect()
    }
}

/// Active card joined with its holder, as exported to the roster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CardHolder {
    pub name_id: NameId,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub correlation_key: Option<CorrelationKey>,
    pub card: String,
}

/// Row totals for the tables the engine writes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    pub names: i64,
    pub correlation_keys: i64,
    pub cards: i64,
    pub active_cards: i64,
    pub combos: i64,
    pub device_groups: i64,
    pub acls: i64,
    pub slot_rows: i64,
}
