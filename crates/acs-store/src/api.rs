use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use cardbridge_core_types::{
    AclId, CardId, ComboId, CompanyId, CorrelationKey, DeviceGroupId, LocationId, NameId,
    PermissionNameId, TimeZoneId, UdfNum,
};

use crate::errors::StoreError;
use crate::model::{
    CardHolder, CardRow, CardSlots, DeviceGrant, DeviceGroupRow, NewCard, NewName, RowCounts,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Exclusive, transactional access to the legacy schema.
pub trait AcsStore: Send + Sync {
    /// Takes the connection guard and opens a transaction. The guard is held until the
    /// session is committed or dropped; dropping without commit rolls back.
    fn session(&self) -> StoreResult<Box<dyn AcsSession + '_>>;

    /// Whether any location still waits for a full download. Reads without opening a write
    /// transaction.
    fn full_download_pending(&self) -> StoreResult<bool>;
}

/// Typed operations over one open transaction.
pub trait AcsSession {
    // identities
    fn udf_num(&mut self, attribute: &str) -> StoreResult<Option<UdfNum>>;
    fn names_by_correlation_key(
        &mut self,
        udf: UdfNum,
        key: &CorrelationKey,
    ) -> StoreResult<Vec<NameId>>;
    fn company_id(&mut self, company: &str) -> StoreResult<Option<CompanyId>>;
    fn names_by_fields(
        &mut self,
        first_name: &str,
        last_name: &str,
        company: CompanyId,
    ) -> StoreResult<Vec<NameId>>;
    fn insert_name(&mut self, name: &NewName<'_>) -> StoreResult<NameId>;
    fn udf_text(&mut self, name: NameId, udf: UdfNum) -> StoreResult<Option<String>>;
    fn insert_udf_text(
        &mut self,
        location_group: LocationId,
        name: NameId,
        udf: UdfNum,
        text: &str,
    ) -> StoreResult<()>;
    fn update_udf_text(&mut self, name: NameId, udf: UdfNum, text: &str) -> StoreResult<()>;

    // permissions and combos
    fn permission_name_id(&mut self, permission: &str) -> StoreResult<Option<PermissionNameId>>;
    /// Every combo id with its member set.
    fn combos(&mut self) -> StoreResult<Vec<(ComboId, BTreeSet<PermissionNameId>)>>;
    fn combo_members(&mut self, combo: ComboId) -> StoreResult<BTreeSet<PermissionNameId>>;
    fn max_combo_id(&mut self) -> StoreResult<Option<ComboId>>;
    fn insert_combo_member(
        &mut self,
        location_group: LocationId,
        combo: ComboId,
        permission: PermissionNameId,
    ) -> StoreResult<()>;
    fn device_grants(&mut self, combo: ComboId) -> StoreResult<Vec<DeviceGrant>>;

    // device groups and acl entries
    fn device_groups(&mut self) -> StoreResult<Vec<DeviceGroupRow>>;
    fn max_device_group_id(&mut self) -> StoreResult<Option<DeviceGroupId>>;
    /// Inserts the full device row flagged for download.
    fn insert_device_group(&mut self, group: &DeviceGroupRow) -> StoreResult<()>;
    fn acl_for(&mut self, time_zone: TimeZoneId, group: DeviceGroupId) -> StoreResult<Option<AclId>>;
    fn max_acl_id(&mut self) -> StoreResult<Option<AclId>>;
    fn insert_acl(
        &mut self,
        location: LocationId,
        acl: AclId,
        time_zone: TimeZoneId,
        group: DeviceGroupId,
    ) -> StoreResult<()>;

    // cards
    fn cards_by_code(&mut self, code: &str) -> StoreResult<Vec<CardRow>>;
    fn insert_card(&mut self, card: &NewCard<'_>) -> StoreResult<CardId>;
    /// Moves the card to another combo and clears its download flag.
    fn set_card_combo(&mut self, card: CardId, combo: ComboId) -> StoreResult<()>;
    fn activate_card(
        &mut self,
        card: CardId,
        owner: NameId,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> StoreResult<()>;
    fn deactivate_card(&mut self, card: CardId, stop: NaiveDateTime) -> StoreResult<()>;
    fn card_slots(&mut self, card: CardId) -> StoreResult<Option<CardSlots>>;
    /// Writes the slot row, inserting it on first use, flagged for download.
    fn upsert_card_slots(
        &mut self,
        location: LocationId,
        card: CardId,
        slots: &CardSlots,
    ) -> StoreResult<()>;
    fn mark_card_slots_dirty(&mut self, card: CardId) -> StoreResult<usize>;

    // sync handshake
    fn raise_sync_flags(&mut self) -> StoreResult<()>;

    // reporting
    fn active_card_holders(
        &mut self,
        company: &str,
        udf: Option<UdfNum>,
    ) -> StoreResult<Vec<CardHolder>>;
    fn row_counts(&mut self) -> StoreResult<RowCounts>;

    fn commit(self: Box<Self>) -> StoreResult<()>;
}
