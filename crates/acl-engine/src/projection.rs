//! Projects a combo's device grants onto shared device groups, acl entries and card slots.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use cardbridge_acs_store::{AcsSession, CardSlots, DeviceGroupRow};
use cardbridge_core_types::{
    AclId, CardId, ComboId, DeviceGroupId, DeviceSet, LocationId, TimeZoneId,
};

use crate::errors::EngineError;

/// Distinct acl ids, ascending, covering every (time zone, device set) the combo grants.
pub(crate) fn project_acls(
    session: &mut dyn AcsSession,
    location: LocationId,
    combo: ComboId,
) -> Result<Vec<AclId>, EngineError> {
    let mut by_zone: BTreeMap<TimeZoneId, DeviceSet> = BTreeMap::new();
    for grant in session.device_grants(combo)? {
        for zone in grant.time_zones.into_iter().filter(|zone| zone.is_assigned()) {
            by_zone
                .entry(zone)
                .or_default()
                .insert(grant.device)
                .map_err(|_| EngineError::DeviceOutOfRange {
                    permission: grant.permission,
                    device: grant.device,
                })?;
        }
    }

    let mut groups = session.device_groups()?;
    let mut acls = BTreeSet::new();
    for (zone, devices) in by_zone {
        let group = match groups.iter().find(|group| group.devices == devices) {
            Some(group) => group.id,
            None => {
                let row = DeviceGroupRow {
                    id: session
                        .max_device_group_id()?
                        .map(|max| DeviceGroupId(max.0 + 1))
                        .unwrap_or(DeviceGroupId(1)),
                    devices,
                };
                session.insert_device_group(&row)?;
                info!(group = %row.id, devices = ?devices, "created device group");
                groups.push(row);
                row.id
            }
        };
        acls.insert(find_or_create_acl(session, location, zone, group)?);
    }
    Ok(acls.into_iter().collect())
}

fn find_or_create_acl(
    session: &mut dyn AcsSession,
    location: LocationId,
    zone: TimeZoneId,
    group: DeviceGroupId,
) -> Result<AclId, EngineError> {
    if let Some(acl) = session.acl_for(zone, group)? {
        debug!(acl = %acl, time_zone = %zone, group = %group, "reusing acl");
        return Ok(acl);
    }
    let acl = session
        .max_acl_id()?
        .map(|max| AclId(max.0 + 1))
        .unwrap_or(AclId(1));
    session.insert_acl(location, acl, zone, group)?;
    info!(acl = %acl, time_zone = %zone, group = %group, "created acl");
    Ok(acl)
}

/// Writes the card's slot row. Returns the assigned and the dropped acl ids.
pub(crate) fn assign_slots(
    session: &mut dyn AcsSession,
    location: LocationId,
    card: CardId,
    acls: &[AclId],
) -> Result<(Vec<AclId>, Vec<AclId>), EngineError> {
    let (slots, dropped) = CardSlots::fill(acls);
    if !dropped.is_empty() {
        warn!(
            card_id = %card,
            capacity = CardSlots::CAPACITY,
            dropped = ?dropped,
            "card needs more acls than it has slots; dropping the highest ids"
        );
    }
    match session.card_slots(card)? {
        Some(previous) if previous == slots => {
            debug!(card_id = %card, "card slots unchanged");
        }
        previous => {
            info!(card_id = %card, previous = ?previous, slots = ?slots, "card slots updated");
        }
    }
    session.upsert_card_slots(location, card, &slots)?;
    Ok((slots.assigned(), dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::seeded_store;
    use cardbridge_acs_store::AcsStore;
    use cardbridge_core_types::PermissionNameId;

    #[test]
    fn one_acl_per_time_zone() {
        let store = seeded_store();
        let mut session = store.session().unwrap();
        session
            .insert_combo_member(LocationId(3), ComboId(1), PermissionNameId(10))
            .unwrap();
        // Default: device 0 in tz 1, device 5 in tz 1 and 2.
        let acls = project_acls(&mut *session, LocationId(3), ComboId(1)).unwrap();
        assert_eq!(acls, vec![AclId(1), AclId(2)]);

        let groups = session.device_groups().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].devices.iter().collect::<Vec<_>>(), vec![0, 5]);
        assert_eq!(groups[1].devices.iter().collect::<Vec<_>>(), vec![5]);

        let again = project_acls(&mut *session, LocationId(3), ComboId(1)).unwrap();
        assert_eq!(again, acls);
        let counts = session.row_counts().unwrap();
        assert_eq!((counts.device_groups, counts.acls), (2, 2));
    }

    #[test]
    fn out_of_range_device_is_reference_error() {
        let store = seeded_store();
        let mut session = store.session().unwrap();
        // Broken: grants device 200.
        session
            .insert_combo_member(LocationId(3), ComboId(1), PermissionNameId(12))
            .unwrap();
        let err = project_acls(&mut *session, LocationId(3), ComboId(1)).unwrap_err();
        assert!(matches!(err, EngineError::DeviceOutOfRange { device: 200, .. }));
    }

    #[test]
    fn slot_overflow_keeps_lowest_ids() {
        let store = seeded_store();
        let mut session = store.session().unwrap();
        let acls: Vec<AclId> = (1..=6).map(AclId).collect();
        let (kept, dropped) = assign_slots(&mut *session, LocationId(3), CardId(1), &acls).unwrap();
        assert_eq!(kept, acls[..5].to_vec());
        assert_eq!(dropped, vec![AclId(6)]);
        let stored = session.card_slots(CardId(1)).unwrap().unwrap();
        assert_eq!(stored.assigned(), kept);

        let (again, _) = assign_slots(&mut *session, LocationId(3), CardId(1), &acls).unwrap();
        assert_eq!(again, kept);
        assert_eq!(session.row_counts().unwrap().slot_rows, 1);
    }
}
