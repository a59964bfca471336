use std::collections::BTreeSet;

use tracing::{debug, info};

use cardbridge_acs_store::AcsSession;
use cardbridge_core_types::{ComboId, LocationId, PermissionNameId};

use crate::errors::EngineError;

/// Returns the combo whose member set equals `members`, creating it when none does.
pub(crate) fn find_or_create_combo(
    session: &mut dyn AcsSession,
    location_group: LocationId,
    members: &BTreeSet<PermissionNameId>,
) -> Result<ComboId, EngineError> {
    if let Some((combo, _)) = session
        .combos()?
        .into_iter()
        .find(|(_, existing)| existing == members)
    {
        debug!(combo_id = %combo, "reusing permission combo");
        return Ok(combo);
    }

    let combo = session
        .max_combo_id()?
        .map(|max| ComboId(max.0 + 1))
        .unwrap_or(ComboId(1));
    for member in members {
        session.insert_combo_member(location_group, combo, *member)?;
    }
    info!(combo_id = %combo, members = ?members, "created permission combo");
    Ok(combo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::seeded_store;
    use cardbridge_acs_store::AcsStore;

    #[test]
    fn equal_sets_share_one_combo() {
        let store = seeded_store();
        let mut session = store.session().unwrap();
        let tenant = BTreeSet::from([PermissionNameId(10)]);
        let both = BTreeSet::from([PermissionNameId(10), PermissionNameId(11)]);

        let first = find_or_create_combo(&mut *session, LocationId(3), &tenant).unwrap();
        let second = find_or_create_combo(&mut *session, LocationId(3), &both).unwrap();
        let again = find_or_create_combo(&mut *session, LocationId(3), &both).unwrap();

        assert_eq!(first, ComboId(1));
        assert_eq!(second, ComboId(2));
        assert_eq!(again, second);
        assert_eq!(session.row_counts().unwrap().combos, 2);
    }

    #[test]
    fn subset_is_not_a_match() {
        let store = seeded_store();
        let mut session = store.session().unwrap();
        let both = BTreeSet::from([PermissionNameId(10), PermissionNameId(11)]);
        let tenant = BTreeSet::from([PermissionNameId(10)]);
        find_or_create_combo(&mut *session, LocationId(3), &both).unwrap();
        let combo = find_or_create_combo(&mut *session, LocationId(3), &tenant).unwrap();
        assert_eq!(combo, ComboId(2));
    }
}
