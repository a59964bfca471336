use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use cardbridge_acs_store::{AcsSession, CardRow, NewCard};
use cardbridge_core_types::{never_expires, CardCode, CardId, ComboId, NameId, PermissionNameId};

use crate::combo::find_or_create_combo;
use crate::config::EngineConfig;
use crate::errors::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct CardResolution {
    pub card_id: CardId,
    pub combo_id: ComboId,
    pub created: bool,
}

pub(crate) fn find_card(
    session: &mut dyn AcsSession,
    card: &CardCode,
) -> Result<Option<CardRow>, EngineError> {
    let mut rows = session.cards_by_code(card.code())?;
    match rows.len() {
        0 | 1 => Ok(rows.pop()),
        count => Err(EngineError::AmbiguousCard {
            code: card.code().to_string(),
            count,
        }),
    }
}

/// Makes `card` active for `owner` with `permission` added to its combo.
pub(crate) fn reconcile_card(
    session: &mut dyn AcsSession,
    config: &EngineConfig,
    owner: NameId,
    card: &CardCode,
    permission: PermissionNameId,
    now: NaiveDateTime,
) -> Result<CardResolution, EngineError> {
    let Some(row) = find_card(session, card)? else {
        let combo_id = find_or_create_combo(
            session,
            config.location_group,
            &BTreeSet::from([permission]),
        )?;
        let card_id = session.insert_card(&NewCard {
            name_id: owner,
            location_group: config.location_group,
            code: card.code(),
            card_num: card.raw(),
            combo_id,
            start_date: now,
            stop_date: never_expires(),
        })?;
        info!(card_id = %card_id, code = %card, combo_id = %combo_id, "created card");
        return Ok(CardResolution {
            card_id,
            combo_id,
            created: true,
        });
    };

    let mut members = match row.combo_id {
        Some(current) => session.combo_members(current)?,
        None => BTreeSet::new(),
    };
    members.insert(permission);
    let combo_id = find_or_create_combo(session, config.location_group, &members)?;
    if row.combo_id != Some(combo_id) {
        debug!(card_id = %row.id, from = ?row.combo_id, to = %combo_id, "moving card to combo");
        session.set_card_combo(row.id, combo_id)?;
    }
    session.activate_card(row.id, owner, now, never_expires())?;
    info!(card_id = %row.id, code = %card, owner = %owner, "reactivated card");
    Ok(CardResolution {
        card_id: row.id,
        combo_id,
        created: false,
    })
}
