use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use cardbridge_core_types::{AclId, BridgeError, CardCode, CardId, ComboId, Enrollment, NameId};

/// Grant and revoke card access against the legacy schema.
///
/// Both calls are idempotent and may take seconds while the comm server downloads the change.
#[async_trait]
pub trait CardAccess: Send + Sync {
    async fn activate(
        &self,
        enrollment: &Enrollment,
        permission_name: &str,
    ) -> Result<ActivationOutcome, BridgeError>;

    async fn deactivate(&self, card: &CardCode) -> Result<DeactivationOutcome, BridgeError>;
}

#[async_trait]
impl<A> CardAccess for Arc<A>
where
    A: CardAccess + ?Sized,
{
    async fn activate(
        &self,
        enrollment: &Enrollment,
        permission_name: &str,
    ) -> Result<ActivationOutcome, BridgeError> {
        (**self).activate(enrollment, permission_name).await
    }

    async fn deactivate(&self, card: &CardCode) -> Result<DeactivationOutcome, BridgeError> {
        (**self).deactivate(card).await
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActivationOutcome {
    pub name_id: NameId,
    pub card_id: CardId,
    pub combo_id: ComboId,
    /// Acl ids written to the card's slots, ascending.
    pub acl_ids: Vec<AclId>,
    /// Acl ids that did not fit in the slots.
    pub dropped_acls: Vec<AclId>,
    pub created_card: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeactivationOutcome {
    Deactivated { card_id: CardId },
    /// No card with that code exists; nothing was written.
    NeverActivated,
}
