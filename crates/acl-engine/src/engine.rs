use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task;
use tracing::{debug, info, warn};

use cardbridge_acs_store::{AcsSession, AcsStore, CardHolder};
use cardbridge_core_types::{BridgeError, CardCode, Clock, Enrollment, PermissionNameId};

use crate::api::{ActivationOutcome, CardAccess, DeactivationOutcome};
use crate::barrier::wait_for_full_download;
use crate::card::{find_card, reconcile_card};
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::identity::resolve_identity;
use crate::projection::{assign_slots, project_acls};

/// Reconciles card grants onto the legacy schema.
///
/// Every call reads current state fresh inside one store session; the only cached values are
/// permission-name ids, which the engine never writes.
#[derive(Clone)]
pub struct AclEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: Arc<dyn AcsStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    default_permission: PermissionNameId,
    permissions: DashMap<String, PermissionNameId>,
}

impl AclEngine {
    /// Resolves the configured default permission; fails when it does not exist.
    pub fn connect(
        store: Arc<dyn AcsStore>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let default_permission = {
            let mut session = store.session()?;
            session
                .permission_name_id(&config.default_permission)?
                .ok_or_else(|| EngineError::UnknownPermission(config.default_permission.clone()))?
        };
        let permissions = DashMap::new();
        permissions.insert(config.default_permission.clone(), default_permission);
        info!(
            permission = %config.default_permission,
            id = %default_permission,
            location_group = %config.location_group,
            "acl engine ready"
        );
        Ok(Self {
            inner: Arc::new(EngineInner {
                store,
                clock,
                config,
                default_permission,
                permissions,
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn default_permission(&self) -> PermissionNameId {
        self.inner.default_permission
    }

    pub async fn activate_card(
        &self,
        enrollment: &Enrollment,
        permission_name: &str,
    ) -> Result<ActivationOutcome, EngineError> {
        let enrollment = enrollment.clone();
        let permission_name = permission_name.to_string();
        let outcome = self
            .blocking(move |inner| inner.reconcile_activation(&enrollment, &permission_name))
            .await?;
        self.wait_for_download().await?;
        Ok(outcome)
    }

    pub async fn deactivate_card(
        &self,
        card: &CardCode,
    ) -> Result<DeactivationOutcome, EngineError> {
        let card = card.clone();
        let outcome = self
            .blocking(move |inner| inner.reconcile_deactivation(&card))
            .await?;
        if let DeactivationOutcome::Deactivated { .. } = outcome {
            self.wait_for_download().await?;
        }
        Ok(outcome)
    }

    /// Active cards of one company with their holders.
    pub async fn active_card_holders(
        &self,
        company: &str,
    ) -> Result<Vec<CardHolder>, EngineError> {
        let company = company.to_string();
        self.blocking(move |inner| {
            let mut session = inner.store.session()?;
            let udf = session.udf_num(&inner.config.correlation_field)?;
            Ok(session.active_card_holders(&company, udf)?)
        })
        .await
    }

    async fn wait_for_download(&self) -> Result<u32, EngineError> {
        wait_for_full_download(&self.inner.store, &self.inner.config.barrier).await
    }

    async fn blocking<T, F>(&self, work: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&EngineInner) -> Result<T, EngineError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        task::spawn_blocking(move || work(&inner))
            .await
            .map_err(|err| EngineError::Task(err.to_string()))?
    }
}

impl EngineInner {
    fn permission_id(
        &self,
        session: &mut dyn AcsSession,
        permission_name: &str,
    ) -> Result<PermissionNameId, EngineError> {
        if let Some(id) = self.permissions.get(permission_name) {
            return Ok(*id);
        }
        let id = session
            .permission_name_id(permission_name)?
            .ok_or_else(|| EngineError::UnknownPermission(permission_name.to_string()))?;
        self.permissions.insert(permission_name.to_string(), id);
        Ok(id)
    }

    fn reconcile_activation(
        &self,
        enrollment: &Enrollment,
        permission_name: &str,
    ) -> Result<ActivationOutcome, EngineError> {
        let location = self.config.location_group;
        let mut session = self.store.session()?;
        let permission = self.permission_id(&mut *session, permission_name)?;
        let name_id = resolve_identity(&mut *session, &self.config, enrollment)?;
        let card = reconcile_card(
            &mut *session,
            &self.config,
            name_id,
            &enrollment.card,
            permission,
            self.clock.now(),
        )?;
        let acls = project_acls(&mut *session, location, card.combo_id)?;
        let (acl_ids, dropped_acls) = assign_slots(&mut *session, location, card.card_id, &acls)?;
        session.raise_sync_flags()?;
        session.commit()?;

        info!(
            name_id = %name_id,
            card_id = %card.card_id,
            combo_id = %card.combo_id,
            acls = ?acl_ids,
            "card activated, waiting for comm server"
        );
        Ok(ActivationOutcome {
            name_id,
            card_id: card.card_id,
            combo_id: card.combo_id,
            acl_ids,
            dropped_acls,
            created_card: card.created,
        })
    }

    fn reconcile_deactivation(&self, card: &CardCode) -> Result<DeactivationOutcome, EngineError> {
        let mut session = self.store.session()?;
        let Some(row) = find_card(&mut *session, card)? else {
            debug!(code = %card, "card was never activated");
            return Ok(DeactivationOutcome::NeverActivated);
        };
        session.deactivate_card(row.id, self.clock.today())?;
        if session.mark_card_slots_dirty(row.id)? == 0 {
            warn!(card_id = %row.id, "deactivated card has no slot row");
        }
        session.raise_sync_flags()?;
        session.commit()?;
        info!(card_id = %row.id, code = %card, "card deactivated, waiting for comm server");
        Ok(DeactivationOutcome::Deactivated { card_id: row.id })
    }
}

#[async_trait]
impl CardAccess for AclEngine {
    async fn activate(
        &self,
        enrollment: &Enrollment,
        permission_name: &str,
    ) -> Result<ActivationOutcome, BridgeError> {
        Ok(self.activate_card(enrollment, permission_name).await?)
    }

    async fn deactivate(&self, card: &CardCode) -> Result<DeactivationOutcome, BridgeError> {
        Ok(self.deactivate_card(card).await?)
    }
}
