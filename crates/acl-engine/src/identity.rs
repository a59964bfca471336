use tracing::{debug, info};

use cardbridge_acs_store::{AcsSession, NewName};
use cardbridge_core_types::{CorrelationKey, Enrollment, NameId, UdfNum};

use crate::config::EngineConfig;
use crate::errors::EngineError;

/// Finds the card holder behind an enrollment, creating one when nobody matches.
///
/// Lookup order: correlation key, then exact first/last/company match (which backfills the
/// key so the next lookup hits the first tier), then insert.
pub(crate) fn resolve_identity(
    session: &mut dyn AcsSession,
    config: &EngineConfig,
    enrollment: &Enrollment,
) -> Result<NameId, EngineError> {
    let udf = session
        .udf_num(&config.correlation_field)?
        .ok_or_else(|| EngineError::UnknownCorrelationField(config.correlation_field.clone()))?;
    let key = CorrelationKey::derive(&enrollment.external_user_id);

    match session.names_by_correlation_key(udf, &key)?.as_slice() {
        [] => {}
        [name] => {
            debug!(name_id = %name, "identity matched by correlation key");
            return Ok(*name);
        }
        many => {
            return Err(EngineError::AmbiguousIdentity {
                subject: format!("correlation key {}", key.as_str()),
                count: many.len(),
            })
        }
    }

    let company = session
        .company_id(&enrollment.company)?
        .ok_or_else(|| EngineError::UnknownCompany(enrollment.company.clone()))?;

    let matches =
        session.names_by_fields(&enrollment.first_name, &enrollment.last_name, company)?;
    match matches.as_slice() {
        [] => {
            let name = session.insert_name(&NewName {
                location_group: config.location_group,
                first_name: &enrollment.first_name,
                last_name: &enrollment.last_name,
                company,
            })?;
            session.insert_udf_text(config.location_group, name, udf, key.as_str())?;
            info!(name_id = %name, company = %enrollment.company, "created identity");
            Ok(name)
        }
        [name] => {
            attach_key(session, config, *name, udf, &key)?;
            info!(name_id = %name, "identity matched by name, correlation key attached");
            Ok(*name)
        }
        many => Err(EngineError::AmbiguousIdentity {
            subject: format!(
                "{} {} at {}",
                enrollment.first_name, enrollment.last_name, enrollment.company
            ),
            count: many.len(),
        }),
    }
}

fn attach_key(
    session: &mut dyn AcsSession,
    config: &EngineConfig,
    name: NameId,
    udf: UdfNum,
    key: &CorrelationKey,
) -> Result<(), EngineError> {
    match session.udf_text(name, udf)? {
        Some(existing) if existing == key.as_str() => {}
        Some(_) => session.update_udf_text(name, udf, key.as_str())?,
        None => session.insert_udf_text(config.location_group, name, udf, key.as_str())?,
    }
    Ok(())
}
