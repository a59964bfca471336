use thiserror::Error;

use cardbridge_acs_store::StoreError;
use cardbridge_core_types::{BridgeError, ErrorKind, PermissionNameId};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("unknown company '{0}'")]
    UnknownCompany(String),
    #[error("unknown permission '{0}'")]
    UnknownPermission(String),
    #[error("correlation attribute '{0}' is not defined")]
    UnknownCorrelationField(String),
    #[error("permission {permission} grants device {device}, outside the device range")]
    DeviceOutOfRange {
        permission: PermissionNameId,
        device: i64,
    },
    #[error("{count} identities match {subject}")]
    AmbiguousIdentity { subject: String, count: usize },
    #[error("{count} cards carry code {code}")]
    AmbiguousCard { code: String, count: usize },
    #[error("comm server still downloading after {attempts} checks")]
    BarrierTimeout { attempts: u32 },
    #[error("reconciliation task failed: {0}")]
    Task(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Store(StoreError::InvalidSeed(_)) => ErrorKind::ReferenceData,
            EngineError::Store(_) => ErrorKind::Store,
            EngineError::UnknownCompany(_)
            | EngineError::UnknownPermission(_)
            | EngineError::UnknownCorrelationField(_)
            | EngineError::DeviceOutOfRange { .. } => ErrorKind::ReferenceData,
            EngineError::AmbiguousIdentity { .. } | EngineError::AmbiguousCard { .. } => {
                ErrorKind::Ambiguity
            }
            EngineError::BarrierTimeout { .. } => ErrorKind::BarrierTimeout,
            EngineError::Task(_) => ErrorKind::Internal,
        }
    }
}

impl From<EngineError> for BridgeError {
    fn from(value: EngineError) -> Self {
        BridgeError::new(value.kind(), value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            EngineError::UnknownCompany("Globex".into()).kind(),
            ErrorKind::ReferenceData
        );
        assert_eq!(
            EngineError::AmbiguousIdentity {
                subject: "Ann Lee".into(),
                count: 2
            }
            .kind(),
            ErrorKind::Ambiguity
        );
        let bridged: BridgeError = EngineError::BarrierTimeout { attempts: 30 }.into();
        assert_eq!(bridged.kind(), ErrorKind::BarrierTimeout);
    }
}
