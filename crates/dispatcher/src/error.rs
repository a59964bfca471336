use thiserror::Error;

use cardbridge_core_types::{BridgeError, ErrorKind};

#[derive(Clone, Debug, Error)]
pub enum DispatchError {
    #[error("update source unavailable: {0}")]
    Source(String),
    #[error("status sink unavailable: {0}")]
    Sink(String),
}

impl From<DispatchError> for BridgeError {
    fn from(value: DispatchError) -> Self {
        BridgeError::new(ErrorKind::Transient, value.to_string())
    }
}
