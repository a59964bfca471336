use thiserror::Error;

use cardbridge_core_types::{BridgeError, ErrorKind};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid reference data: {0}")]
    InvalidSeed(String),
    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

impl From<StoreError> for BridgeError {
    fn from(value: StoreError) -> Self {
        let kind = match value {
            StoreError::InvalidSeed(_) => ErrorKind::ReferenceData,
            _ => ErrorKind::Store,
        };
        BridgeError::new(kind, value.to_string())
    }
}
