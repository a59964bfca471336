use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BridgeError;

/// Card number as printed on the card plus the normalized code the legacy schema matches on.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct CardCode {
    code: String,
    raw: String,
}

impl CardCode {
    /// Leading zeros are stripped; an all-zero number normalizes to `"0"`.
    pub fn parse(raw: &str) -> Result<Self, BridgeError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(BridgeError::invalid("card code is empty"));
        }
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BridgeError::invalid(format!(
                "card code '{raw}' must contain only digits"
            )));
        }
        let stripped = raw.trim_start_matches('0');
        let code = if stripped.is_empty() { "0" } else { stripped };
        Ok(Self {
            code: code.to_string(),
            raw: raw.to_string(),
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for CardCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// Stable key linking an external user id to a card holder record.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    /// UUIDv5 in the OID namespace over the external user id.
    pub fn derive(external_user_id: &str) -> Self {
        let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, external_user_id.as_bytes());
        Self(uuid.to_string())
    }

    /// Wraps a value read back from the attribute table.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
