use std::time::Duration;

use serde::{Deserialize, Serialize};

use cardbridge_core_types::{duration, LocationId};

pub const DEFAULT_LOCATION_GROUP: i64 = 3;
pub const DEFAULT_CORRELATION_FIELD: &str = "ID";
pub const DEFAULT_PERMISSION: &str = "Default";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Location group stamped on every row the engine creates.
    pub location_group: LocationId,
    /// Custom attribute holding the correlation key.
    pub correlation_field: String,
    /// Permission bucket granted by enable requests.
    pub default_permission: String,
    pub barrier: BarrierConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            location_group: LocationId(DEFAULT_LOCATION_GROUP),
            correlation_field: DEFAULT_CORRELATION_FIELD.to_string(),
            default_permission: DEFAULT_PERMISSION.to_string(),
            barrier: BarrierConfig::default(),
        }
    }
}

/// How long to wait for the comm server to pick up a change.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BarrierConfig {
    pub attempts: u32,
    #[serde(with = "duration")]
    pub interval: Duration,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            attempts: 30,
            interval: Duration::from_secs(10),
        }
    }
}
