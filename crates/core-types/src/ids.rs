use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! legacy_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

legacy_id!(
    /// Row id of a card holder (`NAMES.ID`).
    NameId
);
legacy_id!(CompanyId);
legacy_id!(CardId);
legacy_id!(
    /// Shared id of a permission combination; several membership rows carry the same value.
    ComboId
);
legacy_id!(PermissionNameId);
legacy_id!(DeviceGroupId);
legacy_id!(AclId);
legacy_id!(
    /// Custom attribute number (`UdfName.UdfNum`).
    UdfNum
);
legacy_id!(LocationId);

/// Time-zone number from the legacy schema; zero marks an unused slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeZoneId(pub i64);

impl TimeZoneId {
    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TimeZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque token the update source attaches to each request.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
