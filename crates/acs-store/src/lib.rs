//! Serialized, transactional access to the legacy access-control schema.
//!
//! A session owns the connection guard plus an open transaction for the whole
//! read-modify-write sequence of one activation or deactivation.

pub mod api;
pub mod errors;
pub mod model;
pub mod schema;
pub mod sqlite;

pub use api::{AcsSession, AcsStore, StoreResult};
pub use errors::StoreError;
pub use model::{
    CardHolder, CardRow, CardSlots, DeviceGrant, DeviceGroupRow, NewCard, NewName, RowCounts,
};
pub use schema::{
    AttributeSeed, CompanySeed, DeviceSeed, GrantSeed, LocationSeed, PermissionSeed,
    ReferenceData,
};
pub use sqlite::{SqliteAcsStore, SqliteSession};
