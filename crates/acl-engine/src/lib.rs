//! ACL reconciliation engine.
//!
//! Maps "this card should hold this permission" onto the legacy schema's four levels of
//! indirection (combo, device group, acl entry, card slot), reusing equivalent rows, and
//! waits for the comm server to download the result.

pub mod api;
mod barrier;
mod card;
mod combo;
pub mod config;
pub mod engine;
pub mod errors;
mod identity;
mod projection;
#[cfg(test)]
mod testing;

pub use api::{ActivationOutcome, CardAccess, DeactivationOutcome};
pub use config::{BarrierConfig, EngineConfig};
pub use engine::AclEngine;
pub use errors::EngineError;
