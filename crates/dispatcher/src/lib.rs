//! Deduplicating dispatcher between an update source, the ACL engine and a status sink.

pub mod api;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod metrics;

pub use api::{StatusSink, UpdateSource};
pub use config::DispatcherConfig;
pub use dispatcher::{CycleReport, RequestDispatcher};
pub use error::DispatchError;
pub use ledger::{RequestLedger, RequestState};
