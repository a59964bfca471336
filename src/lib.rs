//! cardbridge library
//!
//! Configuration and the directory-backed request surfaces used by the binary and the
//! end-to-end tests.

pub mod config;
pub mod ingest;

pub use config::{BridgeConfig, ConfigError, LoadedConfig};
pub use ingest::{IngestDirSource, OutboxStatusSink, StatusReport};
