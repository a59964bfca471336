use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Failure classes shared by every layer; the dispatcher logs them alongside `not_done`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing permission name, company, attribute or device mapping.
    ReferenceData,
    /// More than one record matched where exactly one was expected.
    Ambiguity,
    /// The comm server did not clear the download flag in time.
    BarrierTimeout,
    /// Source or sink unreachable; the next cycle retries naturally.
    Transient,
    /// Malformed request payload.
    Invalid,
    /// Legacy database failure.
    Store,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ReferenceData => "reference_data",
            ErrorKind::Ambiguity => "ambiguity",
            ErrorKind::BarrierTimeout => "barrier_timeout",
            ErrorKind::Transient => "transient",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Store => "store",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared error type for the cardbridge crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct BridgeError {
    kind: ErrorKind,
    message: String,
}

impl BridgeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, message)
    }

    pub fn reference_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReferenceData, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
