//! Error types for Spyglass core.

use std::{error::Error, fmt, io};

/// Error type for Spyglass core operations.
#[derive(Debug)]
pub enum AuditError {
    /// An underlying I/O error.
    Io(io::Error),
    /// A fetch against an upstream API failed.
    Upstream(String),
    /// A write or read against the storage backend failed.
    Storage(String),
    /// A document an earlier phase should have written is absent or empty.
    MissingDocument(String),
    /// A catch-all error with a message.
    Other(String),
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Upstream(message) => write!(f, "upstream error: {message}"),
            Self::Storage(message) => write!(f, "storage error: {message}"),
            Self::MissingDocument(path) => write!(f, "missing document: {path}"),
            Self::Other(message) => write!(f, "{message}"),
        }
    }
}

impl Error for AuditError {}

impl From<io::Error> for AuditError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Convenience result type for Spyglass core.
pub type Result<T> = std::result::Result<T, AuditError>;
