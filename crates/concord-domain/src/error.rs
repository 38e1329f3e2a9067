//! Error classification shared by all layers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse error category
///
/// Crate-specific error enums map onto these so callers can decide whether
/// to continue with the next item or abort the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input record; skip the record
    Parse,

    /// Filesystem failure; fatal only for the repository root
    Io,

    /// Record shape does not match the entry model; skip the record
    SchemaMismatch,

    /// A conflict needs a human; not an error for the run
    Escalated,
}

impl ErrorKind {
    /// Get the kind as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse",
            ErrorKind::Io => "io",
            ErrorKind::SchemaMismatch => "schema_mismatch",
            ErrorKind::Escalated => "escalated",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-item failure collected into a report instead of aborting a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Entry path, conflict id or other item key
    pub target: String,

    /// Error category
    pub kind: ErrorKind,

    /// Error message
    pub message: String,
}

impl ItemFailure {
    /// Create a new failure record
    pub fn new(target: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            kind,
            message: message.into(),
        }
    }
}
