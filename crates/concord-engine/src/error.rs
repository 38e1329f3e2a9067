//! Error types for engine operations

use concord_domain::ErrorKind;
use concord_store::StoreError;
use thiserror::Error;

/// Errors that can occur during engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Storage layer error
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Filesystem error outside the store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input record (extraction batch, conflict log) is malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Referenced entry does not exist
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Conflict could not be applied automatically
    #[error("Escalated: {0}")]
    Escalated(String),
}

impl EngineError {
    /// Coarse category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Store(e) => e.kind(),
            EngineError::Config(_) | EngineError::Toml(_) | EngineError::InvalidInput(_) => {
                ErrorKind::Parse
            }
            EngineError::Io(_) => ErrorKind::Io,
            EngineError::EntryNotFound(_) => ErrorKind::SchemaMismatch,
            EngineError::Escalated(_) => ErrorKind::Escalated,
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
