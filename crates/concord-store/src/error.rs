//! Error types for storage operations

use concord_domain::ErrorKind;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Directory traversal error
    #[error("Scan error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A record could not be parsed
    #[error("Failed to parse {path}: {message}")]
    Parse {
        /// File that failed to parse
        path: String,
        /// Parser message
        message: String,
    },

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record already exists and is immutable
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Coarse category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Io(_) | StoreError::Walk(_) | StoreError::NotFound(_) => ErrorKind::Io,
            StoreError::Yaml(_) | StoreError::Json(_) | StoreError::Parse { .. } => ErrorKind::Parse,
            StoreError::AlreadyExists(_) | StoreError::InvalidData(_) => ErrorKind::SchemaMismatch,
        }
    }
}

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StoreError>;
