//! Error types for the CLI application.

use concord_domain::ErrorKind;
use concord_engine::EngineError;
use concord_store::StoreError;
use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not permitted
    #[error("Operation not permitted: {0}")]
    NotPermitted(String),
}

impl CliError {
    /// Error category
    pub fn kind(&self) -> ErrorKind {
        match self {
            CliError::Engine(e) => e.kind(),
            CliError::Store(e) => e.kind(),
            CliError::Io(_) => ErrorKind::Io,
            CliError::Config(_)
            | CliError::Serialization(_)
            | CliError::Toml(_)
            | CliError::InvalidInput(_)
            | CliError::NotPermitted(_) => ErrorKind::Parse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_engine_error() {
        let err: CliError = EngineError::EntryNotFound("mov-instruction".into()).into();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert!(err.to_string().contains("mov-instruction"));
    }

    #[test]
    fn test_io_kind() {
        let err: CliError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
