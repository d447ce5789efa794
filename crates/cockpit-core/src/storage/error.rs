//! Storage error types

use std::path::PathBuf;

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The database file could not be opened or reopened
    #[error("Connection failure at {path}: {message}")]
    ConnectionFailure { path: PathBuf, message: String },
    /// No live connection is available
    #[error("No database connection available")]
    Unavailable,
    /// The entity tag for a kind is not discoverable
    #[error("Could not resolve entity type for {0}")]
    SchemaResolutionFailure(String),
    /// Malformed SQL or a transient lock while preparing
    #[error("Failed to prepare statement: {0}")]
    StatementPrepareFailure(#[source] rusqlite::Error),
    /// Constraint violation or busy timeout while writing
    #[error("Write failed: {0}")]
    WriteFailure(#[source] rusqlite::Error),
    /// Stored data could not be decoded
    #[error("Decode failure in {field}: {message}")]
    DecodeFailure { field: String, message: String },
    /// Caller-supplied fields were unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn connection(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        StorageError::ConnectionFailure {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;
