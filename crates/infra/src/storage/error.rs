//! Storage error types

use std::path::PathBuf;

use authlane_domain::AuthError;
use thiserror::Error;

use crate::errors::InfraError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file exists but is not a JSON object
    #[error("storage file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to serialize storage: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<StorageError> for InfraError {
    fn from(err: StorageError) -> Self {
        Self(AuthError::Storage(err.to_string()))
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
