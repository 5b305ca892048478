use std::io;

use brain_intake_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("unsupported store location: {0}")]
    InvalidLocation(String),
    #[error("connection poisoned")]
    ConnectionPoisoned,
}

impl From<StorageError> for StoreError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::InvalidRecord(reason) => StoreError::InvalidRecord(reason),
            StorageError::NotFound(what) => StoreError::NotFound(what),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

