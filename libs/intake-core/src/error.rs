use thiserror::Error;

/// Failures reported by a [`crate::DocumentStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("invalid document record: {0}")]
    InvalidRecord(String),
    #[error("{0} not found")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("invalid user identity: {0}")]
    InvalidIdentity(String),
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
    #[error("record store error: {0}")]
    RecordStore(#[from] StoreError),
    #[error("filter collaborator error: {0}")]
    Filter(String),
    #[error("repository collaborator error: {0}")]
    Repository(String),
    #[error("notification error: {0}")]
    Notification(String),
}

