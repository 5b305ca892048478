use async_trait::async_trait;

use crate::error::{IntakeError, StoreError};
use crate::gate::{IntakeGate, Reservation, ReservationId};
use crate::jobs::NotificationUpdate;
use crate::model::{AuthenticatedUser, IntakeOutcome, StoredDocumentRecord, UploadRequest};

/// Persisted record of ingested documents, queried per user.
pub trait DocumentStore: Send + Sync {
    /// Every `(name, size)` record owned by `user_email`, duplicates included.
    fn list_user_documents(&self, user_email: &str)
        -> Result<Vec<StoredDocumentRecord>, StoreError>;

    fn record_document(
        &self,
        user_email: &str,
        brain_id: Option<&str>,
        record: &StoredDocumentRecord,
    ) -> Result<(), StoreError>;

    /// Evaluates `gate` against the user's usage and, when admitted, holds
    /// `record` as a pending row in the same transaction. Pending rows count
    /// toward usage until confirmed or released.
    fn reserve_document(
        &self,
        user_email: &str,
        brain_id: Option<&str>,
        record: &StoredDocumentRecord,
        gate: &IntakeGate,
    ) -> Result<Reservation, StoreError>;

    /// Turns a pending row into a stored document.
    fn confirm_reservation(&self, id: ReservationId) -> Result<(), StoreError>;

    /// Drops a pending row.
    fn release_reservation(&self, id: ReservationId) -> Result<(), StoreError>;
}

/// External routine that classifies, parses and optionally summarizes a file.
#[async_trait]
pub trait FileFilter: Send + Sync {
    async fn filter_file(
        &self,
        user: &AuthenticatedUser,
        upload: &UploadRequest,
    ) -> Result<IntakeOutcome, IntakeError>;
}

/// External routine that ingests a source-code repository by URL.
#[async_trait]
pub trait RepositoryProcessor: Send + Sync {
    async fn process_repository(
        &self,
        user: &AuthenticatedUser,
        repo_url: &str,
        brain_id: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<IntakeOutcome, IntakeError>;
}

/// Records the terminal state of an asynchronous job.
pub trait NotificationSink: Send + Sync {
    fn update_notification(
        &self,
        notification_id: &str,
        update: &NotificationUpdate,
    ) -> Result<(), IntakeError>;
}
