//! SQLite persistence for Brain Intake: the per-user document record store,
//! job notifications, the job broker and the task result backend.

pub mod broker;
pub mod documents;
pub mod error;
pub mod location;
pub mod notifications;
pub mod results;
pub mod schema;

pub use broker::{ClaimedJob, JobBroker, JobRecord, JobStatus};
pub use documents::DocumentDatabase;
pub use error::StorageError;
pub use location::sqlite_path;
pub use notifications::{NotificationRecord, NotificationStore};
pub use results::{ResultBackend, TaskResult};

pub const DOCUMENTS_DB_FILENAME: &str = "documents.db";
pub const NOTIFICATIONS_DB_FILENAME: &str = "notifications.db";
