//! Brain Intake core.
//!
//! Domain types shared by the upload API and the ingest worker: the quota
//! calculation over a user's stored documents, the intake gate that admits or
//! rejects a candidate file, the intake service that ties both to the external
//! filter collaborator, and the job payloads exchanged through the broker.

pub mod clients;
pub mod error;
pub mod gate;
pub mod jobs;
pub mod model;
pub mod quota;
pub mod traits;
pub mod units;

pub use clients::{HttpFileFilter, HttpRepositoryProcessor};
pub use error::{IntakeError, StoreError};
pub use gate::{GateDecision, IntakeGate, IntakeService, Reservation, ReservationId};
pub use jobs::{
    IngestTask, NotificationMessage, NotificationStatus, NotificationUpdate, ProcessCrawlJob,
    ProcessFileJob, PROCESS_CRAWL_TASK, PROCESS_FILE_TASK,
};
pub use model::{AuthenticatedUser, IntakeOutcome, StoredDocumentRecord, UploadRequest};
pub use quota::{brain_usage, QuotaCalculator};
pub use traits::{DocumentStore, FileFilter, NotificationSink, RepositoryProcessor};
pub use units::convert_bytes;

/// Default per-user brain capacity in bytes (50 MiB).
pub const DEFAULT_MAX_BRAIN_SIZE: f64 = 52_428_800.0;

/// Header carrying the caller's model provider key to the filter collaborator.
pub const API_KEY_HEADER: &str = "Openai-Api-Key";
