use serde::{Deserialize, Serialize};

use crate::model::IntakeOutcome;

pub const PROCESS_FILE_TASK: &str = "process_file_and_notify";
pub const PROCESS_CRAWL_TASK: &str = "process_crawl_and_notify";

/// Arguments of the `process_file_and_notify` task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessFileJob {
    /// Base64 (standard alphabet) encoded file content.
    pub file: String,
    pub file_name: String,
    pub enable_summarization: bool,
    pub brain_id: Option<String>,
    pub openai_api_key: Option<String>,
    pub notification_id: Option<String>,
    pub user_email: String,
}

/// Arguments of the `process_crawl_and_notify` task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessCrawlJob {
    pub crawl_website_url: String,
    pub enable_summarization: bool,
    pub brain_id: Option<String>,
    pub openai_api_key: Option<String>,
    pub notification_id: Option<String>,
    pub user_email: String,
}

/// A named unit of work carried through the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", content = "args")]
pub enum IngestTask {
    #[serde(rename = "process_file_and_notify")]
    ProcessFile(ProcessFileJob),
    #[serde(rename = "process_crawl_and_notify")]
    ProcessCrawl(ProcessCrawlJob),
}

impl IngestTask {
    pub fn name(&self) -> &'static str {
        match self {
            IngestTask::ProcessFile(_) => PROCESS_FILE_TASK,
            IngestTask::ProcessCrawl(_) => PROCESS_CRAWL_TASK,
        }
    }

    pub fn notification_id(&self) -> Option<&str> {
        match self {
            IngestTask::ProcessFile(job) => job.notification_id.as_deref(),
            IngestTask::ProcessCrawl(job) => job.notification_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationStatus {
    Pending,
    Done,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "Pending",
            NotificationStatus::Done => "Done",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(NotificationStatus::Pending),
            "Done" => Some(NotificationStatus::Done),
            _ => None,
        }
    }
}

/// Summary written into a notification once a job completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub status: String,
    pub message: String,
    pub name: String,
}

impl NotificationMessage {
    pub fn from_outcome(outcome: &IntakeOutcome, name: impl Into<String>) -> Self {
        Self {
            status: outcome.kind().to_string(),
            message: outcome.message().to_string(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationUpdate {
    pub status: NotificationStatus,
    pub message: Option<String>,
}

impl NotificationUpdate {
    /// Terminal `Done` update carrying the JSON form of `message`.
    pub fn done(message: &NotificationMessage) -> Result<Self, serde_json::Error> {
        Ok(Self {
            status: NotificationStatus::Done,
            message: Some(serde_json::to_string(message)?),
        })
    }
}
