use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::IntakeError;

/// Identity of the caller, taken from a validated bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    email: String,
}

impl AuthenticatedUser {
    pub fn new(email: impl Into<String>) -> Result<Self, IntakeError> {
        let email = email.into();
        let trimmed = email.trim();
        if trimmed.is_empty() {
            return Err(IntakeError::InvalidIdentity(
                "user email cannot be empty".into(),
            ));
        }
        Ok(Self {
            email: trimmed.to_string(),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl fmt::Display for AuthenticatedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.email)
    }
}

/// A document that finished ingestion, as seen by the quota calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocumentRecord {
    pub name: String,
    /// Size in bytes.
    pub size: f64,
}

impl StoredDocumentRecord {
    pub fn new(name: impl Into<String>, size: f64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// A file on its way into a brain. Lives for one request or one job.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub content: Bytes,
    pub enable_summarization: bool,
    pub brain_id: Option<String>,
    pub api_key: Option<String>,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
            enable_summarization: false,
            brain_id: None,
            api_key: None,
        }
    }

    pub fn with_summarization(mut self, enabled: bool) -> Self {
        self.enable_summarization = enabled;
        self
    }

    pub fn with_brain_id(mut self, brain_id: Option<String>) -> Self {
        self.brain_id = brain_id;
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Measured size of the content in bytes.
    pub fn size(&self) -> f64 {
        self.content.len() as f64
    }
}

/// Status/message pair produced by the intake gate or the filter collaborator.
///
/// Serializes as `{"type": "...", "message": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IntakeOutcome {
    Success { message: String },
    Warning { message: String },
    Error { message: String },
}

impl IntakeOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        IntakeOutcome::Success {
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        IntakeOutcome::Warning {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        IntakeOutcome::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IntakeOutcome::Success { .. } => "success",
            IntakeOutcome::Warning { .. } => "warning",
            IntakeOutcome::Error { .. } => "error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            IntakeOutcome::Success { message }
            | IntakeOutcome::Warning { message }
            | IntakeOutcome::Error { message } => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, IntakeOutcome::Success { .. })
    }
}
