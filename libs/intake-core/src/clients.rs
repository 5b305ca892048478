use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use tracing::debug;

use crate::error::IntakeError;
use crate::model::{AuthenticatedUser, IntakeOutcome, UploadRequest};
use crate::traits::{FileFilter, RepositoryProcessor};
use crate::API_KEY_HEADER;

const USER_AGENT: &str = concat!("brain-intake/", env!("CARGO_PKG_VERSION"));

fn build_client(timeout: Duration) -> Result<Client, IntakeError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|err| IntakeError::Filter(format!("failed to build HTTP client: {err}")))
}

fn with_api_key(request: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
    match api_key {
        Some(key) if !key.is_empty() => request.header(API_KEY_HEADER, key),
        _ => request,
    }
}

/// Reads an [`IntakeOutcome`] from a 2xx response, or the status and body
/// otherwise.
async fn read_outcome(response: Response, url: &str) -> Result<IntakeOutcome, String> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<IntakeOutcome>()
            .await
            .map_err(|err| format!("invalid response from {url}: {err}"));
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read error body".to_string());
    Err(format!("{url} responded with {status}: {body}"))
}

/// Filter collaborator reached over HTTP at `{base_url}/filter`.
pub struct HttpFileFilter {
    http_client: Client,
    base_url: String,
}

impl HttpFileFilter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, IntakeError> {
        Ok(Self {
            http_client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl FileFilter for HttpFileFilter {
    async fn filter_file(
        &self,
        user: &AuthenticatedUser,
        upload: &UploadRequest,
    ) -> Result<IntakeOutcome, IntakeError> {
        let url = format!("{}/filter", self.base_url);

        let part = Part::bytes(upload.content.to_vec()).file_name(upload.file_name.clone());
        let mut form = Form::new()
            .part("file", part)
            .text("file_name", upload.file_name.clone())
            .text("enable_summarization", upload.enable_summarization.to_string())
            .text("user_email", user.email().to_string());
        if let Some(brain_id) = &upload.brain_id {
            form = form.text("brain_id", brain_id.clone());
        }

        let request = with_api_key(
            self.http_client.post(&url).multipart(form),
            upload.api_key.as_deref(),
        );

        let response = request
            .send()
            .await
            .map_err(|err| IntakeError::Filter(format!("request to {url} failed: {err}")))?;
        let outcome = read_outcome(response, &url)
            .await
            .map_err(IntakeError::Filter)?;

        debug!(
            user = %user,
            file_name = %upload.file_name,
            outcome = outcome.kind(),
            "filter collaborator returned"
        );
        Ok(outcome)
    }
}

#[derive(Debug, Serialize)]
struct RepositoryRequest<'a> {
    repo: &'a str,
    enable_summarization: bool,
    brain_id: Option<&'a str>,
    user_email: &'a str,
}

/// Repository collaborator reached over HTTP at `{base_url}/repositories`.
///
/// Summarization is always disabled for repositories.
pub struct HttpRepositoryProcessor {
    http_client: Client,
    base_url: String,
}

impl HttpRepositoryProcessor {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, IntakeError> {
        Ok(Self {
            http_client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RepositoryProcessor for HttpRepositoryProcessor {
    async fn process_repository(
        &self,
        user: &AuthenticatedUser,
        repo_url: &str,
        brain_id: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<IntakeOutcome, IntakeError> {
        let url = format!("{}/repositories", self.base_url);
        let payload = RepositoryRequest {
            repo: repo_url,
            enable_summarization: false,
            brain_id,
            user_email: user.email(),
        };

        let request = with_api_key(self.http_client.post(&url).json(&payload), api_key);
        let response = request
            .send()
            .await
            .map_err(|err| IntakeError::Repository(format!("request to {url} failed: {err}")))?;

        read_outcome(response, &url)
            .await
            .map_err(IntakeError::Repository)
    }
}
