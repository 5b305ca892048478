use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use brain_intake_core::{
    AuthenticatedUser, IngestTask, IntakeError, IntakeOutcome, ProcessCrawlJob, ProcessFileJob,
    UploadRequest, API_KEY_HEADER,
};
use brain_intake_store::NotificationRecord;
use bytes::Bytes;
use tracing::{error, info, warn};

use super::types::{
    CrawlRequest, EnqueuedJobResponse, ErrorResponse, JobStatusResponse, UploadQuery,
};
use super::ApiState;
use crate::auth::BearerUser;

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;
type Accepted<T> = Result<(StatusCode, Json<T>), ApiError>;

const FILE_FIELD: &str = "file";

/// Synchronous intake: quota check, then the filter collaborator.
pub async fn upload(
    State(state): State<Arc<ApiState>>,
    BearerUser(user): BearerUser,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<IntakeOutcome> {
    let (file_name, content) = read_file_field(multipart, state.config.max_upload_bytes).await?;

    let upload = UploadRequest::new(file_name, content)
        .with_summarization(query.enable_summarization)
        .with_brain_id(query.brain_id)
        .with_api_key(api_key(&headers));

    let outcome = state
        .intake
        .ingest(&user, &upload)
        .await
        .map_err(intake_error)?;

    info!(
        user = %user,
        file_name = %upload.file_name,
        outcome = outcome.kind(),
        "upload handled"
    );
    Ok(Json(outcome))
}

/// Queues a `process_file_and_notify` job for the uploaded file.
pub async fn upload_async(
    State(state): State<Arc<ApiState>>,
    BearerUser(user): BearerUser,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Accepted<EnqueuedJobResponse> {
    let (file_name, content) = read_file_field(multipart, state.config.max_upload_bytes).await?;

    let notification = state.notifications.create().map_err(internal_error)?;
    let task = IngestTask::ProcessFile(ProcessFileJob {
        file: STANDARD.encode(&content),
        file_name,
        enable_summarization: query.enable_summarization,
        brain_id: query.brain_id,
        openai_api_key: api_key(&headers),
        notification_id: Some(notification.notification_id.clone()),
        user_email: user.email().to_string(),
    });

    enqueue(&state, &user, task, notification)
}

pub async fn crawl(
    State(state): State<Arc<ApiState>>,
    BearerUser(user): BearerUser,
    headers: HeaderMap,
    Json(request): Json<CrawlRequest>,
) -> Accepted<EnqueuedJobResponse> {
    let url = request.url.trim();
    if url.is_empty() {
        return Err(bad_request("invalid_url", "url cannot be empty"));
    }
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        _ => return Err(bad_request("invalid_url", "url must be an absolute http(s) URL")),
    }

    let notification = state.notifications.create().map_err(internal_error)?;
    let task = IngestTask::ProcessCrawl(ProcessCrawlJob {
        crawl_website_url: url.to_string(),
        enable_summarization: request.enable_summarization,
        brain_id: request.brain_id,
        openai_api_key: api_key(&headers),
        notification_id: Some(notification.notification_id.clone()),
        user_email: user.email().to_string(),
    });

    enqueue(&state, &user, task, notification)
}

pub async fn job_status(
    State(state): State<Arc<ApiState>>,
    BearerUser(_user): BearerUser,
    Path(job_id): Path<String>,
) -> ApiResult<JobStatusResponse> {
    let record = state
        .broker
        .job_status(&job_id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("job_not_found", "job not found"))?;
    let result = state.results.get_result(&job_id).map_err(internal_error)?;

    Ok(Json(JobStatusResponse {
        job_id: record.job_id,
        task_name: record.task_name,
        status: record.status.as_str().to_string(),
        success: result.as_ref().map(|r| r.success),
        error: result.and_then(|r| r.error),
        created_at: record.created_at,
        finished_at: record.finished_at,
    }))
}

pub async fn get_notification(
    State(state): State<Arc<ApiState>>,
    BearerUser(_user): BearerUser,
    Path(notification_id): Path<String>,
) -> ApiResult<NotificationRecord> {
    match state.notifications.get(&notification_id) {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(not_found("notification_not_found", "notification not found")),
        Err(err) => Err(internal_error(err)),
    }
}

pub async fn health_check() -> ApiResult<serde_json::Value> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": "upload-api"
    })))
}

fn enqueue(
    state: &ApiState,
    user: &AuthenticatedUser,
    task: IngestTask,
    notification: NotificationRecord,
) -> Accepted<EnqueuedJobResponse> {
    let job_id = match state.broker.enqueue(&task) {
        Ok(job_id) => job_id,
        Err(err) => {
            // No job will ever complete this notification.
            if let Err(cleanup) = state.notifications.delete(&notification.notification_id) {
                warn!(
                    notification_id = %notification.notification_id,
                    error = %cleanup,
                    "failed to delete orphaned notification"
                );
            }
            return Err(internal_error(err));
        }
    };

    info!(
        user = %user,
        job_id = %job_id,
        task = task.name(),
        notification_id = %notification.notification_id,
        "job enqueued"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueuedJobResponse {
            job_id,
            notification_id: notification.notification_id,
        }),
    ))
}

async fn read_file_field(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<(String, Bytes), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| bad_request("invalid_multipart", &err.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| bad_request("missing_file_name", "file part has no file name"))?;
        let content = field
            .bytes()
            .await
            .map_err(|err| bad_request("invalid_multipart", &err.to_string()))?;
        if content.len() > max_bytes {
            return Err(payload_too_large(max_bytes));
        }

        return Ok((file_name, content));
    }

    Err(bad_request("missing_file", "multipart field `file` is required"))
}

fn api_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn intake_error(err: IntakeError) -> ApiError {
    match err {
        IntakeError::InvalidUpload(message) | IntakeError::InvalidIdentity(message) => {
            bad_request("invalid_upload", &message)
        }
        other @ (IntakeError::Filter(_) | IntakeError::Repository(_)) => bad_gateway(other),
        other => internal_error(other),
    }
}

fn bad_request(code: &str, message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
            code: code.to_string(),
            details: None,
        }),
    )
}

fn not_found(code: &str, message: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: message.to_string(),
            code: code.to_string(),
            details: None,
        }),
    )
}

fn payload_too_large(max_bytes: usize) -> ApiError {
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        Json(ErrorResponse {
            error: format!("file exceeds the {max_bytes} byte upload limit"),
            code: "file_too_large".to_string(),
            details: None,
        }),
    )
}

fn bad_gateway<E: std::fmt::Display>(err: E) -> ApiError {
    error!(error = %err, "upstream collaborator failed");
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse {
            error: "upstream collaborator failed".to_string(),
            code: "upstream_error".to_string(),
            details: Some(serde_json::json!({ "message": err.to_string() })),
        }),
    )
}

fn internal_error<E: std::fmt::Display>(err: E) -> ApiError {
    error!(error = %err, "upload API internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal server error".to_string(),
            code: "internal_error".to_string(),
            details: Some(serde_json::json!({ "message": err.to_string() })),
        }),
    )
}
