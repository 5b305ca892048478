use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::ApiState;

/// Headroom over the filter timeout so a slow filter surfaces as a 502 rather
/// than a request timeout.
const TIMEOUT_MARGIN: Duration = Duration::from_secs(30);

/// Room for multipart boundaries and part headers on top of the largest file.
/// The file itself is checked against `max_upload_bytes` in the handlers.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<ApiState>) -> Router {
    let request_timeout = state.config.filter_timeout() + TIMEOUT_MARGIN;
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .route("/upload", post(handlers::upload))
        .route("/upload/async", post(handlers::upload_async))
        .route("/crawl", post(handlers::crawl))
        .route("/jobs/:job_id", get(handlers::job_status))
        .route("/notifications/:notification_id", get(handlers::get_notification))
        .route("/health", get(handlers::health_check))
        .layer(DefaultBodyLimit::max(
            state.config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
        ))
        .with_state(state)
        .layer(middleware)
}
