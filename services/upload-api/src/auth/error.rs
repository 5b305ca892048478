use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::api::ErrorResponse;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Authorization header is not a bearer token")]
    MalformedAuthHeader,

    #[error("Invalid JWT: {0}")]
    InvalidJwt(String),

    #[error("Token carries no email claim")]
    EmailNotFound,
}

impl AuthError {
    fn code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_token",
            AuthError::MalformedAuthHeader => "malformed_token",
            AuthError::InvalidJwt(_) => "invalid_token",
            AuthError::EmailNotFound => "missing_identity",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AuthError::InvalidJwt(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
            details: None,
        };
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}
