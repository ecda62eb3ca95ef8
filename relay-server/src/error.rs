//! Unified server error type.
//!
//! Handlers return `Result<T, ServerError>`; the error renders as a JSON
//! `{"error": ...}` body. Storage failures are logged in full and reported
//! to the caller only as a generic message.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_core::RelayError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match self {
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_owned()),
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ServerError::Conflict(m) => (StatusCode::CONFLICT, m),
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<RelayError> for ServerError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Validation(m) => ServerError::BadRequest(m),
            RelayError::Auth(_) => ServerError::Unauthorized,
            RelayError::NotFound(what) => ServerError::NotFound(format!("{} not found", what)),
            RelayError::NotResumable => {
                ServerError::Conflict("Message not found or not resumable".to_owned())
            }
            RelayError::InProgress => {
                ServerError::Conflict("Message is still being generated".to_owned())
            }
            RelayError::Storage(e) => ServerError::Internal(format!("{:#}", e)),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (RelayError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (RelayError::Auth("no".into()), StatusCode::UNAUTHORIZED),
            (RelayError::NotFound("message"), StatusCode::NOT_FOUND),
            (RelayError::NotResumable, StatusCode::CONFLICT),
            (RelayError::InProgress, StatusCode::CONFLICT),
            (
                RelayError::Storage(anyhow::anyhow!("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ServerError::from(error).into_response().status(), status);
        }
    }
}
