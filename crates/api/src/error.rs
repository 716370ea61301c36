//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use coordinator::CoordinatorError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Coordinator rejected the operation.
    Coordinator(CoordinatorError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Coordinator(err) => coordinator_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn coordinator_error_to_response(err: CoordinatorError) -> (StatusCode, String) {
    match &err {
        CoordinatorError::NotFound(_) | CoordinatorError::ParticipantNotFound { .. } => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        // the protocol promises 412 once close/cancel has begun
        CoordinatorError::EndAlreadyBegun { .. } => (StatusCode::PRECONDITION_FAILED, err.to_string()),
        CoordinatorError::InvalidState { .. } => (StatusCode::CONFLICT, err.to_string()),
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        ApiError::Coordinator(err)
    }
}
