use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    /// Client-caused; carries a field -> message report. Never retried.
    Validation(serde_json::Value),
    /// Remote store credentials missing. Fatal for the operation, never
    /// retried automatically.
    Configuration(String),
    /// Non-2xx from the remote store, or the store was unreachable.
    RemoteStore { status: u16, body: String, url: String },
    /// I/O failure on the local queue. Only surfaced on the ingestion path,
    /// where the queue is the last line of resilience.
    LocalPersistence(String),
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    Internal(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Validation(report) => write!(f, "Invalid input: {report}"),
            AppError::Configuration(msg) => write!(f, "Not configured: {msg}"),
            AppError::RemoteStore { status, body, url } => {
                write!(f, "Store request failed: status={status} url={url} body={body}")
            }
            AppError::LocalPersistence(msg) => write!(f, "Queue write failed: {msg}"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::Internal(msg) => write!(f, "Internal Error: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Validation(report) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid input", "details": report }),
            ),
            AppError::Configuration(msg) => {
                tracing::error!("Store not configured: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
            // Admin callers are trusted operators; hand them the raw
            // remote diagnostic.
            AppError::RemoteStore { .. } => {
                tracing::error!("{self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": self.to_string() }),
                )
            }
            AppError::LocalPersistence(msg) => {
                tracing::error!("Queue write failed: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to store submission" }),
                )
            }
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, json!({ "error": msg }))
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}
