// src/error.rs
// Defines the error surface of the application and its
// conversion into HTTP responses.

use crate::credentials::StorageError;
use crate::remote::{RemoteError, RemoteErrorKind};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json; // For creating JSON error bodies

#[derive(Debug)]
pub enum AppError {
    // Preconditions of an orchestration cycle
    MissingImage,
    MissingCredential,
    Busy,
    // The cycle settled, but a newer upload or reset owns the session now
    Superseded,
    // The requested tier does not resolve to a known configuration.
    // A well-behaved client can never produce this.
    UnknownTier(String),

    // Credential persistence
    Storage(StorageError),

    // Errors reported by the remote upscaling call
    Remote(RemoteError),

    // Errors related to request processing
    BadRequest(String),
    UnsupportedMediaType(String),
    NoResult,

    // Miscellaneous server issues
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, error_code_str) = match self {
            AppError::MissingImage => (
                StatusCode::BAD_REQUEST,
                "Please upload an image first.".to_string(),
                "MISSING_IMAGE",
            ),
            AppError::MissingCredential => (
                StatusCode::BAD_REQUEST,
                "No API credential is set. Please provide one before upscaling.".to_string(),
                "MISSING_CREDENTIAL",
            ),
            AppError::Busy => (
                StatusCode::CONFLICT,
                "An upscale request is already in progress.".to_string(),
                "BUSY",
            ),
            AppError::Superseded => (
                StatusCode::CONFLICT,
                "The image changed while the request was in progress; the result was discarded."
                    .to_string(),
                "SUPERSEDED",
            ),
            AppError::UnknownTier(id) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Unknown quality tier '{}'.", id),
                "UNKNOWN_TIER",
            ),
            AppError::Storage(StorageError::Unsupported) => (
                StatusCode::CONFLICT,
                StorageError::Unsupported.to_string(),
                "CREDENTIAL_ENTRY_DISABLED",
            ),
            AppError::Storage(err) => (
                StatusCode::SERVICE_UNAVAILABLE,
                err.to_string(),
                "STORAGE_UNAVAILABLE",
            ),
            AppError::Remote(err) => {
                let (status, code) = match err.kind() {
                    RemoteErrorKind::CredentialInvalid => {
                        (StatusCode::UNAUTHORIZED, "CREDENTIAL_INVALID")
                    }
                    RemoteErrorKind::QuotaExceeded => {
                        (StatusCode::TOO_MANY_REQUESTS, "QUOTA_EXCEEDED")
                    }
                    RemoteErrorKind::NoImageReturned => {
                        (StatusCode::BAD_GATEWAY, "NO_IMAGE_RETURNED")
                    }
                    RemoteErrorKind::Unreachable => {
                        (StatusCode::BAD_GATEWAY, "UPSTREAM_UNREACHABLE")
                    }
                    RemoteErrorKind::ServiceError => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
                };
                (status, err.to_string(), code)
            }
            AppError::BadRequest(s) => (StatusCode::BAD_REQUEST, s, "BAD_REQUEST"),
            AppError::UnsupportedMediaType(s) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                format!("Unsupported media type: {}", s),
                "UNSUPPORTED_MEDIA_TYPE",
            ),
            AppError::NoResult => (
                StatusCode::NOT_FOUND,
                "No upscaled result is available.".to_string(),
                "NO_RESULT",
            ),
            AppError::InternalServerError(s) => {
                (StatusCode::INTERNAL_SERVER_ERROR, s, "INTERNAL_SERVER_ERROR")
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code_str,
                "message": error_message,
            }
        }));
        (status, body).into_response()
    }
}

// Implement From for common error types to simplify error handling in
// handlers and the orchestrator.
impl From<RemoteError> for AppError {
    fn from(err: RemoteError) -> Self {
        AppError::Remote(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}
