// Abstraction over the remote generative endpoint that performs the actual
// image transformation, plus the structured classification of its failures.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

// One remote call per orchestration cycle: the image bytes, the declared MIME
// type, and the tier's instruction text, scoped by the credential. Returns the
// base64 payload of the first image-bearing content segment of the response.
//
// Implementations must not retry on their own; transient failures are
// surfaced and the user decides whether to try again.
#[async_trait]
pub trait UpscaleBackend: Send + Sync {
    async fn upscale(
        &self,
        image: &[u8],
        mime_type: &str,
        instruction: &str,
        credential: &str,
    ) -> Result<String, RemoteError>;
}

/// Failure of a remote upscale call.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The endpoint rejected the credential (expired, revoked or malformed).
    #[error("the upscaling service rejected the API credential: {0}")]
    CredentialRejected(String),

    /// The endpoint reported rate or usage limits.
    #[error("the upscaling service reported an exhausted quota: {0}")]
    QuotaExceeded(String),

    /// The request succeeded transport-wise but produced no image output.
    #[error("the upscaling service returned no image data")]
    NoImageReturned,

    /// The endpoint could not be reached at all.
    #[error("failed to reach the upscaling service: {0}")]
    Transport(#[from] reqwest::Error),

    /// Any other error reported by the endpoint.
    #[error("the upscaling service reported an error: {0}")]
    Service(String),
}

// Machine-readable category of a remote failure, stored in the session state
// and echoed in error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteErrorKind {
    CredentialInvalid,
    QuotaExceeded,
    NoImageReturned,
    Unreachable,
    ServiceError,
}

impl RemoteError {
    // Categorizes the error. Structured variants map directly; the catch-all
    // Service variant falls back to scanning the reported message for known
    // phrases, covering responses that carry no machine-readable status.
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            RemoteError::CredentialRejected(_) => RemoteErrorKind::CredentialInvalid,
            RemoteError::QuotaExceeded(_) => RemoteErrorKind::QuotaExceeded,
            RemoteError::NoImageReturned => RemoteErrorKind::NoImageReturned,
            RemoteError::Transport(_) => RemoteErrorKind::Unreachable,
            RemoteError::Service(message) => {
                let lowered = message.to_lowercase();
                if lowered.contains("quota") {
                    RemoteErrorKind::QuotaExceeded
                } else if lowered.contains("api key not valid")
                    || lowered.contains("api key expired")
                {
                    RemoteErrorKind::CredentialInvalid
                } else {
                    RemoteErrorKind::ServiceError
                }
            }
        }
    }
}

/// Classifies a non-success response from the remote endpoint into a
/// `RemoteError`, using the HTTP status and the machine-readable status
/// string of the error body when present.
pub fn classify_service_error(
    http_status: u16,
    api_status: Option<&str>,
    message: &str,
) -> RemoteError {
    if http_status == 429 || api_status == Some("RESOURCE_EXHAUSTED") {
        return RemoteError::QuotaExceeded(message.to_string());
    }

    if matches!(http_status, 401 | 403)
        || matches!(api_status, Some("UNAUTHENTICATED") | Some("PERMISSION_DENIED"))
    {
        return RemoteError::CredentialRejected(message.to_string());
    }

    // Known phrases reported without a dedicated status, e.g. a malformed key
    // arriving as a plain INVALID_ARGUMENT.
    let lowered = message.to_lowercase();
    if lowered.contains("api key not valid") || lowered.contains("api key expired") {
        return RemoteError::CredentialRejected(message.to_string());
    }
    if lowered.contains("quota") {
        return RemoteError::QuotaExceeded(message.to_string());
    }

    RemoteError::Service(format!("status {}: {}", http_status, message))
}
