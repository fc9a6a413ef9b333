// Contains the Axum handler functions for each API endpoint.
// These handlers are a thin adapter between the HTTP surface and the
// session orchestration core.

use crate::{
    app::AppState,
    error::AppError,
    extract_request_data::extract_request_image,
    headers,
    models::*,
};
use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use tracing::{debug, warn};

// --- GET /tiers ---
// Lists the fixed quality tiers offered to the client.
pub async fn get_tiers() -> Json<Vec<&'static TierInfo>> {
    Json(QualityTier::ALL.iter().map(|tier| tier.info()).collect())
}

// --- GET /session ---
// Returns the full session snapshot: credential status, uploaded image,
// orchestration state and result.
pub async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let snapshot = state.session.snapshot().await;
    Json(SessionResponse {
        credential: CredentialStatus {
            present: state.credentials.present(),
            source: state.credentials.source(),
        },
        image: snapshot.image,
        result: snapshot.result.map(|result| result.data_url()),
        state: snapshot.state,
    })
}

// --- POST /credential ---
// Persists a manually entered credential for the session. Rejected when the
// credential is granted by the host environment instead.
pub async fn save_credential(
    State(state): State<AppState>,
    Json(payload): Json<CredentialRequest>,
) -> Result<StatusCode, AppError> {
    if payload.credential.trim().is_empty() {
        return Err(AppError::BadRequest("Credential must not be empty.".to_string()));
    }
    state.credentials.save(payload.credential.trim())?;
    Ok(StatusCode::NO_CONTENT)
}

// --- DELETE /credential ---
// Removes the persisted credential. A failing removal is logged, not fatal.
pub async fn clear_credential(State(state): State<AppState>) -> StatusCode {
    if let Err(err) = state.credentials.clear() {
        warn!("Failed to clear credential: {}", err);
    }
    StatusCode::NO_CONTENT
}

// --- POST /image ---
// Accepts an uploaded image (multipart 'file' field or direct image body),
// replacing any previous upload and clearing previous result/error state.
pub async fn upload_image(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<UploadResponse>, AppError> {
    let (bytes, mime_type) = extract_request_image(request).await?;
    let uploaded = state.session.ingest(bytes, mime_type).await;
    Ok(Json(UploadResponse {
        mime_type: uploaded.mime_type,
        preview: uploaded.preview,
    }))
}

// --- POST /upscale ---
// Runs one orchestration cycle for the requested tier.
pub async fn upscale(
    State(state): State<AppState>,
    Json(payload): Json<UpscaleRequest>,
) -> Result<Json<UpscaleResponse>, AppError> {
    let tier =
        QualityTier::from_id(&payload.tier).ok_or_else(|| AppError::UnknownTier(payload.tier.clone()))?;

    let result = state
        .session
        .upscale(state.backend.as_ref(), state.credentials.as_ref(), tier)
        .await?;

    Ok(Json(UpscaleResponse {
        result: result.data_url(),
    }))
}

// --- GET /result ---
// Serves the upscaled artifact. Clients asking for an image get the raw
// bytes; everyone else gets the JSON data URL.
pub async fn get_result(
    State(state): State<AppState>,
    accept: Option<TypedHeader<headers::Accept>>,
) -> Result<Response, AppError> {
    let snapshot = state.session.snapshot().await;
    let result = snapshot.result.ok_or(AppError::NoResult)?;

    let wants_raw = accept
        .as_ref()
        .map(|TypedHeader(accept)| accept.prefers_raw_image(&result.mime_type))
        .unwrap_or(false);

    if wants_raw {
        let bytes = result.bytes().map_err(|err| {
            AppError::InternalServerError(format!("Stored result payload is not valid base64: {}", err))
        })?;
        debug!(
            "Serving raw result: {} bytes, {}",
            bytes.len(),
            result.mime_type
        );
        return Ok(([(header::CONTENT_TYPE, result.mime_type)], bytes).into_response());
    }

    Ok(Json(UpscaleResponse {
        result: result.data_url(),
    })
    .into_response())
}

// --- POST /reset ---
// Discards image, result and error state; the credential is untouched.
pub async fn reset(State(state): State<AppState>) -> StatusCode {
    state.session.reset().await;
    StatusCode::NO_CONTENT
}
