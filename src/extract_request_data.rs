use axum::{
    body,
    extract::{FromRequest, Multipart, Request},
    http::header,
};
use tracing::debug;

use crate::error::AppError;

// Fallback MIME type for uploads that declare none. The boundary is
// deliberately unvalidated: whatever arrives is forwarded downstream and
// fails at the remote call if it is not an image.
const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Extracts the uploaded image bytes and their declared MIME type from either
/// a `multipart/form-data` request (a `file` field) or a direct image body.
pub async fn extract_request_image(request: Request) -> Result<(Vec<u8>, String), AppError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        extract_multipart_image(request).await
    } else {
        extract_direct_image(request, &content_type).await
    }
}

async fn extract_multipart_image(request: Request) -> Result<(Vec<u8>, String), AppError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|err| AppError::BadRequest(format!("Failed to process multipart request: {}", err)))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(format!("Failed to process multipart field: {}", err)))?
    {
        if field.name() != Some("file") {
            debug!(
                "Ignoring multipart field: {}",
                field.name().unwrap_or("unnamed")
            );
            continue;
        }

        let mime_type = field
            .content_type()
            .unwrap_or(FALLBACK_MIME_TYPE)
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|err| AppError::BadRequest(format!("Failed to read file data: {}", err)))?
            .to_vec();

        if data.is_empty() {
            return Err(AppError::BadRequest(
                "Uploaded 'file' field is empty.".to_string(),
            ));
        }

        return Ok((data, mime_type));
    }

    Err(AppError::BadRequest(
        "Missing 'file' field in multipart request.".to_string(),
    ))
}

async fn extract_direct_image(
    request: Request,
    content_type: &str,
) -> Result<(Vec<u8>, String), AppError> {
    if !content_type.is_empty()
        && !content_type.starts_with("image/")
        && !content_type.starts_with("application/octet-stream")
    {
        return Err(AppError::UnsupportedMediaType(format!(
            "Content-Type '{}' is not supported. Expected image/*, multipart/form-data, or application/octet-stream.",
            content_type
        )));
    }

    let bytes = body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|err| AppError::BadRequest(format!("Failed to read request body: {}", err)))?;

    if bytes.is_empty() {
        return Err(AppError::BadRequest("Request body is empty.".to_string()));
    }

    let mime_type = if content_type.is_empty() {
        FALLBACK_MIME_TYPE.to_string()
    } else {
        content_type.to_string()
    };

    Ok((bytes.to_vec(), mime_type))
}
