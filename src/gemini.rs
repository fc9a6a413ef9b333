// Client for the Gemini generateContent REST endpoint, used as the remote
// upscaling backend. Sends one inline-image part plus one instruction part
// and requests image-modality output only; the first inline payload of the
// first candidate is the result.

use crate::remote::{RemoteError, UpscaleBackend, classify_service_error};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl GeminiClient {
    pub fn new(endpoint: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            model,
        }
    }

    fn request_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl UpscaleBackend for GeminiClient {
    async fn upscale(
        &self,
        image: &[u8],
        mime_type: &str,
        instruction: &str,
        credential: &str,
    ) -> Result<String, RemoteError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::inline(mime_type, STANDARD.encode(image)),
                    Part::text(instruction),
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE"],
            },
        };

        let url = self.request_url();
        debug!("Sending generateContent request to {}", url);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", credential)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let (api_status, message) = parse_error_body(&body);
            return Err(classify_service_error(
                status.as_u16(),
                api_status.as_deref(),
                &message,
            ));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|err| {
            RemoteError::Service(format!("unexpected response shape: {}", err))
        })?;
        extract_image_payload(parsed)
    }
}

// Picks the first inline image payload out of the first candidate's parts,
// preserving their order.
fn extract_image_payload(response: GenerateContentResponse) -> Result<String, RemoteError> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .find_map(|part| part.inline_data.map(|inline| inline.data))
        .ok_or(RemoteError::NoImageReturned)
}

// Pulls the machine-readable status and the human-readable message out of an
// error body; a body that is not the documented error envelope is passed
// through verbatim as the message.
fn parse_error_body(body: &str) -> (Option<String>, String) {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error: Some(detail),
        }) => {
            let message = detail.message.unwrap_or_else(|| body.to_string());
            (detail.status, message)
        }
        _ => (None, body.to_string()),
    }
}

// --- Wire structures ---

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(value: &str) -> Self {
        Self {
            text: Some(value.to_string()),
            inline_data: None,
        }
    }

    fn inline(mime_type: &str, data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data,
            }),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize, Debug)]
struct ErrorDetail {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}
