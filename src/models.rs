// Defines data structures for API request and response bodies,
// using Serde for JSON serialization and deserialization.

use serde::{Deserialize, Serialize};

// The fixed set of quality tiers offered to the client. Each tier maps to an
// instruction string sent alongside the image to the generative endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityTier {
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
    #[serde(rename = "8K")]
    EightK,
}

// Static description of a quality tier, served by GET /tiers.
#[derive(Serialize, Debug)]
pub struct TierInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub instruction: &'static str,
}

const TIER_2K: TierInfo = TierInfo {
    id: "2K",
    name: "2K",
    description: "Good quality (2048px)",
    instruction: "Upscale this image to a crisp 2K resolution (2048px on the longest side). Enhance details, remove noise, and improve overall clarity while preserving the original character of the image.",
};

const TIER_4K: TierInfo = TierInfo {
    id: "4K",
    name: "4K",
    description: "High quality (4096px)",
    instruction: "Upscale this image to a high-quality 4K resolution (4096px on the longest side). Focus on photorealistic details, sharpening important features, and creating a very high-fidelity result.",
};

const TIER_8K: TierInfo = TierInfo {
    id: "8K",
    name: "8K",
    description: "Ultra quality (7680px)",
    instruction: "Upscale this image to an ultra-high 8K resolution (7680px on the longest side). Reconstruct fine textures and details to the maximum possible level, aiming for a stunning, professional-grade result suitable for large prints.",
};

impl QualityTier {
    pub const ALL: [QualityTier; 3] = [QualityTier::TwoK, QualityTier::FourK, QualityTier::EightK];

    // Resolves a tier identifier as sent by the client. Returns None for
    // identifiers outside the fixed set.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|tier| tier.info().id == id)
    }

    pub fn info(self) -> &'static TierInfo {
        match self {
            QualityTier::TwoK => &TIER_2K,
            QualityTier::FourK => &TIER_4K,
            QualityTier::EightK => &TIER_8K,
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.info().id)
    }
}

// Request body for POST /credential (manual acquisition mode only).
#[derive(Deserialize, Debug)]
pub struct CredentialRequest {
    pub credential: String,
}

// Credential presence and acquisition mode, embedded in GET /session.
// The credential value itself is never echoed back.
#[derive(Serialize, Debug)]
pub struct CredentialStatus {
    pub present: bool,
    pub source: &'static str,
}

// Request body for POST /upscale. The tier is carried as a raw identifier so
// an unknown value surfaces as a distinct lookup failure rather than a
// deserialization error.
#[derive(Deserialize, Debug)]
pub struct UpscaleRequest {
    pub tier: String,
}

// Response body for a completed POST /upscale.
#[derive(Serialize, Debug)]
pub struct UpscaleResponse {
    // Data URL combining the uploaded image's MIME type with the returned
    // base64 payload.
    pub result: String,
}

// Response body for POST /image.
#[derive(Serialize, Debug)]
pub struct UploadResponse {
    pub mime_type: String,
    // Data URL preview of the uploaded image, for direct display.
    pub preview: String,
}

// Full session snapshot served by GET /session.
#[derive(Serialize, Debug)]
pub struct SessionResponse {
    pub credential: CredentialStatus,
    pub image: Option<ImageSummary>,
    pub state: crate::session::OrchestrationState,
    pub result: Option<String>,
}

// Displayable description of the currently uploaded image.
#[derive(Serialize, Debug, Clone)]
pub struct ImageSummary {
    pub mime_type: String,
    pub preview: String,
}
