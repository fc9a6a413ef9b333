// Owns the per-session state (uploaded image, upscaled result, orchestration
// state) and runs orchestration cycles against the remote backend.
//
// One SessionManager instance is shared across Axum tasks. The remote call is
// the only suspension point and is made without holding the session lock;
// an atomic in-flight flag enforces at most one cycle at a time.

use crate::credentials::CredentialStore;
use crate::error::AppError;
use crate::models::{ImageSummary, QualityTier};
use crate::remote::{RemoteErrorKind, UpscaleBackend};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

// The current uploaded image. Replaced wholesale on a new upload; never
// mutated in place. The raw bytes are kept for transmission, the data URL for
// display.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub preview: String,
}

impl UploadedImage {
    pub fn new(bytes: Vec<u8>, mime_type: String) -> Self {
        let preview = format!("data:{};base64,{}", mime_type, STANDARD.encode(&bytes));
        Self {
            bytes,
            mime_type,
            preview,
        }
    }

    pub fn summary(&self) -> ImageSummary {
        ImageSummary {
            mime_type: self.mime_type.clone(),
            preview: self.preview.clone(),
        }
    }
}

// The artifact of a successful cycle: the original MIME type plus the base64
// payload returned by the remote call.
#[derive(Debug, Clone)]
pub struct UpscaleResult {
    pub mime_type: String,
    pub payload: String,
}

impl UpscaleResult {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.payload)
    }

    pub fn bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.payload)
    }
}

/// State of the single orchestration cycle slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "kebab-case")]
pub enum OrchestrationState {
    Idle,
    InFlight,
    Succeeded,
    Failed {
        code: RemoteErrorKind,
        message: String,
    },
}

#[derive(Debug)]
struct Session {
    // Bumped on every upload and reset; a cycle whose sequence number no
    // longer matches discards its outcome.
    seq: u64,
    image: Option<UploadedImage>,
    result: Option<UpscaleResult>,
    state: OrchestrationState,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            seq: 0,
            image: None,
            result: None,
            state: OrchestrationState::Idle,
        }
    }
}

// View of the session for handlers; carries no raw image bytes.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub image: Option<ImageSummary>,
    pub result: Option<UpscaleResult>,
    pub state: OrchestrationState,
}

#[derive(Default)]
pub struct SessionManager {
    session: RwLock<Session>,
    in_flight: AtomicBool,
}

// Releases the in-flight flag on every exit path of a cycle, including
// unwinds.
struct FlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then_some(Self { flag })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts an uploaded image, replacing any previous one and clearing any
    /// previous result and error state. The payload is forwarded as-is; a
    /// payload that does not decode as an image is still accepted here and
    /// fails at the remote call.
    pub async fn ingest(&self, bytes: Vec<u8>, mime_type: String) -> UploadedImage {
        match image::load_from_memory(&bytes) {
            Ok(decoded) => info!(
                "Ingested image: {} bytes, {}x{}, {}",
                bytes.len(),
                decoded.width(),
                decoded.height(),
                mime_type
            ),
            Err(err) => debug!(
                "Ingested payload of {} bytes that does not decode as an image ({}); forwarding as-is",
                bytes.len(),
                err
            ),
        }

        let uploaded = UploadedImage::new(bytes, mime_type);
        let mut session = self.session.write().await;
        session.seq += 1;
        session.image = Some(uploaded.clone());
        session.result = None;
        session.state = OrchestrationState::Idle;
        uploaded
    }

    /// Discards the image, result and error state. The stored credential is
    /// untouched. Idempotent.
    pub async fn reset(&self) {
        let mut session = self.session.write().await;
        session.seq += 1;
        session.image = None;
        session.result = None;
        session.state = OrchestrationState::Idle;
        info!("Session reset");
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.read().await;
        SessionSnapshot {
            image: session.image.as_ref().map(UploadedImage::summary),
            result: session.result.clone(),
            state: session.state.clone(),
        }
    }

    /// Runs one orchestration cycle: dispatches the current image and the
    /// tier's instruction to the backend and settles the session state with
    /// the outcome. Rejects overlapping calls, missing input, and a missing
    /// credential before anything is dispatched.
    pub async fn upscale(
        &self,
        backend: &dyn UpscaleBackend,
        credentials: &dyn CredentialStore,
        tier: QualityTier,
    ) -> Result<UpscaleResult, AppError> {
        let _guard = FlightGuard::acquire(&self.in_flight).ok_or(AppError::Busy)?;

        let credential = match credentials.load() {
            Ok(Some(credential)) => credential,
            Ok(None) => return Err(AppError::MissingCredential),
            Err(err) => {
                warn!("Credential read failed, treating as absent: {}", err);
                return Err(AppError::MissingCredential);
            }
        };

        let cycle_id = Uuid::new_v4();
        let (seq, bytes, mime_type) = {
            let mut session = self.session.write().await;
            let image = session.image.as_ref().ok_or(AppError::MissingImage)?;
            let captured = (session.seq, image.bytes.clone(), image.mime_type.clone());
            session.result = None;
            session.state = OrchestrationState::InFlight;
            captured
        };

        info!(
            "Dispatching upscale cycle {}: tier={}, {} bytes, {}",
            cycle_id,
            tier,
            bytes.len(),
            mime_type
        );

        let outcome = backend
            .upscale(&bytes, &mime_type, tier.info().instruction, &credential)
            .await;

        let mut session = self.session.write().await;
        if session.seq != seq {
            // The image was replaced or the session reset while the call was
            // in the air; the fresh state wins and this outcome is dropped.
            info!(
                "Upscale cycle {} superseded by a newer session change, discarding outcome",
                cycle_id
            );
            return Err(AppError::Superseded);
        }

        match outcome {
            Ok(payload) => {
                let result = UpscaleResult {
                    mime_type,
                    payload,
                };
                session.result = Some(result.clone());
                session.state = OrchestrationState::Succeeded;
                info!("Upscale cycle {} succeeded", cycle_id);
                Ok(result)
            }
            Err(err) => {
                let code = err.kind();
                let message = err.to_string();
                warn!("Upscale cycle {} failed ({:?}): {}", cycle_id, code, message);
                if code == RemoteErrorKind::CredentialInvalid {
                    // Force re-entry on the next attempt.
                    if let Err(clear_err) = credentials.clear() {
                        warn!("Failed to clear rejected credential: {}", clear_err);
                    }
                }
                session.state = OrchestrationState::Failed {
                    code,
                    message,
                };
                Err(AppError::Remote(err))
            }
        }
    }
}
