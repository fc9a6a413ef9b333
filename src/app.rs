// Router construction and the shared application state handed to handlers.

use crate::credentials::CredentialStore;
use crate::handlers;
use crate::remote::UpscaleBackend;
use crate::session::SessionManager;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Level;

// Maximum allowed size for image upload requests. The remote endpoint caps
// inline payloads well below this.
pub const MAX_IMAGE_SIZE_BYTES: usize = 25 * 1024 * 1024; // 25MB

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<SessionManager>,
    pub credentials: Arc<dyn CredentialStore>,
    pub backend: Arc<dyn UpscaleBackend>,
}

pub fn create_app(state: AppState) -> Router {
    // Configure the router with all API endpoints
    Router::new()
        // Tier discovery and session inspection
        .route("/tiers", get(handlers::get_tiers))
        .route("/session", get(handlers::get_session))
        // Credential lifecycle
        .route(
            "/credential",
            post(handlers::save_credential).delete(handlers::clear_credential),
        )
        // Upload, orchestration, result retrieval, reset
        .route("/image", post(handlers::upload_image))
        .route("/upscale", post(handlers::upscale))
        .route("/result", get(handlers::get_result))
        .route("/reset", post(handlers::reset))
        // Apply a layer to limit the maximum size of request bodies
        .layer(DefaultBodyLimit::max(MAX_IMAGE_SIZE_BYTES))
        // Add CORS layer for the external frontend
        .layer(CorsLayer::permissive())
        // Add tracing for HTTP requests and responses
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(Level::INFO)))
        // Provide the shared state
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::testing::MemoryCredentials;
    use crate::remote::testing::StubBackend;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use std::io::Cursor;
    use tower::ServiceExt;

    fn test_state(backend: StubBackend, credentials: MemoryCredentials) -> AppState {
        AppState {
            session: Arc::new(SessionManager::new()),
            credentials: Arc::new(credentials),
            backend: Arc::new(backend),
        }
    }

    fn png_fixture() -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(10, 10, image::Rgba([200, 100, 50, 255]));
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_get_tiers_lists_three_tiers() {
        let app = create_app(test_state(
            StubBackend::returning("X"),
            MemoryCredentials::empty(),
        ));

        let response = app
            .oneshot(Request::get("/tiers").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let tiers = json.as_array().unwrap();
        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers[0]["id"], "2K");
        assert_eq!(tiers[1]["id"], "4K");
        assert_eq!(tiers[2]["id"], "8K");
        assert!(tiers[2]["instruction"].as_str().unwrap().contains("8K"));
    }

    #[tokio::test]
    async fn test_upscale_without_upload_is_rejected_without_dispatch() {
        let backend = Arc::new(StubBackend::returning("X"));
        let state = AppState {
            session: Arc::new(SessionManager::new()),
            credentials: Arc::new(MemoryCredentials::with_credential("sk-test")),
            backend: backend.clone(),
        };
        let app = create_app(state);

        let response = app
            .oneshot(
                Request::post("/upscale")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"tier":"4K"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "MISSING_IMAGE");

        // No remote call was dispatched.
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_full_flow_upload_then_upscale() {
        let app = create_app(test_state(
            StubBackend::returning("UAFTVQ=="),
            MemoryCredentials::empty(),
        ));

        // Save the credential.
        let response = app
            .clone()
            .oneshot(
                Request::post("/credential")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"credential":"sk-test"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        // Upload a PNG as a direct body.
        let response = app
            .clone()
            .oneshot(
                Request::post("/image")
                    .header(header::CONTENT_TYPE, "image/png")
                    .body(Body::from(png_fixture()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["mime_type"], "image/png");
        assert!(json["preview"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));

        // Run the upscale.
        let response = app
            .clone()
            .oneshot(
                Request::post("/upscale")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"tier":"4K"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["result"], "data:image/png;base64,UAFTVQ==");

        // The session reflects the success.
        let response = app
            .clone()
            .oneshot(Request::get("/session").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["state"]["phase"], "succeeded");
        assert_eq!(json["result"], "data:image/png;base64,UAFTVQ==");
        assert_eq!(json["credential"]["present"], true);
    }

    #[tokio::test]
    async fn test_multipart_upload_is_accepted() {
        let app = create_app(test_state(
            StubBackend::returning("X"),
            MemoryCredentials::empty(),
        ));

        let boundary = "pixlift-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"file\"; filename=\"photo.png\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(&png_fixture());
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let response = app
            .oneshot(
                Request::post("/image")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={}", boundary),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["preview"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_unknown_tier_fails_fast() {
        let app = create_app(test_state(
            StubBackend::returning("X"),
            MemoryCredentials::with_credential("sk-test"),
        ));

        let response = app
            .oneshot(
                Request::post("/upscale")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"tier":"16K"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "UNKNOWN_TIER");
    }

    #[tokio::test]
    async fn test_reset_clears_session_but_keeps_credential() {
        let app = create_app(test_state(
            StubBackend::returning("UAFTVQ=="),
            MemoryCredentials::with_credential("sk-test"),
        ));

        let response = app
            .clone()
            .oneshot(
                Request::post("/image")
                    .header(header::CONTENT_TYPE, "image/png")
                    .body(Body::from(png_fixture()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(Request::post("/reset").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(Request::get("/session").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["state"]["phase"], "idle");
        assert_eq!(json["image"], serde_json::Value::Null);
        assert_eq!(json["result"], serde_json::Value::Null);
        assert_eq!(json["credential"]["present"], true);
    }

    #[tokio::test]
    async fn test_result_content_negotiation() {
        let payload = {
            use base64::Engine as _;
            base64::engine::general_purpose::STANDARD.encode(b"upscaled-bytes")
        };
        let app = create_app(test_state(
            StubBackend::returning(&payload),
            MemoryCredentials::with_credential("sk-test"),
        ));

        // No result yet.
        let response = app
            .clone()
            .oneshot(Request::get("/result").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        app.clone()
            .oneshot(
                Request::post("/image")
                    .header(header::CONTENT_TYPE, "image/png")
                    .body(Body::from(png_fixture()))
                    .unwrap(),
            )
            .await
            .unwrap();
        app.clone()
            .oneshot(
                Request::post("/upscale")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"tier":"2K"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        // JSON by default.
        let response = app
            .clone()
            .oneshot(Request::get("/result").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(
            json["result"],
            format!("data:image/png;base64,{}", payload)
        );

        // Raw bytes when the client asks for the image.
        let response = app
            .clone()
            .oneshot(
                Request::get("/result")
                    .header(header::ACCEPT, "image/png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), b"upscaled-bytes");
    }

    #[tokio::test]
    async fn test_save_credential_rejected_in_host_mode() {
        let state = AppState {
            session: Arc::new(SessionManager::new()),
            credentials: Arc::new(crate::credentials::HostGrantedCredentials::new(
                "host-key".to_string(),
            )),
            backend: Arc::new(StubBackend::returning("X")),
        };
        let app = create_app(state);

        let response = app
            .clone()
            .oneshot(
                Request::post("/credential")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"credential":"sk-user"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "CREDENTIAL_ENTRY_DISABLED");

        // The session still reports the host-granted credential.
        let response = app
            .oneshot(Request::get("/session").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["credential"]["present"], true);
        assert_eq!(json["credential"]["source"], "host");
    }

    #[tokio::test]
    async fn test_missing_credential_rejected_with_message() {
        let app = create_app(test_state(
            StubBackend::returning("X"),
            MemoryCredentials::empty(),
        ));

        app.clone()
            .oneshot(
                Request::post("/image")
                    .header(header::CONTENT_TYPE, "image/png")
                    .body(Body::from(png_fixture()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::post("/upscale")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"tier":"4K"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "MISSING_CREDENTIAL");
    }
}
