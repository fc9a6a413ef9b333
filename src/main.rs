// Main entry point for the pixlift-server application.
// Sets up the Tokio runtime, wires the session manager, credential store and
// remote backend together, configures the Axum router, and starts the HTTP
// server.

mod app;
mod credentials;
mod error;
mod extract_request_data;
mod gemini;
mod handlers;
mod headers;
mod listeners;
mod models;
mod remote;
mod session;
mod shutdown_signal;

use app::{AppState, create_app};
use clap::Parser;
use credentials::{CredentialStore, HostGrantedCredentials, SessionFileCredentials};
use gemini::GeminiClient;
use session::SessionManager;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

/// Command line arguments for pixlift-server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct AppConfig {
    /// Hostname/IP to bind the server to.
    /// If this option is specified without value, it will default to "*", meaning the server will listen on all interfaces.
    #[arg(long, env = "PIXLIFT_SERVER_HOST", default_value = "localhost", num_args = 0..=1, default_missing_value = "*")]
    host: String,

    /// Port number to listen on.
    #[arg(short, long, env = "PIXLIFT_SERVER_PORT", default_value_t = 7764)]
    port: u16,

    /// API credential granted by the host environment.
    /// When set, manual credential entry through the API is disabled.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Path of the session file used to persist a manually entered credential.
    #[arg(
        long,
        env = "PIXLIFT_SERVER_SESSION_FILE",
        default_value = "pixlift-session.json"
    )]
    session_file: PathBuf,

    /// Generative model used for upscaling.
    #[arg(long, env = "PIXLIFT_SERVER_MODEL", default_value = gemini::DEFAULT_MODEL)]
    model: String,

    /// Base URL of the generative endpoint.
    #[arg(long, env = "PIXLIFT_SERVER_ENDPOINT", default_value = gemini::DEFAULT_ENDPOINT)]
    endpoint: String,
}

#[tokio::main]
async fn main() {
    // Parse command line args and environment variables
    let config = AppConfig::parse();

    // Initialize tracing subscriber for structured logging.
    // Logs will go to stdout. Adjust level and format as needed.
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true) // Include module path in logs
        .with_file(true) // Include source file name
        .with_line_number(true) // Include line numbers
        .init();

    tracing::info!("Starting pixlift-server...");
    tracing::info!(
        "Upscaling delegated to model '{}' at {}",
        config.model,
        config.endpoint
    );

    // --- Select the credential acquisition mode ---
    // Exactly one mode is active per process; the orchestrator does not care
    // which.
    let credentials: Arc<dyn CredentialStore> = match config.api_key {
        Some(api_key) => {
            tracing::info!("Credential granted by the host environment; manual entry is disabled");
            Arc::new(HostGrantedCredentials::new(api_key))
        }
        None => {
            tracing::info!(
                "Manual credential entry enabled; session file: {}",
                config.session_file.display()
            );
            Arc::new(SessionFileCredentials::new(config.session_file))
        }
    };

    let state = AppState {
        session: Arc::new(SessionManager::new()),
        credentials,
        backend: Arc::new(GeminiClient::new(config.endpoint, config.model)),
    };

    let app = create_app(state);
    tracing::info!("Axum router configured.");

    // --- Start HTTP Server ---
    let listener = match listeners::create_listener(&config.host, config.port).await {
        Ok((addr, listener)) => {
            tracing::info!("Server successfully bound. Listening on {}", addr);
            listener
        }
        Err(err) => {
            tracing::error!("FATAL: Failed to bind server: {}", err);
            eprintln!("FATAL: Could not bind server. Error: {}. Exiting.", err);
            std::process::exit(1);
        }
    };

    // Run the server.
    if let Err(err) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal::shutdown_signal())
        .await
    {
        tracing::error!("Server run error: {}", err);
        eprintln!("ERROR: Server shut down unexpectedly. Error: {}", err);
    }

    tracing::info!("pixlift-server has shut down.");
}
