//! Backend for a shape-counting quiz that captures the player's webcam while they
//! play and reports the emotions seen over a session.
//!
//! # Flow
//! - The game calls `GET /start-session` and gets a `session_<millis>` id.
//! - While the game runs, a [`capture::CaptureScheduler`] uploads a webcam frame and a
//!   screenshot every few seconds to `POST /upload`.
//! - The admin dashboard lists sessions with `GET /sessions` and asks for
//!   `GET /analyze/{sessionId}`, which classifies every webcam frame once and stores the
//!   result.
//!
//! # Configuration
//! Defaults can be replaced by a JSON file named in `MOODQUIZ_CONFIG` and then by
//! individual environment variables, see [`config::Config`]. `RUST_LOG` controls log
//! output and defaults to `info`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, HeaderName, Method},
    routing::{get, post},
    Router,
};
use log::{error, info, warn};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

pub mod analysis;
pub mod capture;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod quiz;
pub mod sessions;
pub mod state;
pub mod uploads;
mod utils;

use analysis::{
    routes::{analyze_handler, sessions_handler},
    HttpClassifier,
};
use config::Config;
use db::Database;
use quiz::routes::quiz_handler;
use sessions::routes::{end_session_handler, start_session_handler};
use state::AppState;
use uploads::routes::{upload_handler, SESSION_HEADER};

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(SESSION_HEADER)]);

    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);
    let uploads = ServeDir::new(&state.config.uploads_dir);

    Router::new()
        .route("/start-session", get(start_session_handler))
        .route("/end-session/{session_id}", post(end_session_handler))
        .route("/upload", post(upload_handler).layer(upload_limit))
        .route("/sessions", get(sessions_handler))
        .route("/analyze/{session_id}", get(analyze_handler))
        .route("/quiz", get(quiz_handler))
        .nest_service("/uploads", uploads)
        .layer(cors)
        .with_state(state)
}

pub async fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("moodquiz starting up...");

    let config = Config::load()?;
    tokio::fs::create_dir_all(&config.uploads_dir)
        .await
        .with_context(|| format!("failed to create {}", config.uploads_dir.display()))?;

    let database = Database::new(config.database_path.clone())?;
    let classifier = HttpClassifier::new(
        config.classifier_url.clone(),
        config.classifier_token.clone(),
        config.classifier_timeout(),
    )?;
    if config.classifier_token.is_none() {
        warn!("HF_API_TOKEN not set; classifier requests are unauthenticated");
    }

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::new(config, database, Arc::new(classifier));

    let recovered = state.sessions.recover_abandoned().await?;
    if recovered > 0 {
        info!("Closed {recovered} sessions left open by the previous run");
    }

    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(err) => {
                error!("Failed to install Ctrl+C handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
