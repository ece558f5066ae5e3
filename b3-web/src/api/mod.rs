//! REST API for playback control
//!
//! Thin request layer over the supervisor: decodes requests, hands validated
//! actions and parameter updates to the supervisor, and encodes its results.

pub mod handlers;
pub mod sse;
pub mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeFile, trace::TraceLayer};

use crate::supervisor::Supervisor;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub supervisor: Arc<Supervisor>,
    /// Directory listed by the file endpoint
    pub audio_dir: PathBuf,
    /// Extension (without dot) of listed files
    pub audio_extension: String,
    /// Image served behind the control page
    pub background_image: PathBuf,
}

/// Build the application router
pub fn build_router(ctx: AppContext) -> Router {
    let background = ServeFile::new(&ctx.background_image);

    Router::new()
        // Control page
        .route("/", get(ui::serve_index))
        .route("/static/app.js", get(ui::serve_app_js))
        .route("/static/b3.css", get(ui::serve_css))
        .route_service("/api/background", background)
        // Health check (no prefix for health endpoint)
        .route("/health", get(handlers::health))
        .route("/api/actions", post(handlers::perform_actions))
        .route(
            "/api/config",
            get(handlers::get_config).post(handlers::update_config),
        )
        .route("/api/audiofiles", get(handlers::list_files))
        // SSE event stream
        .route("/api/events", get(sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}
