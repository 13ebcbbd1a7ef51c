//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Body limit covering the upload endpoint; the handler enforces the tighter
/// per-upload cap.
const BODY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

/// Build the application router with:
/// - WebSocket tutor chat at `/ws`
/// - REST API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback (uploads live below it)
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/exercise", post(http::http_post_exercise))
        .route("/api/v1/exercise/:id", get(http::http_get_exercise))
        .route("/api/v1/catalog", get(http::http_get_catalog))
        .route("/api/v1/unit/:unit", get(http::http_get_unit))
        .route("/api/v1/session", post(http::http_post_session))
        .route("/api/v1/session/:id", get(http::http_get_session))
        .route("/api/v1/session/:id/answer", post(http::http_post_answer))
        .route("/api/v1/session/:id/submit", post(http::http_post_submit))
        .route("/api/v1/session/:id/reset", post(http::http_post_reset))
        .route("/api/v1/review/pending", get(http::http_get_pending_reviews))
        .route("/api/v1/review", post(http::http_post_resolve_review))
        .route("/api/v1/review/feedback", post(http::http_post_suggest_feedback))
        .route("/api/v1/image/upload", post(http::http_post_upload))
        .route("/api/v1/tutor/message", post(http::http_post_tutor_message))
        // State + body limit + CORS + HTTP tracing
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
