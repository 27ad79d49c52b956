//! Router assembly: mounts the session bus, the collaborative sync hub
//! (owned by the `sync` crate), and a health endpoint.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::session_ws::session_ws_handler;
use crate::state::AppState;

pub fn build_router(
    state: Arc<AppState>,
    sync_hub: Arc<atomflow_sync::SyncHub>,
    allowed_origins: &[String],
) -> Router {
    let session_routes = Router::new()
        .route("/ws/session/{session_id}", get(session_ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let sync_routes = Router::new()
        .route(
            "/laboratory/sync/{client}/{app}/{project}",
            get(atomflow_sync::sync_ws_handler),
        )
        .with_state(sync_hub);

    Router::new()
        .merge(session_routes)
        .merge(sync_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
}

/// Mirrors the teacher's wildcard-vs-explicit-origin-list CORS setup
/// (spec ambient stack; no in-scope feature governs this, spec.md doesn't
/// mention cross-origin policy at all).
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins.iter().filter_map(|s| s.parse().ok()).collect();
    if origins.is_empty() {
        tracing::warn!("CORS: no valid allowed_origins configured, blocking all cross-origin requests");
        return CorsLayer::new();
    }
    CorsLayer::new().allow_origin(origins).allow_methods(Any)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}
