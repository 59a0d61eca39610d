//! Health check endpoint

use axum::routing::get;
use axum::{Json, Router, extract::State};
use serde::Serialize;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/health", get(health))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    epoch: String,
    connected_users: usize,
}

/// GET /api/health
async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        epoch: state.epoch().to_string(),
        connected_users: state.registry.connected_user_count(),
    })
}
