//! HTTP API - route composition
//!
//! Resource routers are merged and wrapped with the auth middleware,
//! CORS and request tracing. The gateway's WebSocket route lives on the
//! same router; it skips the bearer middleware and authenticates its
//! own query token.

pub mod auth;
pub mod health;
pub mod proposals;
pub mod transactions;

use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

pub fn router(state: ServerState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(health::router())
        .merge(proposals::router())
        .merge(transactions::router())
        .merge(crate::gateway::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
