//! Proposal API module

mod handler;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/proposals", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/accept", patch(handler::accept))
        .route("/{id}/reject", patch(handler::reject))
        .route("/{id}/cancel", patch(handler::cancel))
}
