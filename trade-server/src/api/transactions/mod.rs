//! Transaction API module

mod handler;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/transactions", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/{id}", get(handler::get_by_id).patch(handler::update_meetup))
        .route("/{id}/confirm-completion", patch(handler::confirm_completion))
        .route(
            "/{id}/confirm-cancellation",
            patch(handler::confirm_cancellation),
        )
        .route(
            "/by-conversation/{conversation_id}",
            get(handler::by_conversation),
        )
}
