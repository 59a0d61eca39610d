//! Auth API handlers
//!
//! Token issuance for an already-verified identity. Account management
//! and credential verification live in the external identity service;
//! deployments front this route with it. Without that fronting it
//! behaves as a development token faucet.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::core::ServerState;
use crate::utils::validation::{MAX_ID_LEN, validate_required_text};
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub expires_in_minutes: i64,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<ServerState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    validate_required_text(&payload.user_id, "user_id", MAX_ID_LEN)?;
    validate_required_text(&payload.username, "username", MAX_ID_LEN)?;

    let token = state
        .jwt_service
        .generate_token(&payload.user_id, &payload.username)
        .map_err(|e| AppError::internal(format!("Token generation failed: {e}")))?;

    tracing::info!(user_id = %payload.user_id, "Token issued");

    Ok(Json(LoginResponse {
        token,
        user_id: payload.user_id,
        expires_in_minutes: state.jwt_service.config.expiration_minutes,
    }))
}
