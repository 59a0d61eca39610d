//! Proposal API handlers

use axum::{
    Json,
    extract::{Extension, Path, State},
};
use serde::{Deserialize, Serialize};

use shared::trade::{BuyRequest, Transaction};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::validation::{MAX_ID_LEN, validate_optional_text, validate_required_text};
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct CreateProposal {
    pub item_id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    pub buy_request: BuyRequest,
    pub transaction: Transaction,
}

/// POST /api/proposals - propose to buy an item
pub async fn create(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<CreateProposal>,
) -> AppResult<Json<BuyRequest>> {
    validate_required_text(&payload.item_id, "item_id", MAX_ID_LEN)?;
    validate_optional_text(&payload.conversation_id, "conversation_id", MAX_ID_LEN)?;

    let request = state
        .proposals
        .propose(&current_user.id, &payload.item_id, payload.conversation_id)
        .await?;
    Ok(Json(request))
}

/// GET /api/proposals/{id} - fetch a single proposal (participants only)
pub async fn get_by_id(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<BuyRequest>> {
    let request = state
        .proposals
        .get(&id)
        .ok_or_else(|| AppError::not_found(format!("Buy request {id} not found")))?;
    if !request.involves(&current_user.id) {
        return Err(AppError::forbidden("Not a participant of this proposal"));
    }
    Ok(Json(request))
}

/// PATCH /api/proposals/{id}/accept - seller accepts; returns the
/// request together with the transaction created in the same step
pub async fn accept(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<AcceptResponse>> {
    let (buy_request, transaction) = state.proposals.accept(&id, &current_user.id).await?;
    Ok(Json(AcceptResponse {
        buy_request,
        transaction,
    }))
}

/// PATCH /api/proposals/{id}/reject - seller declines
pub async fn reject(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<BuyRequest>> {
    let request = state.proposals.reject(&id, &current_user.id).await?;
    Ok(Json(request))
}

/// PATCH /api/proposals/{id}/cancel - buyer withdraws
pub async fn cancel(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<BuyRequest>> {
    let request = state.proposals.cancel(&id, &current_user.id).await?;
    Ok(Json(request))
}
