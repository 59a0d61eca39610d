//! Transaction API handlers

use axum::{
    Json,
    extract::{Extension, Path, State},
};
use serde::Deserialize;

use shared::trade::{MeetupInfo, Transaction};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::utils::validation::{
    MAX_ID_LEN, MAX_PLACE_LEN, validate_required_text, validate_timestamp,
};
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct MeetupInput {
    pub time: i64,
    pub place: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransaction {
    pub item_id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub meetup: Option<MeetupInput>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeetup {
    #[serde(default)]
    pub meetup_time: Option<i64>,
    #[serde(default)]
    pub meetup_place: Option<String>,
}

/// POST /api/transactions - schedule a trade without a prior proposal
///
/// The buyer is derived as the conversation participant who does not
/// own the item; either participant may initiate.
pub async fn create(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(payload): Json<CreateTransaction>,
) -> AppResult<Json<Transaction>> {
    validate_required_text(&payload.item_id, "item_id", MAX_ID_LEN)?;
    validate_required_text(&payload.conversation_id, "conversation_id", MAX_ID_LEN)?;
    let meetup = match payload.meetup {
        Some(m) => {
            validate_timestamp(m.time, "meetup.time")?;
            validate_required_text(&m.place, "meetup.place", MAX_PLACE_LEN)?;
            Some(MeetupInfo {
                time: m.time,
                place: m.place,
            })
        }
        None => None,
    };

    let seller_id = state
        .catalog
        .get_item_owner(&payload.item_id)
        .await
        .map_err(|e| AppError::internal(e.to_string()))?
        .ok_or_else(|| AppError::not_found(format!("Item {} not found", payload.item_id)))?;

    let (a, b) = state
        .conversations
        .participants(&payload.conversation_id)
        .await
        .map_err(|e| AppError::not_found(e.to_string()))?;

    if current_user.id != a && current_user.id != b {
        return Err(AppError::forbidden("Not a participant of this conversation"));
    }
    let buyer_id = if seller_id == a {
        b
    } else if seller_id == b {
        a
    } else {
        return Err(AppError::validation(
            "The conversation does not involve the item owner",
        ));
    };

    let transaction = state
        .transactions
        .create(
            &payload.item_id,
            &payload.conversation_id,
            &buyer_id,
            &seller_id,
            meetup,
        )
        .await?;
    Ok(Json(transaction))
}

/// GET /api/transactions/{id} - fetch a transaction (participants only)
pub async fn get_by_id(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Transaction>> {
    let transaction = state
        .transactions
        .get(&id)
        .ok_or_else(|| AppError::not_found(format!("Transaction {id} not found")))?;
    if !transaction.involves(&current_user.id) {
        return Err(AppError::forbidden("Not a participant of this transaction"));
    }
    Ok(Json(transaction))
}

/// PATCH /api/transactions/{id} - set or edit the meetup
///
/// Fields merge over the current meetup; the result must be complete
/// (both time and place known).
pub async fn update_meetup(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateMeetup>,
) -> AppResult<Json<Transaction>> {
    let current = state
        .transactions
        .get(&id)
        .ok_or_else(|| AppError::not_found(format!("Transaction {id} not found")))?;

    let time = payload
        .meetup_time
        .or(current.meetup_time)
        .ok_or_else(|| AppError::validation("meetup_time is required"))?;
    let place = payload
        .meetup_place
        .or(current.meetup_place)
        .ok_or_else(|| AppError::validation("meetup_place is required"))?;
    validate_timestamp(time, "meetup_time")?;
    validate_required_text(&place, "meetup_place", MAX_PLACE_LEN)?;

    let transaction = state
        .transactions
        .set_meetup(&id, &current_user.id, time, &place)
        .await?;
    Ok(Json(transaction))
}

/// PATCH /api/transactions/{id}/confirm-completion
pub async fn confirm_completion(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Transaction>> {
    let transaction = state
        .transactions
        .confirm_completion(&id, &current_user.id)
        .await?;
    Ok(Json(transaction))
}

/// PATCH /api/transactions/{id}/confirm-cancellation
pub async fn confirm_cancellation(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Transaction>> {
    let transaction = state
        .transactions
        .confirm_cancellation(&id, &current_user.id)
        .await?;
    Ok(Json(transaction))
}

/// GET /api/transactions/by-conversation/{conversation_id}
pub async fn by_conversation(
    State(state): State<ServerState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(conversation_id): Path<String>,
) -> AppResult<Json<Vec<Transaction>>> {
    let (a, b) = state
        .conversations
        .participants(&conversation_id)
        .await
        .map_err(|e| AppError::not_found(e.to_string()))?;
    if current_user.id != a && current_user.id != b {
        return Err(AppError::forbidden("Not a participant of this conversation"));
    }

    Ok(Json(state.transactions.by_conversation(&conversation_id)))
}
