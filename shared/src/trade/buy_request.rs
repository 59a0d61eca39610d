//! Buy request (purchase proposal) model

use serde::{Deserialize, Serialize};

use crate::util::{new_id, now_millis};

/// Buy request lifecycle status
///
/// `Pending` is the only non-terminal state. Transitions:
/// `Pending -> Accepted` (seller), `Pending -> Rejected` (seller),
/// `Pending -> Cancelled` (buyer).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuyRequestStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl BuyRequestStatus {
    /// Terminal statuses accept no further transition
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BuyRequestStatus::Pending)
    }
}

/// A buyer's offer to purchase a specific item from a specific seller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuyRequest {
    pub id: String,
    pub item_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub conversation_id: String,
    pub status: BuyRequestStatus,
    /// Creation time (unix millis)
    pub created_at: i64,
    /// Time of the seller/buyer response, set on any terminal transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<i64>,
}

impl BuyRequest {
    /// Create a new pending request
    pub fn new(
        item_id: impl Into<String>,
        buyer_id: impl Into<String>,
        seller_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            item_id: item_id.into(),
            buyer_id: buyer_id.into(),
            seller_id: seller_id.into(),
            conversation_id: conversation_id.into(),
            status: BuyRequestStatus::Pending,
            created_at: now_millis(),
            responded_at: None,
        }
    }

    /// Whether `user_id` is one of the two participants
    pub fn involves(&self, user_id: &str) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }
}
