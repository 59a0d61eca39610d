//! Transaction model and the dual-confirmation quorum

use serde::{Deserialize, Serialize};

use crate::util::{new_id, now_millis};

/// Transaction lifecycle status
///
/// `InProgress` is initial. `Completed` and `Cancelled` are terminal and
/// mutually exclusive; each is reached only by its own 2-of-2 quorum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    InProgress,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::InProgress)
    }
}

/// Which side of the trade a user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantRole {
    Buyer,
    Seller,
}

/// Meetup coordinates agreed inside the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeetupInfo {
    /// Agreed time (unix millis)
    pub time: i64,
    pub place: String,
}

/// The record of an agreed purchase
///
/// The four confirmation booleans are written independently by the two
/// participants. After every write the matching quorum is evaluated:
/// both completion flags true => `Completed`, both cancellation flags
/// true => `Cancelled`. Once terminal, all four flags are frozen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub item_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub conversation_id: String,
    /// The accepted proposal this transaction came from, if any.
    /// Absent for transactions created by direct meetup scheduling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_request_id: Option<String>,
    pub status: TransactionStatus,
    pub buyer_confirmed: bool,
    pub seller_confirmed: bool,
    pub buyer_cancel_confirmed: bool,
    pub seller_cancel_confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meetup_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meetup_place: Option<String>,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl Transaction {
    /// Create a new in-progress transaction
    pub fn new(
        item_id: impl Into<String>,
        conversation_id: impl Into<String>,
        buyer_id: impl Into<String>,
        seller_id: impl Into<String>,
        buy_request_id: Option<String>,
        meetup: Option<MeetupInfo>,
    ) -> Self {
        let (meetup_time, meetup_place) = match meetup {
            Some(m) => (Some(m.time), Some(m.place)),
            None => (None, None),
        };
        Self {
            id: new_id(),
            item_id: item_id.into(),
            buyer_id: buyer_id.into(),
            seller_id: seller_id.into(),
            conversation_id: conversation_id.into(),
            buy_request_id,
            status: TransactionStatus::InProgress,
            buyer_confirmed: false,
            seller_confirmed: false,
            buyer_cancel_confirmed: false,
            seller_cancel_confirmed: false,
            meetup_time,
            meetup_place,
            created_at: now_millis(),
            completed_at: None,
        }
    }

    /// Resolve a user id to its role, `None` for non-participants
    pub fn role_of(&self, user_id: &str) -> Option<ParticipantRole> {
        if self.buyer_id == user_id {
            Some(ParticipantRole::Buyer)
        } else if self.seller_id == user_id {
            Some(ParticipantRole::Seller)
        } else {
            None
        }
    }

    /// Whether `user_id` is one of the two participants
    pub fn involves(&self, user_id: &str) -> bool {
        self.role_of(user_id).is_some()
    }

    /// A transaction is live while it has not reached a terminal state
    pub fn is_live(&self) -> bool {
        self.status == TransactionStatus::InProgress
    }

    /// 2-of-2 completion quorum
    pub fn completion_quorum(&self) -> bool {
        self.buyer_confirmed && self.seller_confirmed
    }

    /// 2-of-2 cancellation quorum
    pub fn cancellation_quorum(&self) -> bool {
        self.buyer_cancel_confirmed && self.seller_cancel_confirmed
    }

    /// Read the completion flag for a role
    pub fn confirmed_by(&self, role: ParticipantRole) -> bool {
        match role {
            ParticipantRole::Buyer => self.buyer_confirmed,
            ParticipantRole::Seller => self.seller_confirmed,
        }
    }

    /// Read the cancellation flag for a role
    pub fn cancel_confirmed_by(&self, role: ParticipantRole) -> bool {
        match role {
            ParticipantRole::Buyer => self.buyer_cancel_confirmed,
            ParticipantRole::Seller => self.seller_cancel_confirmed,
        }
    }

    /// Reviewing gate: a participant may review the other party only
    /// once the transaction has completed.
    pub fn review_allowed(&self, user_id: &str) -> bool {
        self.status == TransactionStatus::Completed && self.involves(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx() -> Transaction {
        Transaction::new("item-1", "conv-1", "buyer-1", "seller-1", None, None)
    }

    #[test]
    fn new_transaction_is_in_progress_with_clear_flags() {
        let t = tx();
        assert_eq!(t.status, TransactionStatus::InProgress);
        assert!(t.is_live());
        assert!(!t.buyer_confirmed);
        assert!(!t.seller_confirmed);
        assert!(!t.buyer_cancel_confirmed);
        assert!(!t.seller_cancel_confirmed);
        assert!(t.completed_at.is_none());
    }

    #[test]
    fn quorum_requires_both_flags() {
        let mut t = tx();
        assert!(!t.completion_quorum());
        t.buyer_confirmed = true;
        assert!(!t.completion_quorum());
        t.seller_confirmed = true;
        assert!(t.completion_quorum());
    }

    #[test]
    fn cancellation_quorum_is_independent_of_completion_flags() {
        let mut t = tx();
        t.buyer_confirmed = true;
        t.seller_cancel_confirmed = true;
        assert!(!t.completion_quorum());
        assert!(!t.cancellation_quorum());
        t.buyer_cancel_confirmed = true;
        assert!(t.cancellation_quorum());
    }

    #[test]
    fn role_resolution() {
        let t = tx();
        assert_eq!(t.role_of("buyer-1"), Some(ParticipantRole::Buyer));
        assert_eq!(t.role_of("seller-1"), Some(ParticipantRole::Seller));
        assert_eq!(t.role_of("stranger"), None);
    }

    #[test]
    fn review_gated_on_completion() {
        let mut t = tx();
        assert!(!t.review_allowed("buyer-1"));
        t.status = TransactionStatus::Completed;
        assert!(t.review_allowed("buyer-1"));
        assert!(t.review_allowed("seller-1"));
        assert!(!t.review_allowed("stranger"));
    }

    #[test]
    fn meetup_carried_through_constructor() {
        let t = Transaction::new(
            "item-1",
            "conv-1",
            "b",
            "s",
            Some("req-1".to_string()),
            Some(MeetupInfo {
                time: 1_700_000_000_000,
                place: "Plaza Mayor".to_string(),
            }),
        );
        assert_eq!(t.meetup_time, Some(1_700_000_000_000));
        assert_eq!(t.meetup_place.as_deref(), Some("Plaza Mayor"));
        assert_eq!(t.buy_request_id.as_deref(), Some("req-1"));
    }
}
