//! Push event envelope
//!
//! Events are ephemeral notifications fanned out to the connected
//! sessions of both trade participants. They are never persisted: a
//! dropped event is recovered by re-fetching the entity over HTTP, so
//! the payload always carries the full entity snapshot, and a per-event
//! sequence number lets receivers discard stale or duplicate delivery.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::trade::{BuyRequest, ChatMessage, Transaction};

/// Push event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    MessageCreated,
    BuyRequestUpdated,
    TransactionCreated,
    TransactionUpdated,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::MessageCreated => write!(f, "message_created"),
            EventType::BuyRequestUpdated => write!(f, "buy_request_updated"),
            EventType::TransactionCreated => write!(f, "transaction_created"),
            EventType::TransactionUpdated => write!(f, "transaction_updated"),
        }
    }
}

/// A state-change notification addressed to both participants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushEvent {
    pub event_type: EventType,
    /// Server-side commit order stamp. Strictly increasing across the
    /// server process; receivers drop events at or below the last
    /// sequence they applied for the same entity id.
    pub sequence: u64,
    /// Users whose sessions should receive this event
    pub target_user_ids: Vec<String>,
    /// Full entity snapshot as JSON
    pub payload: serde_json::Value,
}

impl PushEvent {
    pub fn message_created(message: &ChatMessage, targets: Vec<String>, sequence: u64) -> Self {
        Self {
            event_type: EventType::MessageCreated,
            sequence,
            target_user_ids: targets,
            payload: serde_json::to_value(message).expect("Failed to serialize chat message"),
        }
    }

    pub fn buy_request_updated(request: &BuyRequest, sequence: u64) -> Self {
        Self {
            event_type: EventType::BuyRequestUpdated,
            sequence,
            target_user_ids: vec![request.buyer_id.clone(), request.seller_id.clone()],
            payload: serde_json::to_value(request).expect("Failed to serialize buy request"),
        }
    }

    pub fn transaction_created(transaction: &Transaction, sequence: u64) -> Self {
        Self::transaction_event(EventType::TransactionCreated, transaction, sequence)
    }

    pub fn transaction_updated(transaction: &Transaction, sequence: u64) -> Self {
        Self::transaction_event(EventType::TransactionUpdated, transaction, sequence)
    }

    fn transaction_event(event_type: EventType, transaction: &Transaction, sequence: u64) -> Self {
        Self {
            event_type,
            sequence,
            target_user_ids: vec![
                transaction.buyer_id.clone(),
                transaction.seller_id.clone(),
            ],
            payload: serde_json::to_value(transaction).expect("Failed to serialize transaction"),
        }
    }

    /// Parse the payload as a concrete entity type
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
