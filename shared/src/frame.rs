//! Duplex wire frames for the push channel
//!
//! Server -> client frames are `{type, ...}` JSON; the `Event` variant
//! wraps the four push event types. Client -> server frames mirror the
//! REST action surface so a connected client can drive the protocol
//! without a second round-trip channel.

use serde::{Deserialize, Serialize};

use crate::event::EventType;

/// Frames sent from the server to a connected session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Sent once after a successful connect. `epoch` changes on every
    /// server restart; a client seeing a new epoch must re-fetch.
    Ready {
        epoch: String,
        user_id: String,
        session_id: String,
    },
    /// A domain state-change notification
    Event {
        event_type: EventType,
        sequence: u64,
        data: serde_json::Value,
    },
    /// Outcome of a client action frame
    ActionResult {
        action_id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    /// Protocol-level error (malformed frame, etc.)
    Error { message: String },
}

/// Frames sent from a client session to the server
///
/// `action_id` is a client-generated correlation id echoed back in the
/// matching [`ServerFrame::ActionResult`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Propose {
        action_id: String,
        item_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
    },
    AcceptProposal {
        action_id: String,
        request_id: String,
    },
    RejectProposal {
        action_id: String,
        request_id: String,
    },
    CancelProposal {
        action_id: String,
        request_id: String,
    },
    SetMeetup {
        action_id: String,
        transaction_id: String,
        time: i64,
        place: String,
    },
    ConfirmCompletion {
        action_id: String,
        transaction_id: String,
    },
    ConfirmCancellation {
        action_id: String,
        transaction_id: String,
    },
    /// Keepalive; resets the server-side idle window
    Ping,
}
