//! Conversation message model

use serde::{Deserialize, Serialize};

use crate::util::{new_id, now_millis};

/// Who produced a conversation line
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Written by a participant
    User,
    /// Emitted by the server on trade transitions
    System,
}

/// One line in a two-party conversation thread
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub kind: MessageKind,
    /// Absent for system messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    pub body: String,
    pub sent_at: i64,
}

impl ChatMessage {
    pub fn user(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            conversation_id: conversation_id.into(),
            kind: MessageKind::User,
            sender_id: Some(sender_id.into()),
            body: body.into(),
            sent_at: now_millis(),
        }
    }

    pub fn system(conversation_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            conversation_id: conversation_id.into(),
            kind: MessageKind::System,
            sender_id: None,
            body: body.into(),
            sent_at: now_millis(),
        }
    }
}
