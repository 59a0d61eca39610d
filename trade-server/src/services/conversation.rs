//! Conversation store collaborator
//!
//! Supplies conversation identity for a (buyer, seller, item) triple
//! and accepts system messages emitted on trade transitions. The
//! durable thread itself is owned elsewhere; this core only needs the
//! two calls below.

use async_trait::async_trait;
use dashmap::DashMap;
use shared::trade::ChatMessage;
use shared::util::new_id;

use super::ServiceError;

/// A durable two-party conversation thread tied to one item
#[derive(Debug, Clone)]
pub struct ConversationRecord {
    pub id: String,
    pub participant_a: String,
    pub participant_b: String,
    pub item_id: String,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Resolve the conversation for a participant pair and item,
    /// creating it if none exists yet.
    async fn resolve_or_create(
        &self,
        participant_a: &str,
        participant_b: &str,
        item_id: &str,
    ) -> Result<String, ServiceError>;

    /// Append a server-generated system message to a conversation
    async fn append_system_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<ChatMessage, ServiceError>;

    /// Participants of a conversation, if it exists
    async fn participants(&self, conversation_id: &str)
    -> Result<(String, String), ServiceError>;
}

/// In-process conversation store
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    /// conversation_id -> record
    conversations: DashMap<String, ConversationRecord>,
    /// conversation_id -> messages in append order
    messages: DashMap<String, Vec<ChatMessage>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical key for a pair + item, order-independent
    fn pair_key(a: &str, b: &str, item_id: &str) -> String {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        format!("{lo}:{hi}:{item_id}")
    }

    /// Messages of a conversation (test/demo helper)
    pub fn messages(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.messages
            .get(conversation_id)
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn resolve_or_create(
        &self,
        participant_a: &str,
        participant_b: &str,
        item_id: &str,
    ) -> Result<String, ServiceError> {
        let key = Self::pair_key(participant_a, participant_b, item_id);

        // Existing thread for this pair + item wins
        if let Some(existing) = self
            .conversations
            .iter()
            .find(|c| Self::pair_key(&c.participant_a, &c.participant_b, &c.item_id) == key)
        {
            return Ok(existing.id.clone());
        }

        let record = ConversationRecord {
            id: new_id(),
            participant_a: participant_a.to_string(),
            participant_b: participant_b.to_string(),
            item_id: item_id.to_string(),
        };
        let id = record.id.clone();
        self.conversations.insert(id.clone(), record);
        tracing::debug!(conversation_id = %id, item_id, "Conversation created");
        Ok(id)
    }

    async fn append_system_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<ChatMessage, ServiceError> {
        if !self.conversations.contains_key(conversation_id) {
            return Err(ServiceError::UnknownConversation(
                conversation_id.to_string(),
            ));
        }
        let message = ChatMessage::system(conversation_id, text);
        self.messages
            .entry(conversation_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn participants(
        &self,
        conversation_id: &str,
    ) -> Result<(String, String), ServiceError> {
        self.conversations
            .get(conversation_id)
            .map(|c| (c.participant_a.clone(), c.participant_b.clone()))
            .ok_or_else(|| ServiceError::UnknownConversation(conversation_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_is_stable_per_pair_and_item() {
        let store = InMemoryConversationStore::new();
        let c1 = store.resolve_or_create("alice", "bob", "item-1").await.unwrap();
        let c2 = store.resolve_or_create("bob", "alice", "item-1").await.unwrap();
        let c3 = store.resolve_or_create("alice", "bob", "item-2").await.unwrap();

        assert_eq!(c1, c2);
        assert_ne!(c1, c3);
    }

    #[tokio::test]
    async fn system_messages_append_in_order() {
        let store = InMemoryConversationStore::new();
        let conv = store.resolve_or_create("alice", "bob", "item-1").await.unwrap();

        store.append_system_message(&conv, "first").await.unwrap();
        store.append_system_message(&conv, "second").await.unwrap();

        let messages = store.messages(&conv);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].body, "first");
        assert_eq!(messages[1].body, "second");
    }

    #[tokio::test]
    async fn append_to_unknown_conversation_fails() {
        let store = InMemoryConversationStore::new();
        let result = store.append_system_message("nope", "hello").await;
        assert!(matches!(result, Err(ServiceError::UnknownConversation(_))));
    }
}
