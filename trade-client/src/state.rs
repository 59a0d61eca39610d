//! Locally-held client state

use std::collections::{HashMap, HashSet};

use shared::trade::{BuyRequest, ChatMessage, Transaction};

/// Kind tag for entity references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    BuyRequest,
    Transaction,
}

/// Pointer to an entity that must be re-fetched from the server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

/// The client's local view of conversations and trades
///
/// Mutated only through [`crate::reconciler::apply`], the optimistic
/// helpers below, and fetch resolution. Plain collections, no interior
/// mutability: one owner drives the merge loop.
#[derive(Debug, Default)]
pub struct ClientState {
    /// Conversation currently on screen, if any
    active_conversation: Option<String>,
    /// conversation_id -> messages in arrival order
    messages: HashMap<String, Vec<ChatMessage>>,
    /// Every message id ever applied (dedup set)
    seen_message_ids: HashSet<String>,
    buy_requests: HashMap<String, BuyRequest>,
    transactions: HashMap<String, Transaction>,
    /// entity id -> highest applied event sequence
    applied_sequence: HashMap<String, u64>,
    /// conversation_id -> unread/background activity count
    unread: HashMap<String, u32>,
    /// Entities mutated locally ahead of server confirmation
    optimistic: HashSet<String>,
    /// Entities queued for authoritative re-fetch
    pending_fetch: HashSet<EntityRef>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Foreground ==========

    pub fn set_active_conversation(&mut self, conversation_id: Option<String>) {
        if let Some(conv) = &conversation_id {
            self.unread.remove(conv);
        }
        self.active_conversation = conversation_id;
    }

    pub fn active_conversation(&self) -> Option<&str> {
        self.active_conversation.as_deref()
    }

    // ========== Reads ==========

    pub fn messages(&self, conversation_id: &str) -> &[ChatMessage] {
        self.messages
            .get(conversation_id)
            .map(|m| m.as_slice())
            .unwrap_or(&[])
    }

    pub fn unread(&self, conversation_id: &str) -> u32 {
        self.unread.get(conversation_id).copied().unwrap_or(0)
    }

    pub fn buy_request(&self, id: &str) -> Option<&BuyRequest> {
        self.buy_requests.get(id)
    }

    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.get(id)
    }

    pub fn is_optimistic(&self, entity_id: &str) -> bool {
        self.optimistic.contains(entity_id)
    }

    pub fn has_pending_fetches(&self) -> bool {
        !self.pending_fetch.is_empty()
    }

    // ========== Optimistic updates ==========

    /// Record a locally-assumed transaction state (e.g. a just-sent
    /// confirm) ahead of the authoritative event. The next
    /// authoritative write for the same id supersedes it.
    pub fn apply_optimistic_transaction(&mut self, transaction: Transaction) {
        self.optimistic.insert(transaction.id.clone());
        self.transactions
            .insert(transaction.id.clone(), transaction);
    }

    /// Same for a buy request
    pub fn apply_optimistic_buy_request(&mut self, request: BuyRequest) {
        self.optimistic.insert(request.id.clone());
        self.buy_requests.insert(request.id.clone(), request);
    }

    // ========== Reconciler internals ==========

    pub(crate) fn message_seen(&self, message_id: &str) -> bool {
        self.seen_message_ids.contains(message_id)
    }

    pub(crate) fn push_message(&mut self, message: ChatMessage) {
        self.seen_message_ids.insert(message.id.clone());
        self.messages
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message);
    }

    pub(crate) fn bump_unread(&mut self, conversation_id: &str) {
        *self.unread.entry(conversation_id.to_string()).or_insert(0) += 1;
    }

    pub(crate) fn sequence_gate(&mut self, entity_id: &str, sequence: u64) -> bool {
        let last = self.applied_sequence.get(entity_id).copied().unwrap_or(0);
        if sequence <= last {
            return false;
        }
        self.applied_sequence
            .insert(entity_id.to_string(), sequence);
        true
    }

    pub(crate) fn knows_entity(&self, entity_ref: &EntityRef) -> bool {
        match entity_ref.kind {
            EntityKind::BuyRequest => self.buy_requests.contains_key(&entity_ref.id),
            EntityKind::Transaction => self.transactions.contains_key(&entity_ref.id),
        }
    }

    pub(crate) fn mark_for_fetch(&mut self, entity_ref: EntityRef) {
        self.pending_fetch.insert(entity_ref);
    }

    /// Drain the set of entities queued for re-fetch
    pub fn take_pending_fetches(&mut self) -> Vec<EntityRef> {
        self.pending_fetch.drain().collect()
    }

    /// Authoritative upsert: clears any optimistic marker for the id
    pub fn upsert_buy_request(&mut self, request: BuyRequest) {
        self.optimistic.remove(&request.id);
        self.buy_requests.insert(request.id.clone(), request);
    }

    /// Authoritative upsert: clears any optimistic marker for the id
    pub fn upsert_transaction(&mut self, transaction: Transaction) {
        self.optimistic.remove(&transaction.id);
        self.transactions
            .insert(transaction.id.clone(), transaction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activating_a_conversation_clears_its_unread_count() {
        let mut state = ClientState::new();
        state.bump_unread("conv-1");
        state.bump_unread("conv-1");
        assert_eq!(state.unread("conv-1"), 2);

        state.set_active_conversation(Some("conv-1".to_string()));
        assert_eq!(state.unread("conv-1"), 0);
    }

    #[test]
    fn sequence_gate_rejects_non_increasing() {
        let mut state = ClientState::new();
        assert!(state.sequence_gate("tx-1", 3));
        assert!(!state.sequence_gate("tx-1", 3));
        assert!(!state.sequence_gate("tx-1", 2));
        assert!(state.sequence_gate("tx-1", 4));
        // Independent per entity
        assert!(state.sequence_gate("tx-2", 1));
    }

    #[test]
    fn authoritative_upsert_clears_optimistic_marker() {
        let mut state = ClientState::new();
        let tx = Transaction::new("item-1", "conv-1", "b", "s", None, None);
        state.apply_optimistic_transaction(tx.clone());
        assert!(state.is_optimistic(&tx.id));

        state.upsert_transaction(tx.clone());
        assert!(!state.is_optimistic(&tx.id));
    }
}
