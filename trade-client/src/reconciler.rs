//! Event reconciliation
//!
//! [`apply`] merges one authoritative push event into local state and
//! reports what happened. It is a pure function of (state, event):
//! no I/O, no scheduling, safe to drive from any event loop. Duplicate
//! and out-of-order delivery degrade to no-ops, never to corruption.

use shared::event::{EventType, PushEvent};
use shared::trade::{BuyRequest, ChatMessage, Transaction};

use crate::state::{ClientState, EntityKind, EntityRef};

/// Outcome of merging one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Applied to state relevant to the active conversation
    Applied,
    /// Applied to background state (counters, summaries) only
    Background,
    /// Message id already present locally; nothing changed
    Duplicate,
    /// Event sequence at or below the last applied one for this entity
    Stale,
    /// Payload was not a full snapshot; entity queued for re-fetch
    NeedsFetch(EntityRef),
    /// Payload unusable and carrying no entity id; dropped
    Ignored,
}

/// Merge an incoming event into local state
pub fn apply(state: &mut ClientState, event: &PushEvent) -> ApplyOutcome {
    match event.event_type {
        EventType::MessageCreated => apply_message(state, event),
        EventType::BuyRequestUpdated => apply_buy_request(state, event),
        EventType::TransactionCreated | EventType::TransactionUpdated => {
            apply_transaction(state, event)
        }
    }
}

fn apply_message(state: &mut ClientState, event: &PushEvent) -> ApplyOutcome {
    let message: ChatMessage = match event.parse_payload() {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping undecodable message event");
            return ApplyOutcome::Ignored;
        }
    };

    // Id-based dedup, not position-based: replays are no-ops
    if state.message_seen(&message.id) {
        return ApplyOutcome::Duplicate;
    }

    let conversation_id = message.conversation_id.clone();
    state.push_message(message);

    if state.active_conversation() == Some(conversation_id.as_str()) {
        ApplyOutcome::Applied
    } else {
        state.bump_unread(&conversation_id);
        ApplyOutcome::Background
    }
}

fn apply_buy_request(state: &mut ClientState, event: &PushEvent) -> ApplyOutcome {
    match event.parse_payload::<BuyRequest>() {
        Ok(request) => {
            if !state.sequence_gate(&request.id, event.sequence) {
                return ApplyOutcome::Stale;
            }
            let foreground =
                state.active_conversation() == Some(request.conversation_id.as_str());
            // Last authoritative write wins, keyed by entity id
            state.upsert_buy_request(request);
            if foreground {
                ApplyOutcome::Applied
            } else {
                ApplyOutcome::Background
            }
        }
        Err(_) => partial_payload(state, event, EntityKind::BuyRequest),
    }
}

fn apply_transaction(state: &mut ClientState, event: &PushEvent) -> ApplyOutcome {
    match event.parse_payload::<Transaction>() {
        Ok(transaction) => {
            if !state.sequence_gate(&transaction.id, event.sequence) {
                return ApplyOutcome::Stale;
            }
            let foreground =
                state.active_conversation() == Some(transaction.conversation_id.as_str());
            state.upsert_transaction(transaction);
            if foreground {
                ApplyOutcome::Applied
            } else {
                ApplyOutcome::Background
            }
        }
        Err(_) => partial_payload(state, event, EntityKind::Transaction),
    }
}

/// A payload that does not decode as a full snapshot is only trusted
/// as a pointer: the entity is queued for an authoritative re-fetch
/// instead of being constructed from partial data.
fn partial_payload(state: &mut ClientState, event: &PushEvent, kind: EntityKind) -> ApplyOutcome {
    let Some(id) = event.payload.get("id").and_then(|v| v.as_str()) else {
        tracing::warn!(event_type = %event.event_type, "Dropping partial event without entity id");
        return ApplyOutcome::Ignored;
    };
    let entity_ref = EntityRef {
        kind,
        id: id.to_string(),
    };
    if state.knows_entity(&entity_ref) {
        tracing::debug!(id, "Partial payload for known entity, queueing re-fetch");
    }
    state.mark_for_fetch(entity_ref.clone());
    ApplyOutcome::NeedsFetch(entity_ref)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::trade::{BuyRequestStatus, TransactionStatus};

    fn message_event(conversation: &str, seq: u64) -> (ChatMessage, PushEvent) {
        let msg = ChatMessage::system(conversation, "hello");
        let event = PushEvent::message_created(
            &msg,
            vec!["b".to_string(), "s".to_string()],
            seq,
        );
        (msg, event)
    }

    #[test]
    fn replayed_message_event_applies_once() {
        let mut state = ClientState::new();
        state.set_active_conversation(Some("conv-1".to_string()));
        let (_, event) = message_event("conv-1", 1);

        assert_eq!(apply(&mut state, &event), ApplyOutcome::Applied);
        assert_eq!(apply(&mut state, &event), ApplyOutcome::Duplicate);
        assert_eq!(state.messages("conv-1").len(), 1);
    }

    #[test]
    fn messages_for_inactive_conversations_go_to_background() {
        let mut state = ClientState::new();
        state.set_active_conversation(Some("conv-1".to_string()));
        let (_, event) = message_event("conv-2", 1);

        assert_eq!(apply(&mut state, &event), ApplyOutcome::Background);
        assert_eq!(state.unread("conv-2"), 1);
        // Still stored, just not foregrounded
        assert_eq!(state.messages("conv-2").len(), 1);
    }

    #[test]
    fn full_snapshot_creates_unknown_entity_without_fetch() {
        let mut state = ClientState::new();
        let tx = Transaction::new("item-1", "conv-1", "b", "s", None, None);
        let event = PushEvent::transaction_created(&tx, 1);

        assert_eq!(apply(&mut state, &event), ApplyOutcome::Background);
        assert!(state.transaction(&tx.id).is_some());
        assert!(!state.has_pending_fetches());
    }

    #[test]
    fn stale_sequence_is_skipped() {
        let mut state = ClientState::new();
        let mut tx = Transaction::new("item-1", "conv-1", "b", "s", None, None);
        tx.buyer_confirmed = true;
        let newer = PushEvent::transaction_updated(&tx, 5);
        assert_eq!(apply(&mut state, &newer), ApplyOutcome::Background);

        // An older snapshot arriving late must not roll state back
        let mut old_tx = tx.clone();
        old_tx.buyer_confirmed = false;
        let older = PushEvent::transaction_updated(&old_tx, 4);
        assert_eq!(apply(&mut state, &older), ApplyOutcome::Stale);
        assert!(state.transaction(&tx.id).unwrap().buyer_confirmed);
    }

    #[test]
    fn authoritative_event_supersedes_optimistic_state() {
        let mut state = ClientState::new();
        let mut tx = Transaction::new("item-1", "conv-1", "b", "s", None, None);

        // Client optimistically assumes its confirm landed
        let mut optimistic = tx.clone();
        optimistic.buyer_confirmed = true;
        state.apply_optimistic_transaction(optimistic);
        assert!(state.is_optimistic(&tx.id));

        // Authoritative event says both confirmed and completed
        tx.buyer_confirmed = true;
        tx.seller_confirmed = true;
        tx.status = TransactionStatus::Completed;
        let event = PushEvent::transaction_updated(&tx, 9);
        apply(&mut state, &event);

        let merged = state.transaction(&tx.id).unwrap();
        assert_eq!(merged.status, TransactionStatus::Completed);
        assert!(!state.is_optimistic(&tx.id));
    }

    #[test]
    fn partial_payload_for_unknown_entity_queues_fetch() {
        let mut state = ClientState::new();
        let event = PushEvent {
            event_type: EventType::TransactionUpdated,
            sequence: 2,
            target_user_ids: vec!["b".to_string()],
            payload: serde_json::json!({ "id": "tx-9" }),
        };

        match apply(&mut state, &event) {
            ApplyOutcome::NeedsFetch(entity_ref) => {
                assert_eq!(entity_ref.kind, EntityKind::Transaction);
                assert_eq!(entity_ref.id, "tx-9");
            }
            other => panic!("Expected NeedsFetch, got {other:?}"),
        }
        assert!(state.transaction("tx-9").is_none());
        assert!(state.has_pending_fetches());
    }

    #[test]
    fn partial_payload_without_id_is_dropped() {
        let mut state = ClientState::new();
        let event = PushEvent {
            event_type: EventType::BuyRequestUpdated,
            sequence: 2,
            target_user_ids: vec![],
            payload: serde_json::json!({ "status": "ACCEPTED" }),
        };
        assert_eq!(apply(&mut state, &event), ApplyOutcome::Ignored);
    }

    #[test]
    fn buy_request_snapshot_applies_by_id() {
        let mut state = ClientState::new();
        state.set_active_conversation(Some("conv-1".to_string()));

        let mut req = BuyRequest::new("item-1", "b", "s", "conv-1");
        let created = PushEvent::buy_request_updated(&req, 1);
        assert_eq!(apply(&mut state, &created), ApplyOutcome::Applied);

        req.status = BuyRequestStatus::Accepted;
        let updated = PushEvent::buy_request_updated(&req, 2);
        assert_eq!(apply(&mut state, &updated), ApplyOutcome::Applied);

        assert_eq!(
            state.buy_request(&req.id).unwrap().status,
            BuyRequestStatus::Accepted
        );
    }
}
