//! Event bus - server-side fan-out of domain state changes
//!
//! # Architecture
//!
//! ```text
//! ProposalEngine / TransactionEngine
//!        │ publish(PushEvent)
//!        ▼
//!    EventBus ──▶ SessionRegistry (user_id -> live sessions)
//!        │
//!        ├──▶ session queue (bounded, drop-oldest) ──▶ gateway pump ──▶ socket
//!        └──▶ session queue ──▶ ...
//! ```
//!
//! Delivery is at-least-once toward connected sessions: a full queue
//! sheds its oldest frames and a dead session is skipped, both logged
//! and never surfaced to the action-initiating caller. Clients recover
//! by re-fetching the mutated entity over HTTP.

mod registry;

pub use registry::{SessionHandle, SessionRegistry};

use std::sync::Arc;

use shared::event::PushEvent;
use shared::frame::ServerFrame;

/// Fan-out of push events to the sessions of the targeted users
#[derive(Debug, Clone)]
pub struct EventBus {
    registry: Arc<SessionRegistry>,
}

impl EventBus {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Deliver an event to every live session of every target user.
    ///
    /// Non-blocking: enqueueing either succeeds or is dropped. Must not
    /// be called while an entity lock is held; the engines publish
    /// after their critical section.
    pub fn publish(&self, event: PushEvent) {
        let frame = ServerFrame::Event {
            event_type: event.event_type,
            sequence: event.sequence,
            data: event.payload.clone(),
        };

        let mut delivered = 0usize;
        let mut dead = 0usize;
        for user_id in &event.target_user_ids {
            for session in self.registry.sessions_of(user_id) {
                if session.enqueue(frame.clone()) {
                    delivered += 1;
                } else {
                    dead += 1;
                }
            }
        }

        if dead > 0 {
            tracing::warn!(
                event_type = %event.event_type,
                sequence = event.sequence,
                dead,
                "Dropped event for dead sessions"
            );
        }
        tracing::debug!(
            event_type = %event.event_type,
            sequence = event.sequence,
            targets = event.target_user_ids.len(),
            delivered,
            "Event published"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::trade::Transaction;

    #[tokio::test]
    async fn publish_targets_only_listed_users() {
        let registry = Arc::new(SessionRegistry::new(8));
        let bus = EventBus::new(registry.clone());

        let (_hb, mut rx_buyer) = registry.register("buyer-1");
        let (_hs, mut rx_seller) = registry.register("seller-1");
        let (_ho, mut rx_other) = registry.register("bystander");

        let tx = Transaction::new("item-1", "conv-1", "buyer-1", "seller-1", None, None);
        bus.publish(PushEvent::transaction_created(&tx, 1));

        assert!(rx_buyer.try_recv().is_ok());
        assert!(rx_seller.try_recv().is_ok());
        assert!(rx_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_with_no_connected_sessions_is_a_noop() {
        let registry = Arc::new(SessionRegistry::new(8));
        let bus = EventBus::new(registry);

        let tx = Transaction::new("item-1", "conv-1", "b", "s", None, None);
        // No panic, no error surfaced
        bus.publish(PushEvent::transaction_created(&tx, 1));
    }

    #[tokio::test]
    async fn multiple_sessions_per_user_all_receive() {
        let registry = Arc::new(SessionRegistry::new(8));
        let bus = EventBus::new(registry.clone());

        let (_h1, mut rx1) = registry.register("buyer-1");
        let (_h2, mut rx2) = registry.register("buyer-1");

        let tx = Transaction::new("item-1", "conv-1", "buyer-1", "seller-1", None, None);
        bus.publish(PushEvent::transaction_updated(&tx, 2));

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }
}
