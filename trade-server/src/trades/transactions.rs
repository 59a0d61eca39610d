//! Transaction engine - the dual-confirmation state machine
//!
//! Owns every write to Transaction records. Completion and cancellation
//! are each gated on a 2-of-2 quorum evaluated after every confirmation
//! write, inside the entity critical section, so two concurrent
//! confirmations produce exactly one terminal transition and exactly
//! one catalog side effect.

use std::sync::Arc;

use shared::event::PushEvent;
use shared::trade::{MeetupInfo, ParticipantRole, Transaction};
use shared::util::now_millis;

use crate::bus::EventBus;
use crate::services::{Catalog, ConversationStore, ItemStatus};
use crate::trades::store::{EntityLocks, EventSequencer, TradeStore};
use crate::trades::TradeError;

#[derive(Clone)]
pub struct TransactionEngine {
    store: Arc<TradeStore>,
    locks: Arc<EntityLocks>,
    sequencer: Arc<EventSequencer>,
    bus: EventBus,
    conversations: Arc<dyn ConversationStore>,
    catalog: Arc<dyn Catalog>,
}

impl TransactionEngine {
    pub fn new(
        store: Arc<TradeStore>,
        locks: Arc<EntityLocks>,
        sequencer: Arc<EventSequencer>,
        bus: EventBus,
        conversations: Arc<dyn ConversationStore>,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        Self {
            store,
            locks,
            sequencer,
            bus,
            conversations,
            catalog,
        }
    }

    /// Create an in-progress transaction directly, without a prior
    /// proposal (meetup scheduled straight from the conversation).
    ///
    /// Fails with `Conflict` if a live transaction already exists for
    /// (conversation, item).
    pub async fn create(
        &self,
        item_id: &str,
        conversation_id: &str,
        buyer_id: &str,
        seller_id: &str,
        meetup: Option<MeetupInfo>,
    ) -> Result<Transaction, TradeError> {
        if buyer_id == seller_id {
            return Err(TradeError::Validation(
                "Buyer and seller must be different users".to_string(),
            ));
        }

        let (transaction, sequence) = {
            let _guard = self
                .locks
                .acquire(&format!("transaction:{conversation_id}:{item_id}"))
                .await;

            if self
                .store
                .live_transaction_for(conversation_id, item_id)
                .is_some()
            {
                return Err(TradeError::Conflict(
                    "A live transaction already exists for this item in this conversation"
                        .to_string(),
                ));
            }

            let transaction = Transaction::new(
                item_id,
                conversation_id,
                buyer_id,
                seller_id,
                None,
                meetup,
            );
            self.store.put_transaction(transaction.clone());
            (transaction, self.sequencer.next())
        };

        tracing::info!(
            transaction_id = %transaction.id,
            item_id,
            conversation_id,
            "Transaction created"
        );

        self.bus
            .publish(PushEvent::transaction_created(&transaction, sequence));
        self.notify_conversation(&transaction, "A meetup was scheduled for this item")
            .await;

        Ok(transaction)
    }

    /// Set or edit the meetup details (either participant, in-progress only)
    pub async fn set_meetup(
        &self,
        transaction_id: &str,
        actor_id: &str,
        time: i64,
        place: &str,
    ) -> Result<Transaction, TradeError> {
        let (transaction, sequence) = {
            let _guard = self
                .locks
                .acquire(&format!("transaction:{transaction_id}"))
                .await;

            let mut transaction = self.load(transaction_id)?;
            transaction.role_of(actor_id).ok_or_else(|| {
                TradeError::Authorization(
                    "Only participants may update the meetup".to_string(),
                )
            })?;

            if !transaction.is_live() {
                return Err(TradeError::State(format!(
                    "Transaction is {:?}, meetup can only be edited while in progress",
                    transaction.status
                )));
            }

            transaction.meetup_time = Some(time);
            transaction.meetup_place = Some(place.to_string());
            self.store.put_transaction(transaction.clone());
            (transaction, self.sequencer.next())
        };

        self.bus
            .publish(PushEvent::transaction_updated(&transaction, sequence));
        Ok(transaction)
    }

    /// Record a completion confirmation from one participant.
    ///
    /// Idempotent per actor: a repeated confirmation is a no-op, even
    /// after the quorum already completed the transaction. On reaching
    /// quorum the item is flipped to sold in the catalog, best-effort.
    pub async fn confirm_completion(
        &self,
        transaction_id: &str,
        actor_id: &str,
    ) -> Result<Transaction, TradeError> {
        let (transaction, sequence, completed_now) = {
            let _guard = self
                .locks
                .acquire(&format!("transaction:{transaction_id}"))
                .await;

            let mut transaction = self.load(transaction_id)?;
            let role = transaction.role_of(actor_id).ok_or_else(|| {
                TradeError::Authorization(
                    "Only participants may confirm completion".to_string(),
                )
            })?;

            if transaction.confirmed_by(role) {
                // Repeat of an already-recorded confirmation
                return Ok(transaction);
            }
            if !transaction.is_live() {
                return Err(TradeError::State(format!(
                    "Transaction is {:?}, no further confirmation is accepted",
                    transaction.status
                )));
            }

            match role {
                ParticipantRole::Buyer => transaction.buyer_confirmed = true,
                ParticipantRole::Seller => transaction.seller_confirmed = true,
            }

            let mut completed_now = false;
            if transaction.completion_quorum() {
                transaction.status = shared::trade::TransactionStatus::Completed;
                transaction.completed_at = Some(now_millis());
                completed_now = true;
            }
            self.store.put_transaction(transaction.clone());
            (transaction, self.sequencer.next(), completed_now)
        };

        self.bus
            .publish(PushEvent::transaction_updated(&transaction, sequence));

        if completed_now {
            tracing::info!(transaction_id = %transaction.id, "Transaction completed");
            // The completed status is authoritative; a failed catalog
            // update is logged and not rolled back.
            if let Err(e) = self
                .catalog
                .set_item_status(&transaction.item_id, ItemStatus::Sold)
                .await
            {
                tracing::warn!(
                    item_id = %transaction.item_id,
                    error = %e,
                    "Failed to mark item sold after completion"
                );
            }
            self.notify_conversation(&transaction, "Both parties confirmed, the trade is complete")
                .await;
        }

        Ok(transaction)
    }

    /// Record a cancellation confirmation from one participant.
    ///
    /// Symmetric to completion, using the cancel-confirmed pair; on
    /// quorum the item is flipped back to available.
    pub async fn confirm_cancellation(
        &self,
        transaction_id: &str,
        actor_id: &str,
    ) -> Result<Transaction, TradeError> {
        let (transaction, sequence, cancelled_now) = {
            let _guard = self
                .locks
                .acquire(&format!("transaction:{transaction_id}"))
                .await;

            let mut transaction = self.load(transaction_id)?;
            let role = transaction.role_of(actor_id).ok_or_else(|| {
                TradeError::Authorization(
                    "Only participants may confirm cancellation".to_string(),
                )
            })?;

            if transaction.cancel_confirmed_by(role) {
                return Ok(transaction);
            }
            if !transaction.is_live() {
                return Err(TradeError::State(format!(
                    "Transaction is {:?}, no further confirmation is accepted",
                    transaction.status
                )));
            }

            match role {
                ParticipantRole::Buyer => transaction.buyer_cancel_confirmed = true,
                ParticipantRole::Seller => transaction.seller_cancel_confirmed = true,
            }

            let mut cancelled_now = false;
            if transaction.cancellation_quorum() {
                transaction.status = shared::trade::TransactionStatus::Cancelled;
                cancelled_now = true;
            }
            self.store.put_transaction(transaction.clone());
            (transaction, self.sequencer.next(), cancelled_now)
        };

        self.bus
            .publish(PushEvent::transaction_updated(&transaction, sequence));

        if cancelled_now {
            tracing::info!(transaction_id = %transaction.id, "Transaction cancelled");
            if let Err(e) = self
                .catalog
                .set_item_status(&transaction.item_id, ItemStatus::Available)
                .await
            {
                tracing::warn!(
                    item_id = %transaction.item_id,
                    error = %e,
                    "Failed to restore item availability after cancellation"
                );
            }
            self.notify_conversation(&transaction, "Both parties confirmed, the trade was cancelled")
                .await;
        }

        Ok(transaction)
    }

    pub fn get(&self, transaction_id: &str) -> Option<Transaction> {
        self.store.get_transaction(transaction_id)
    }

    pub fn by_conversation(&self, conversation_id: &str) -> Vec<Transaction> {
        self.store.transactions_by_conversation(conversation_id)
    }

    fn load(&self, transaction_id: &str) -> Result<Transaction, TradeError> {
        self.store
            .get_transaction(transaction_id)
            .ok_or_else(|| TradeError::NotFound(format!("Transaction {transaction_id} not found")))
    }

    async fn notify_conversation(&self, transaction: &Transaction, text: &str) {
        match self
            .conversations
            .append_system_message(&transaction.conversation_id, text)
            .await
        {
            Ok(message) => {
                let sequence = self.sequencer.next();
                self.bus.publish(PushEvent::message_created(
                    &message,
                    vec![
                        transaction.buyer_id.clone(),
                        transaction.seller_id.clone(),
                    ],
                    sequence,
                ));
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = %transaction.conversation_id,
                    error = %e,
                    "Failed to append system message"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SessionRegistry;
    use crate::services::{InMemoryCatalog, InMemoryConversationStore, ServiceError};
    use async_trait::async_trait;
    use shared::trade::TransactionStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Catalog wrapper counting status updates, for side-effect assertions
    #[derive(Default)]
    struct CountingCatalog {
        inner: InMemoryCatalog,
        status_calls: AtomicUsize,
    }

    #[async_trait]
    impl Catalog for CountingCatalog {
        async fn get_item_owner(&self, item_id: &str) -> Result<Option<String>, ServiceError> {
            self.inner.get_item_owner(item_id).await
        }

        async fn set_item_status(
            &self,
            item_id: &str,
            status: ItemStatus,
        ) -> Result<(), ServiceError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.set_item_status(item_id, status).await
        }
    }

    struct Fixture {
        engine: TransactionEngine,
        catalog: Arc<CountingCatalog>,
        conversations: Arc<InMemoryConversationStore>,
        registry: Arc<SessionRegistry>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(TradeStore::new());
        let locks = Arc::new(EntityLocks::new());
        let sequencer = Arc::new(EventSequencer::new());
        let registry = Arc::new(SessionRegistry::new(32));
        let bus = EventBus::new(registry.clone());
        let conversations = Arc::new(InMemoryConversationStore::new());
        let catalog = Arc::new(CountingCatalog::default());
        catalog.inner.put_item("item-1", "seller-1");
        // Ensure the conversation exists for system messages
        conversations
            .resolve_or_create("buyer-1", "seller-1", "item-1")
            .await
            .unwrap();

        let engine = TransactionEngine::new(
            store,
            locks,
            sequencer,
            bus,
            conversations.clone(),
            catalog.clone(),
        );
        Fixture {
            engine,
            catalog,
            conversations,
            registry,
        }
    }

    async fn conv_id(f: &Fixture) -> String {
        f.conversations
            .resolve_or_create("buyer-1", "seller-1", "item-1")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_enforces_live_uniqueness() {
        let f = fixture().await;
        let conv = conv_id(&f).await;

        f.engine
            .create("item-1", &conv, "buyer-1", "seller-1", None)
            .await
            .unwrap();
        let second = f
            .engine
            .create("item-1", &conv, "buyer-1", "seller-1", None)
            .await;
        assert!(matches!(second, Err(TradeError::Conflict(_))));
    }

    #[tokio::test]
    async fn full_completion_flow() {
        let f = fixture().await;
        let conv = conv_id(&f).await;
        let tx = f
            .engine
            .create("item-1", &conv, "buyer-1", "seller-1", None)
            .await
            .unwrap();

        // Buyer confirms: still in progress
        let after_buyer = f.engine.confirm_completion(&tx.id, "buyer-1").await.unwrap();
        assert!(after_buyer.buyer_confirmed);
        assert!(!after_buyer.seller_confirmed);
        assert_eq!(after_buyer.status, TransactionStatus::InProgress);
        assert_eq!(f.catalog.status_calls.load(Ordering::SeqCst), 0);

        // Seller confirms: quorum reached
        let after_seller = f.engine.confirm_completion(&tx.id, "seller-1").await.unwrap();
        assert_eq!(after_seller.status, TransactionStatus::Completed);
        assert!(after_seller.completed_at.is_some());
        assert_eq!(f.catalog.status_calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.catalog.inner.item_status("item-1"), Some(ItemStatus::Sold));
    }

    #[tokio::test]
    async fn repeated_confirmation_is_idempotent() {
        let f = fixture().await;
        let conv = conv_id(&f).await;
        let tx = f
            .engine
            .create("item-1", &conv, "buyer-1", "seller-1", None)
            .await
            .unwrap();

        f.engine.confirm_completion(&tx.id, "buyer-1").await.unwrap();
        let repeat = f.engine.confirm_completion(&tx.id, "buyer-1").await.unwrap();
        assert!(repeat.buyer_confirmed);
        assert_eq!(repeat.status, TransactionStatus::InProgress);

        f.engine.confirm_completion(&tx.id, "seller-1").await.unwrap();
        // Repeat after quorum: still Ok, still exactly one side effect
        let late = f.engine.confirm_completion(&tx.id, "seller-1").await.unwrap();
        assert_eq!(late.status, TransactionStatus::Completed);
        assert_eq!(f.catalog.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_confirmations_complete_exactly_once() {
        let f = fixture().await;
        let conv = conv_id(&f).await;
        let tx = f
            .engine
            .create("item-1", &conv, "buyer-1", "seller-1", None)
            .await
            .unwrap();

        let e1 = f.engine.clone();
        let e2 = f.engine.clone();
        let id1 = tx.id.clone();
        let id2 = tx.id.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { e1.confirm_completion(&id1, "buyer-1").await }),
            tokio::spawn(async move { e2.confirm_completion(&id2, "seller-1").await }),
        );
        r1.unwrap().unwrap();
        r2.unwrap().unwrap();

        let final_tx = f.engine.get(&tx.id).unwrap();
        assert_eq!(final_tx.status, TransactionStatus::Completed);
        // Exactly one completion transition, exactly one catalog call
        assert_eq!(f.catalog.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_quorum_restores_availability() {
        let f = fixture().await;
        let conv = conv_id(&f).await;
        let tx = f
            .engine
            .create("item-1", &conv, "buyer-1", "seller-1", None)
            .await
            .unwrap();

        f.engine.confirm_cancellation(&tx.id, "buyer-1").await.unwrap();
        let done = f.engine.confirm_cancellation(&tx.id, "seller-1").await.unwrap();
        assert_eq!(done.status, TransactionStatus::Cancelled);
        assert!(done.completed_at.is_none());
        assert_eq!(
            f.catalog.inner.item_status("item-1"),
            Some(ItemStatus::Available)
        );
    }

    #[tokio::test]
    async fn split_confirmations_across_paths_leave_transaction_in_progress() {
        // Preserved source behavior: one completion flag plus one
        // cancellation flag never resolves either quorum.
        let f = fixture().await;
        let conv = conv_id(&f).await;
        let tx = f
            .engine
            .create("item-1", &conv, "buyer-1", "seller-1", None)
            .await
            .unwrap();

        f.engine.confirm_completion(&tx.id, "buyer-1").await.unwrap();
        let split = f
            .engine
            .confirm_cancellation(&tx.id, "seller-1")
            .await
            .unwrap();

        assert!(split.buyer_confirmed);
        assert!(split.seller_cancel_confirmed);
        assert_eq!(split.status, TransactionStatus::InProgress);
        assert_eq!(f.catalog.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn completion_wins_then_cancellation_is_moot() {
        let f = fixture().await;
        let conv = conv_id(&f).await;
        let tx = f
            .engine
            .create("item-1", &conv, "buyer-1", "seller-1", None)
            .await
            .unwrap();

        f.engine.confirm_completion(&tx.id, "buyer-1").await.unwrap();
        f.engine.confirm_completion(&tx.id, "seller-1").await.unwrap();

        // New cancellation confirmations are refused on a terminal record
        let refused = f.engine.confirm_cancellation(&tx.id, "buyer-1").await;
        assert!(matches!(refused, Err(TradeError::State(_))));

        let final_tx = f.engine.get(&tx.id).unwrap();
        assert_eq!(final_tx.status, TransactionStatus::Completed);
        assert!(!final_tx.buyer_cancel_confirmed);
    }

    #[tokio::test]
    async fn meetup_edits_are_in_progress_only() {
        let f = fixture().await;
        let conv = conv_id(&f).await;
        let tx = f
            .engine
            .create("item-1", &conv, "buyer-1", "seller-1", None)
            .await
            .unwrap();

        let updated = f
            .engine
            .set_meetup(&tx.id, "seller-1", 1_750_000_000_000, "Central Station")
            .await
            .unwrap();
        assert_eq!(updated.meetup_place.as_deref(), Some("Central Station"));

        f.engine.confirm_completion(&tx.id, "buyer-1").await.unwrap();
        f.engine.confirm_completion(&tx.id, "seller-1").await.unwrap();

        let late = f
            .engine
            .set_meetup(&tx.id, "seller-1", 1_750_000_000_000, "Elsewhere")
            .await;
        assert!(matches!(late, Err(TradeError::State(_))));
    }

    #[tokio::test]
    async fn non_participants_are_refused() {
        let f = fixture().await;
        let conv = conv_id(&f).await;
        let tx = f
            .engine
            .create("item-1", &conv, "buyer-1", "seller-1", None)
            .await
            .unwrap();

        assert!(matches!(
            f.engine.confirm_completion(&tx.id, "stranger").await,
            Err(TradeError::Authorization(_))
        ));
        assert!(matches!(
            f.engine.set_meetup(&tx.id, "stranger", 1, "x").await,
            Err(TradeError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn updates_fan_out_to_both_participants() {
        let f = fixture().await;
        let conv = conv_id(&f).await;
        let (_hb, mut rx_buyer) = f.registry.register("buyer-1");

        let tx = f
            .engine
            .create("item-1", &conv, "buyer-1", "seller-1", None)
            .await
            .unwrap();
        f.engine.confirm_completion(&tx.id, "buyer-1").await.unwrap();

        let mut received = 0;
        while rx_buyer.try_recv().is_ok() {
            received += 1;
        }
        // transaction_created + message_created + transaction_updated
        assert_eq!(received, 3);
    }
}
