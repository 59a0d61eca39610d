//! Proposal engine - the BuyRequest state machine
//!
//! Owns every write to BuyRequest records. One outstanding proposal per
//! (buyer, item) at a time; accepting atomically creates the
//! transaction so no reader ever observes an accepted request without
//! one.

use std::sync::Arc;

use shared::event::PushEvent;
use shared::trade::{BuyRequest, BuyRequestStatus, Transaction};
use shared::util::now_millis;

use crate::bus::EventBus;
use crate::services::{Catalog, ConversationStore};
use crate::trades::store::{EntityLocks, EventSequencer, TradeStore};
use crate::trades::TradeError;

/// Seller/buyer response to a pending proposal
enum Verdict {
    Reject,
    Cancel,
}

#[derive(Clone)]
pub struct ProposalEngine {
    store: Arc<TradeStore>,
    locks: Arc<EntityLocks>,
    sequencer: Arc<EventSequencer>,
    bus: EventBus,
    conversations: Arc<dyn ConversationStore>,
    catalog: Arc<dyn Catalog>,
}

impl ProposalEngine {
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

    /// Create a new pending buy request
    ///
    /// Fails with `Conflict` if an active request already exists for
    /// this (buyer, item): pending, or accepted with a live
    /// transaction. Resolves the conversation when none is given.
    pub async fn propose(
        &self,
        buyer_id: &str,
        item_id: &str,
        conversation_id: Option<String>,
    ) -> Result<BuyRequest, TradeError> {
        let seller_id = self
            .catalog
            .get_item_owner(item_id)
            .await?
            .ok_or_else(|| TradeError::NotFound(format!("Item {item_id} not found")))?;

        if seller_id == buyer_id {
            return Err(TradeError::Validation(
                "Cannot propose to buy your own item".to_string(),
            ));
        }

        // Conversation resolution happens before the critical section;
        // it may create state but never conflicts.
        let conversation_id = match conversation_id {
            Some(id) => {
                self.conversations.participants(&id).await?;
                id
            }
            None => {
                self.conversations
                    .resolve_or_create(buyer_id, &seller_id, item_id)
                    .await?
            }
        };

        let (request, sequence) = {
            let _guard = self
                .locks
                .acquire(&format!("proposal:{buyer_id}:{item_id}"))
                .await;

            if self.store.has_active_request(buyer_id, item_id) {
                return Err(TradeError::Conflict(format!(
                    "An active buy request already exists for item {item_id}"
                )));
            }

            let request =
                BuyRequest::new(item_id, buyer_id, seller_id.as_str(), conversation_id.as_str());
            self.store.put_request(request.clone());
            (request, self.sequencer.next())
        };

        tracing::info!(
            request_id = %request.id,
            buyer_id,
            item_id,
            "Buy request created"
        );

        self.bus
            .publish(PushEvent::buy_request_updated(&request, sequence));
        self.notify_conversation(&request, "The buyer sent a purchase offer for this item")
            .await;

        Ok(request)
    }

    /// Accept a pending request (seller only)
    ///
    /// Atomically flips the request to `Accepted` and creates the
    /// in-progress transaction: the transaction record is inserted
    /// before the request status is, so a concurrent reader sees either
    /// a pending request or an accepted one with its transaction.
    pub async fn accept(
        &self,
        request_id: &str,
        actor_id: &str,
    ) -> Result<(BuyRequest, Transaction), TradeError> {
        let (request, transaction, tx_seq, req_seq) = {
            let _guard = self.locks.acquire(&format!("request:{request_id}")).await;

            let mut request = self
                .store
                .get_request(request_id)
                .ok_or_else(|| TradeError::NotFound(format!("Buy request {request_id} not found")))?;

            if request.seller_id != actor_id {
                return Err(TradeError::Authorization(
                    "Only the seller can accept a buy request".to_string(),
                ));
            }
            if request.status != BuyRequestStatus::Pending {
                return Err(TradeError::State(format!(
                    "Buy request is {:?}, only pending requests can be accepted",
                    request.status
                )));
            }

            let _pair_guard = self
                .locks
                .acquire(&format!(
                    "transaction:{}:{}",
                    request.conversation_id, request.item_id
                ))
                .await;
            if self
                .store
                .live_transaction_for(&request.conversation_id, &request.item_id)
                .is_some()
            {
                return Err(TradeError::Conflict(
                    "A live transaction already exists for this item in this conversation"
                        .to_string(),
                ));
            }

            let transaction = Transaction::new(
                request.item_id.clone(),
                request.conversation_id.clone(),
                request.buyer_id.clone(),
                request.seller_id.clone(),
                Some(request.id.clone()),
                None,
            );
            self.store.put_transaction(transaction.clone());

            request.status = BuyRequestStatus::Accepted;
            request.responded_at = Some(now_millis());
            self.store.put_request(request.clone());

            let tx_seq = self.sequencer.next();
            let req_seq = self.sequencer.next();
            (request, transaction, tx_seq, req_seq)
        };

        tracing::info!(
            request_id = %request.id,
            transaction_id = %transaction.id,
            "Buy request accepted, transaction created"
        );

        self.bus
            .publish(PushEvent::transaction_created(&transaction, tx_seq));
        self.bus
            .publish(PushEvent::buy_request_updated(&request, req_seq));
        self.notify_conversation(&request, "The seller accepted the purchase offer")
            .await;

        Ok((request, transaction))
    }

    /// Reject a pending request (seller only)
    pub async fn reject(&self, request_id: &str, actor_id: &str) -> Result<BuyRequest, TradeError> {
        self.finalize(request_id, actor_id, Verdict::Reject).await
    }

    /// Cancel a pending request (buyer only)
    pub async fn cancel(&self, request_id: &str, actor_id: &str) -> Result<BuyRequest, TradeError> {
        self.finalize(request_id, actor_id, Verdict::Cancel).await
    }

    /// Shared terminal transition for reject/cancel. No transaction is
    /// created on either path.
    async fn finalize(
        &self,
        request_id: &str,
        actor_id: &str,
        verdict: Verdict,
    ) -> Result<BuyRequest, TradeError> {
        let (request, sequence) = {
            let _guard = self.locks.acquire(&format!("request:{request_id}")).await;

            let mut request = self
                .store
                .get_request(request_id)
                .ok_or_else(|| TradeError::NotFound(format!("Buy request {request_id} not found")))?;

            match verdict {
                Verdict::Reject if request.seller_id != actor_id => {
                    return Err(TradeError::Authorization(
                        "Only the seller can reject a buy request".to_string(),
                    ));
                }
                Verdict::Cancel if request.buyer_id != actor_id => {
                    return Err(TradeError::Authorization(
                        "Only the buyer can cancel a buy request".to_string(),
                    ));
                }
                _ => {}
            }

            if request.status != BuyRequestStatus::Pending {
                return Err(TradeError::State(format!(
                    "Buy request is {:?}, only pending requests can be responded to",
                    request.status
                )));
            }

            request.status = match verdict {
                Verdict::Reject => BuyRequestStatus::Rejected,
                Verdict::Cancel => BuyRequestStatus::Cancelled,
            };
            request.responded_at = Some(now_millis());
            self.store.put_request(request.clone());
            (request, self.sequencer.next())
        };

        tracing::info!(request_id = %request.id, status = ?request.status, "Buy request closed");

        self.bus
            .publish(PushEvent::buy_request_updated(&request, sequence));
        let text = match request.status {
            BuyRequestStatus::Rejected => "The seller declined the purchase offer",
            _ => "The buyer withdrew the purchase offer",
        };
        self.notify_conversation(&request, text).await;

        Ok(request)
    }

    pub fn get(&self, request_id: &str) -> Option<BuyRequest> {
        self.store.get_request(request_id)
    }

    /// Best-effort system message into the conversation plus the
    /// matching `message_created` fan-out. A failed append is logged,
    /// never propagated: the domain transition already committed.
    async fn notify_conversation(&self, request: &BuyRequest, text: &str) {
        match self
            .conversations
            .append_system_message(&request.conversation_id, text)
            .await
        {
            Ok(message) => {
                let sequence = self.sequencer.next();
                self.bus.publish(PushEvent::message_created(
                    &message,
                    vec![request.buyer_id.clone(), request.seller_id.clone()],
                    sequence,
                ));
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = %request.conversation_id,
                    error = %e,
                    "Failed to append system message"
                );
            }
        }
    }
}
