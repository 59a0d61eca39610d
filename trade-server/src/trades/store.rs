//! Authoritative in-memory state and per-entity serialization
//!
//! BuyRequest and Transaction records are the only mutable shared
//! resources in this core; all mutation goes through the engines, which
//! take the matching [`EntityLocks`] guard before any read-modify-write.
//! Readers (HTTP GET handlers) go straight to the maps: writers insert
//! complete records, so a concurrent reader sees either the old or the
//! new snapshot, never a torn one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use shared::trade::{BuyRequest, BuyRequestStatus, Transaction};

/// Sharded async lock table keyed by entity id
///
/// `acquire("transaction:{id}")` serializes all writers of one entity
/// while leaving other entities fully concurrent. Lock cells are
/// created on first use and kept for the process lifetime; entity
/// populations here are small enough that reclamation is not worth the
/// race it would invite.
#[derive(Debug, Default)]
pub struct EntityLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let cell = self
            .locks
            .entry(key.to_string())
            .or_default()
            .clone();
        cell.lock_owned().await
    }
}

/// Monotonic event sequence source
///
/// Stamped on every push event inside the entity critical section, so
/// sequence order matches commit order per entity even when fan-out
/// happens after the lock is released.
#[derive(Debug, Default)]
pub struct EventSequencer {
    counter: AtomicU64,
}

impl EventSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// In-memory authoritative store for trade entities
///
/// Terminal records are retained as audit history, never deleted.
#[derive(Debug, Default)]
pub struct TradeStore {
    buy_requests: DashMap<String, BuyRequest>,
    transactions: DashMap<String, Transaction>,
}

impl TradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== BuyRequest ==========

    pub fn get_request(&self, id: &str) -> Option<BuyRequest> {
        self.buy_requests.get(id).map(|r| r.clone())
    }

    pub fn put_request(&self, request: BuyRequest) {
        self.buy_requests.insert(request.id.clone(), request);
    }

    /// All requests a buyer has made for an item, any status
    pub fn requests_for_pair(&self, buyer_id: &str, item_id: &str) -> Vec<BuyRequest> {
        self.buy_requests
            .iter()
            .filter(|r| r.buyer_id == buyer_id && r.item_id == item_id)
            .map(|r| r.clone())
            .collect()
    }

    /// Whether an active request exists for (buyer, item): pending, or
    /// accepted with a transaction that is still live.
    pub fn has_active_request(&self, buyer_id: &str, item_id: &str) -> bool {
        self.requests_for_pair(buyer_id, item_id)
            .iter()
            .any(|r| match r.status {
                BuyRequestStatus::Pending => true,
                BuyRequestStatus::Accepted => self
                    .transaction_by_request(&r.id)
                    .map(|t| t.is_live())
                    .unwrap_or(false),
                _ => false,
            })
    }

    // ========== Transaction ==========

    pub fn get_transaction(&self, id: &str) -> Option<Transaction> {
        self.transactions.get(id).map(|t| t.clone())
    }

    pub fn put_transaction(&self, transaction: Transaction) {
        self.transactions
            .insert(transaction.id.clone(), transaction);
    }

    pub fn transaction_by_request(&self, buy_request_id: &str) -> Option<Transaction> {
        self.transactions
            .iter()
            .find(|t| t.buy_request_id.as_deref() == Some(buy_request_id))
            .map(|t| t.clone())
    }

    /// The live transaction for (conversation, item), if any.
    /// At most one exists at a time; the engines enforce it.
    pub fn live_transaction_for(
        &self,
        conversation_id: &str,
        item_id: &str,
    ) -> Option<Transaction> {
        self.transactions
            .iter()
            .find(|t| {
                t.conversation_id == conversation_id && t.item_id == item_id && t.is_live()
            })
            .map(|t| t.clone())
    }

    /// All transactions of a conversation, newest first
    pub fn transactions_by_conversation(&self, conversation_id: &str) -> Vec<Transaction> {
        let mut result: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| t.conversation_id == conversation_id)
            .map(|t| t.clone())
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }
}
