//! Server state - owner of every shared service
//!
//! `ServerState` holds the session registry, the event bus and both
//! engines as explicitly-owned objects; nothing in this server reaches
//! for ambient globals. `Arc` fields make cloning shallow, so state is
//! cheap to hand to axum and every session task.
//!
//! | Field | Type | Purpose |
//! |-------|------|---------|
//! | config | Config | immutable settings |
//! | jwt_service | Arc<JwtService> | token validation |
//! | store | Arc<TradeStore> | authoritative trade records |
//! | registry | Arc<SessionRegistry> | user -> live sessions |
//! | bus | EventBus | event fan-out |
//! | proposals | ProposalEngine | BuyRequest writes |
//! | transactions | TransactionEngine | Transaction writes |
//! | conversations | Arc<dyn ConversationStore> | external thread store |
//! | catalog | Arc<dyn Catalog> | external item service |

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::JwtService;
use crate::bus::{EventBus, SessionRegistry};
use crate::core::Config;
use crate::services::{
    Catalog, ConversationStore, InMemoryCatalog, InMemoryConversationStore,
};
use crate::trades::{EntityLocks, EventSequencer, ProposalEngine, TradeStore, TransactionEngine};

#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub jwt_service: Arc<JwtService>,
    pub store: Arc<TradeStore>,
    pub registry: Arc<SessionRegistry>,
    pub bus: EventBus,
    pub proposals: ProposalEngine,
    pub transactions: TransactionEngine,
    pub conversations: Arc<dyn ConversationStore>,
    pub catalog: Arc<dyn Catalog>,
    /// Unique instance id generated on startup; clients use it to
    /// detect restarts and trigger a full re-fetch.
    epoch: String,
    shutdown: CancellationToken,
}

impl ServerState {
    /// Initialize with in-process collaborator services
    pub fn initialize(config: &Config) -> Self {
        Self::with_services(
            config,
            Arc::new(InMemoryConversationStore::new()),
            Arc::new(InMemoryCatalog::new()),
        )
    }

    /// Initialize with explicit collaborator services (tests inject
    /// recording doubles here)
    pub fn with_services(
        config: &Config,
        conversations: Arc<dyn ConversationStore>,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        let store = Arc::new(TradeStore::new());
        let locks = Arc::new(EntityLocks::new());
        let sequencer = Arc::new(EventSequencer::new());
        let registry = Arc::new(SessionRegistry::new(config.session_queue_capacity));
        let bus = EventBus::new(registry.clone());

        let proposals = ProposalEngine::new(
            store.clone(),
            locks.clone(),
            sequencer.clone(),
            bus.clone(),
            conversations.clone(),
            catalog.clone(),
        );
        let transactions = TransactionEngine::new(
            store.clone(),
            locks,
            sequencer,
            bus.clone(),
            conversations.clone(),
            catalog.clone(),
        );

        let epoch = shared::util::new_id();
        tracing::info!(epoch = %epoch, "Server state initialized");

        Self {
            config: config.clone(),
            jwt_service: Arc::new(JwtService::with_config(config.jwt.clone())),
            store,
            registry,
            bus,
            proposals,
            transactions,
            conversations,
            catalog,
            epoch,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn jwt_service(&self) -> Arc<JwtService> {
        self.jwt_service.clone()
    }

    /// Server instance epoch (unique per startup)
    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    /// Token observed by every session loop for graceful shutdown
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn shutdown(&self) {
        tracing::info!("Shutting down server state");
        self.shutdown.cancel();
    }
}
