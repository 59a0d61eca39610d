//! External collaborators
//!
//! The coordination core consumes two external services: the
//! conversation store (durable two-party threads) and the catalog
//! (item ownership and availability). Both are behind traits so the
//! engines stay independent of where those systems actually live;
//! the in-memory implementations back tests and single-process runs.

pub mod catalog;
pub mod conversation;

pub use catalog::{Catalog, InMemoryCatalog, ItemStatus};
pub use conversation::{ConversationStore, InMemoryConversationStore};

use thiserror::Error;

/// Failure talking to an external collaborator
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Unknown conversation: {0}")]
    UnknownConversation(String),
}
