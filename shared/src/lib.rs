//! Shared types for the trade coordination system
//!
//! Common types used by both `trade-server` and `trade-client`:
//! the trade domain models (proposals, transactions, conversation
//! messages), the push event envelope, and the duplex wire frames.

pub mod event;
pub mod frame;
pub mod trade;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Event re-exports (for convenient access)
pub use event::{EventType, PushEvent};
pub use frame::{ClientFrame, ServerFrame};
pub use trade::{BuyRequest, BuyRequestStatus, ChatMessage, Transaction, TransactionStatus};
