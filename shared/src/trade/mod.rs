//! Trade domain models
//!
//! The two entities with real lifecycle rules live here:
//!
//! - [`BuyRequest`] - a buyer's proposal to purchase an item, answered
//!   by the seller (accept/reject) or withdrawn by the buyer (cancel).
//! - [`Transaction`] - the agreed purchase, driven to `completed` or
//!   `cancelled` by a 2-of-2 confirmation quorum.
//!
//! [`ChatMessage`] is the conversation line both entities emit system
//! notices into.

mod buy_request;
mod message;
mod transaction;

pub use buy_request::{BuyRequest, BuyRequestStatus};
pub use message::{ChatMessage, MessageKind};
pub use transaction::{MeetupInfo, ParticipantRole, Transaction, TransactionStatus};
