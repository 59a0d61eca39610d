//! Trade engines - proposal and transaction state machines
//!
//! # Write path
//!
//! ```text
//! client action (HTTP or gateway frame)
//!     ├─ 1. acquire per-entity lock
//!     ├─ 2. read current state, check authorization + status
//!     ├─ 3. mutate, evaluate quorum where applicable
//!     ├─ 4. write back, stamp event sequence
//!     ├─ 5. release lock
//!     ├─ 6. best-effort side effects (catalog, system message)
//!     └─ 7. publish events to the bus
//! ```
//!
//! The read-evaluate-write section for one entity id is serialized by
//! [`EntityLocks`], so concurrent confirmations can never both observe
//! a half-filled quorum. The event bus is never called while a lock is
//! held; events carry sequence numbers stamped inside the critical
//! section so receivers can discard stale delivery.

mod error;
mod proposals;
mod store;
mod transactions;

pub use error::TradeError;
pub use proposals::ProposalEngine;
pub use store::{EntityLocks, EventSequencer, TradeStore};
pub use transactions::TransactionEngine;
