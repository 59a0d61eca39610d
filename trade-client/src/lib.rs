//! Trade client - local state reconciliation
//!
//! Client-side counterpart of the trade server's push channel. Holds
//! locally-optimistic state and merges authoritative push events into
//! it without corrupting it:
//!
//! - messages are deduplicated by id, so replayed or duplicated
//!   delivery is harmless
//! - entity snapshots apply by entity id with last-authoritative-write
//!   wins, gated on the event sequence so stale delivery is skipped
//! - events whose payload cannot be trusted as a full snapshot mark
//!   the entity for a re-fetch from the authoritative HTTP API
//! - events for conversations other than the active one only touch
//!   background counters
//!
//! The merge itself ([`reconciler::apply`]) is a pure function over
//! `(state, event)`; scheduling and transport stay outside.

pub mod error;
pub mod fetch;
pub mod reconciler;
pub mod state;

pub use error::ClientError;
pub use fetch::{AuthoritativeSource, HttpSource, resolve_pending};
pub use reconciler::{ApplyOutcome, apply};
pub use state::{ClientState, EntityKind, EntityRef};
