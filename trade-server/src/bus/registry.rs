//! Session registry
//!
//! Concurrency-safe map from user id to that user's live sessions. The
//! registry is an explicitly-owned object handed to the gateway and the
//! event bus at construction; register/deregister are tied to
//! connection open/close in the gateway.
//!
//! Each session gets its own bounded broadcast queue. Writers never
//! block: when a session's socket pump falls behind, the queue drops
//! its oldest entries (the pump observes a lag and keeps going), which
//! is acceptable because clients reconcile with authoritative HTTP
//! reads, not with event payloads alone.

use dashmap::DashMap;
use tokio::sync::broadcast;

use shared::frame::ServerFrame;
use shared::util::new_id;

/// Handle to one live session's outbound queue
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: String,
    user_id: String,
    tx: broadcast::Sender<ServerFrame>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Enqueue a frame without blocking. Returns false when the session
    /// is already gone (receiver dropped).
    pub fn enqueue(&self, frame: ServerFrame) -> bool {
        self.tx.send(frame).is_ok()
    }
}

/// Registry of live sessions keyed by user id
#[derive(Debug)]
pub struct SessionRegistry {
    /// user_id -> (session_id -> handle)
    sessions: DashMap<String, DashMap<String, SessionHandle>>,
    queue_capacity: usize,
}

impl SessionRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            queue_capacity,
        }
    }

    /// Register a new session for a user
    ///
    /// Returns the handle (kept by the registry for fan-out) and the
    /// receiving end the gateway pumps onto the wire.
    pub fn register(&self, user_id: &str) -> (SessionHandle, broadcast::Receiver<ServerFrame>) {
        let (tx, rx) = broadcast::channel(self.queue_capacity);
        let handle = SessionHandle {
            session_id: new_id(),
            user_id: user_id.to_string(),
            tx,
        };
        self.sessions
            .entry(user_id.to_string())
            .or_default()
            .insert(handle.session_id.clone(), handle.clone());
        tracing::debug!(user_id, session_id = %handle.session_id, "Session registered");
        (handle, rx)
    }

    /// Remove a session; empty user entries are cleaned up
    pub fn deregister(&self, user_id: &str, session_id: &str) {
        if let Some(user_sessions) = self.sessions.get(user_id) {
            user_sessions.remove(session_id);
        }
        // Guarded removal: a session registered concurrently keeps the entry
        self.sessions.remove_if(user_id, |_, sessions| sessions.is_empty());
        tracing::debug!(user_id, session_id, "Session deregistered");
    }

    /// Snapshot of a user's live session handles
    pub fn sessions_of(&self, user_id: &str) -> Vec<SessionHandle> {
        self.sessions
            .get(user_id)
            .map(|s| s.iter().map(|e| e.value().clone()).collect())
            .unwrap_or_default()
    }

    pub fn session_count(&self, user_id: &str) -> usize {
        self.sessions.get(user_id).map(|s| s.len()).unwrap_or(0)
    }

    pub fn connected_user_count(&self) -> usize {
        self.sessions.len()
    }
}
