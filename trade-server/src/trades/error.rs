//! Engine-level error taxonomy
//!
//! These are surfaced to callers verbatim: every variant is either a
//! client logic error or a legitimate race the client resolves by
//! re-fetching the entity.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Correct identity, wrong role for the action
    #[error("Not allowed: {0}")]
    Authorization(String),

    /// Action invalid for the entity's current status
    #[error("Invalid state: {0}")]
    State(String),

    /// Would violate a uniqueness invariant
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// External collaborator failure on a required call
    #[error("Service failure: {0}")]
    Service(String),
}

impl From<crate::services::ServiceError> for TradeError {
    fn from(err: crate::services::ServiceError) -> Self {
        TradeError::Service(err.to_string())
    }
}
