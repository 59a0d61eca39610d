//! Authoritative re-fetch
//!
//! When the reconciler cannot trust an event payload it marks the
//! entity for a fresh read. [`resolve_pending`] drains those markers
//! against an [`AuthoritativeSource`]; [`HttpSource`] is the standard
//! implementation over the server's REST API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use shared::trade::{BuyRequest, Transaction};

use crate::error::ClientError;
use crate::state::{ClientState, EntityKind};

#[async_trait]
pub trait AuthoritativeSource: Send + Sync {
    /// Fetch a buy request by id; `None` when the server has no record
    async fn fetch_buy_request(&self, id: &str) -> Result<Option<BuyRequest>, ClientError>;

    /// Fetch a transaction by id; `None` when the server has no record
    async fn fetch_transaction(&self, id: &str) -> Result<Option<Transaction>, ClientError>;
}

/// Drain pending re-fetch markers into authoritative state.
///
/// Returns the number of entities refreshed. Entities the server no
/// longer reports are dropped silently; the next event for them would
/// queue a new fetch.
pub async fn resolve_pending(
    state: &mut ClientState,
    source: &dyn AuthoritativeSource,
) -> Result<usize, ClientError> {
    let pending = state.take_pending_fetches();
    let mut resolved = 0;

    for entity_ref in pending {
        match entity_ref.kind {
            EntityKind::BuyRequest => {
                if let Some(request) = source.fetch_buy_request(&entity_ref.id).await? {
                    state.upsert_buy_request(request);
                    resolved += 1;
                }
            }
            EntityKind::Transaction => {
                if let Some(transaction) = source.fetch_transaction(&entity_ref.id).await? {
                    state.upsert_transaction(transaction);
                    resolved += 1;
                }
            }
        }
    }

    Ok(resolved)
}

/// REST-backed authoritative source
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ClientError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.token),
            )
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<T>().await?)),
            status => Err(ClientError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl AuthoritativeSource for HttpSource {
    async fn fetch_buy_request(&self, id: &str) -> Result<Option<BuyRequest>, ClientError> {
        self.get_optional(&format!("api/proposals/{id}")).await
    }

    async fn fetch_transaction(&self, id: &str) -> Result<Option<Transaction>, ClientError> {
        self.get_optional(&format!("api/transactions/{id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::{ApplyOutcome, apply};
    use shared::event::{EventType, PushEvent};
    use std::collections::HashMap;

    /// Canned source used to exercise resolve_pending without a server
    #[derive(Default)]
    struct FixtureSource {
        transactions: HashMap<String, Transaction>,
    }

    #[async_trait]
    impl AuthoritativeSource for FixtureSource {
        async fn fetch_buy_request(&self, _id: &str) -> Result<Option<BuyRequest>, ClientError> {
            Ok(None)
        }

        async fn fetch_transaction(
            &self,
            id: &str,
        ) -> Result<Option<Transaction>, ClientError> {
            Ok(self.transactions.get(id).cloned())
        }
    }

    #[tokio::test]
    async fn pending_fetches_resolve_into_state() {
        let mut state = ClientState::new();
        let tx = Transaction::new("item-1", "conv-1", "b", "s", None, None);

        // A partial event only queues the fetch
        let event = PushEvent {
            event_type: EventType::TransactionUpdated,
            sequence: 1,
            target_user_ids: vec![],
            payload: serde_json::json!({ "id": tx.id }),
        };
        assert!(matches!(
            apply(&mut state, &event),
            ApplyOutcome::NeedsFetch(_)
        ));

        let mut source = FixtureSource::default();
        source.transactions.insert(tx.id.clone(), tx.clone());

        let resolved = resolve_pending(&mut state, &source).await.unwrap();
        assert_eq!(resolved, 1);
        assert_eq!(state.transaction(&tx.id).unwrap().id, tx.id);
        assert!(!state.has_pending_fetches());
    }

    #[tokio::test]
    async fn unknown_entities_are_dropped_quietly() {
        let mut state = ClientState::new();
        let event = PushEvent {
            event_type: EventType::TransactionUpdated,
            sequence: 1,
            target_user_ids: vec![],
            payload: serde_json::json!({ "id": "gone" }),
        };
        apply(&mut state, &event);

        let source = FixtureSource::default();
        let resolved = resolve_pending(&mut state, &source).await.unwrap();
        assert_eq!(resolved, 0);
        assert!(state.transaction("gone").is_none());
    }
}
