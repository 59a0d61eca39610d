//! Catalog collaborator
//!
//! Item ownership lookup and availability flips. Availability updates
//! are best-effort from the engines' point of view: a completed
//! transaction stays completed even if the catalog call fails.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::ServiceError;

/// Item availability as the catalog tracks it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Available,
    Sold,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Owner (seller) of an item, `None` if the item is unknown
    async fn get_item_owner(&self, item_id: &str) -> Result<Option<String>, ServiceError>;

    /// Flip item availability
    async fn set_item_status(
        &self,
        item_id: &str,
        status: ItemStatus,
    ) -> Result<(), ServiceError>;
}

/// In-process catalog
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    /// item_id -> (owner, status)
    items: DashMap<String, (String, ItemStatus)>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an item (test/demo helper)
    pub fn put_item(&self, item_id: impl Into<String>, owner_id: impl Into<String>) {
        self.items
            .insert(item_id.into(), (owner_id.into(), ItemStatus::Available));
    }

    /// Current status of an item (test/demo helper)
    pub fn item_status(&self, item_id: &str) -> Option<ItemStatus> {
        self.items.get(item_id).map(|e| e.1)
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_item_owner(&self, item_id: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.items.get(item_id).map(|e| e.0.clone()))
    }

    async fn set_item_status(
        &self,
        item_id: &str,
        status: ItemStatus,
    ) -> Result<(), ServiceError> {
        match self.items.get_mut(item_id) {
            Some(mut entry) => {
                entry.1 = status;
                Ok(())
            }
            None => Err(ServiceError::UnknownItem(item_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn owner_lookup_and_status_flip() {
        let catalog = InMemoryCatalog::new();
        catalog.put_item("item-1", "seller-1");

        let owner = catalog.get_item_owner("item-1").await.unwrap();
        assert_eq!(owner.as_deref(), Some("seller-1"));
        assert_eq!(catalog.item_status("item-1"), Some(ItemStatus::Available));

        catalog.set_item_status("item-1", ItemStatus::Sold).await.unwrap();
        assert_eq!(catalog.item_status("item-1"), Some(ItemStatus::Sold));
    }

    #[tokio::test]
    async fn unknown_item() {
        let catalog = InMemoryCatalog::new();
        assert_eq!(catalog.get_item_owner("ghost").await.unwrap(), None);
        assert!(matches!(
            catalog.set_item_status("ghost", ItemStatus::Sold).await,
            Err(ServiceError::UnknownItem(_))
        ));
    }
}
