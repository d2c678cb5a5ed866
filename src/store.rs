use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{IdentityKey, PriceObservation, Product};
use crate::utils::error::StorageError;

/// Persistence seam for change detection across runs.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Last known state for an identity, if one was ever recorded.
    async fn get_last_known(&self, identity: &IdentityKey)
        -> Result<Option<Product>, StorageError>;

    /// Appends a price observation to the identity's history.
    async fn put_observation(&self, observation: PriceObservation) -> Result<(), StorageError>;

    /// Replaces the last known state for the product's identity.
    async fn put_last_known(&self, product: &Product) -> Result<(), StorageError>;
}

/// In-memory store. Observation history is append-only.
pub struct MemoryStore {
    last_known: RwLock<HashMap<IdentityKey, Product>>,
    observations: RwLock<HashMap<IdentityKey, Vec<PriceObservation>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            last_known: RwLock::new(HashMap::new()),
            observations: RwLock::new(HashMap::new()),
        }
    }

    /// Recorded history for an identity, oldest first.
    pub async fn observations(&self, identity: &IdentityKey) -> Vec<PriceObservation> {
        self.observations
            .read()
            .await
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn tracked_count(&self) -> usize {
        self.last_known.read().await.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn get_last_known(
        &self,
        identity: &IdentityKey,
    ) -> Result<Option<Product>, StorageError> {
        Ok(self.last_known.read().await.get(identity).cloned())
    }

    async fn put_observation(&self, observation: PriceObservation) -> Result<(), StorageError> {
        self.observations
            .write()
            .await
            .entry(observation.identity.clone())
            .or_default()
            .push(observation);
        Ok(())
    }

    async fn put_last_known(&self, product: &Product) -> Result<(), StorageError> {
        self.last_known
            .write()
            .await
            .insert(product.identity.clone(), product.clone());
        Ok(())
    }
}
