use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::{
    domain::ChatId,
    options::GroupConfig,
    ports::{GroupRegistry, Persistence},
    store::{ConfigStore, CONFIGS_STORE},
    Result,
};

/// Registers groups in the `ConfigStore` on first reference.
pub struct StoreRegistry {
    store: Arc<ConfigStore>,
    persistence: Arc<dyn Persistence>,
}

impl StoreRegistry {
    pub fn new(store: Arc<ConfigStore>, persistence: Arc<dyn Persistence>) -> Self {
        Self { store, persistence }
    }
}

#[async_trait]
impl GroupRegistry for StoreRegistry {
    async fn ensure_registered(&self, group: ChatId) -> Result<bool> {
        if !group.is_group() {
            return Ok(false);
        }
        if self.store.contains(group).await {
            return Ok(true);
        }

        let _writer = self.store.writer(group).await;
        if self.store.contains(group).await {
            return Ok(true);
        }
        // Save first; a failed save leaves the group unregistered.
        let mut snapshot = self.store.snapshot().await;
        snapshot.insert(group.0, GroupConfig::factory());
        self.persistence
            .save(CONFIGS_STORE, serde_json::to_value(snapshot)?)
            .await?;
        self.store.register(group).await;
        info!(group = group.0, "registered new group with default config");
        Ok(true)
    }
}
