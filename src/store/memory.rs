use std::collections::HashMap;

use super::KeyValueStore;
use super::OperationStore;
use super::StoreError;
use crate::locks::tokio::AtomicRw;
use crate::models::operation::MiningOperationState;
use crate::models::operation::OperationId;

/// Volatile store, for tests and for running without a data directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    operations: AtomicRw<HashMap<OperationId, MiningOperationState>>,
    settings: AtomicRw<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl OperationStore for MemoryStore {
    async fn get_operation(
        &self,
        id: &OperationId,
    ) -> Result<Option<MiningOperationState>, StoreError> {
        Ok(self.operations.lock(|ops| ops.get(id).cloned()).await)
    }

    async fn get_active_operations(&self) -> Result<Vec<MiningOperationState>, StoreError> {
        Ok(self
            .operations
            .lock(|ops| {
                ops.values()
                    .filter(|s| !s.is_terminal())
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn save_operation(&self, state: &MiningOperationState) -> Result<(), StoreError> {
        let mut operations = self.operations.clone();
        operations
            .lock_mut(|ops| ops.insert(state.operation_id().clone(), state.clone()))
            .await;
        Ok(())
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.settings.lock(|s| s.get(key).cloned()).await)
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut settings = self.settings.clone();
        settings
            .lock_mut(|s| s.insert(key.to_owned(), value.to_owned()))
            .await;
        Ok(())
    }
}
