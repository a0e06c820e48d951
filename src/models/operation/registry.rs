use std::collections::HashMap;

use itertools::Itertools;

use super::MiningOperationState;
use super::OperationAction;
use super::OperationId;
use super::SharedOperation;
use crate::locks::tokio::AtomicRw;

/// Live mining operations, keyed by id.
///
/// The registry hands out [SharedOperation] handles; the state behind a
/// handle is shared with whatever task is advancing the operation.  The map
/// lock is never held while an operation lock is awaited.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    operations: AtomicRw<HashMap<OperationId, SharedOperation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self {
            operations: AtomicRw::from((HashMap::new(), Some("OperationRegistry"))),
        }
    }

    /// inserts `operation` under its own id.
    ///
    /// returns false, keeping the existing entry, if the id is already present.
    pub async fn insert_if_absent(&self, operation: SharedOperation) -> bool {
        let id = operation.lock(|s| s.operation_id().clone()).await;

        let mut operations = self.operations.clone();
        operations
            .lock_mut(|map| match map.entry(id) {
                std::collections::hash_map::Entry::Occupied(_) => false,
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(operation);
                    true
                }
            })
            .await
    }

    pub async fn get(&self, id: &OperationId) -> Option<SharedOperation> {
        self.operations.lock(|map| map.get(id).cloned()).await
    }

    pub async fn remove(&self, id: &OperationId) -> Option<SharedOperation> {
        let mut operations = self.operations.clone();
        operations.lock_mut(|map| map.remove(id)).await
    }

    pub async fn len(&self) -> usize {
        self.operations.lock(|map| map.len()).await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// handles to every live operation, in no particular order.
    pub async fn handles(&self) -> Vec<SharedOperation> {
        self.operations
            .lock(|map| map.values().cloned().collect())
            .await
    }

    /// copies of all live operations, sorted by ascending endorsed block
    /// number.  operations without a mining instruction come first.
    pub async fn snapshot(&self) -> Vec<MiningOperationState> {
        let mut states = Vec::new();
        for handle in self.handles().await {
            states.push(handle.lock(|s| s.clone()).await);
        }

        states
            .into_iter()
            .sorted_by_key(|s| {
                (
                    s.endorsed_block_number().map(i128::from).unwrap_or(-1),
                    s.operation_id().clone(),
                )
            })
            .collect_vec()
    }

    /// number of live operations currently in `action`.
    pub async fn count_in_action(&self, action: OperationAction) -> usize {
        let mut count = 0;
        for handle in self.handles().await {
            if handle.lock(|s| s.current_action() == action).await {
                count += 1;
            }
        }
        count
    }
}
