//! Durable storage of mining operations and miner settings.

pub mod file;
pub mod memory;

use std::path::PathBuf;

use crate::models::operation::MiningOperationState;
use crate::models::operation::OperationId;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Settings key recording that the user has seen the wallet seed.
pub const WALLET_SEED_VIEWED_KEY: &str = "bitcoin.wallet.seed.viewed";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("i/o error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to (de)serialize {what}")]
    Serialization {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait::async_trait]
pub trait OperationStore: Send + Sync + std::fmt::Debug {
    async fn get_operation(
        &self,
        id: &OperationId,
    ) -> Result<Option<MiningOperationState>, StoreError>;

    /// every stored operation that has not reached a terminal phase.
    async fn get_active_operations(&self) -> Result<Vec<MiningOperationState>, StoreError>;

    /// inserts or replaces the record for `state`.
    async fn save_operation(&self, state: &MiningOperationState) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    async fn get_value(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_value(&self, key: &str, value: &str) -> Result<(), StoreError>;
}
