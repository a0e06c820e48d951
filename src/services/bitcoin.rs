use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::models::amount::Amount;

/// Why the wallet refused or failed to send coins.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum SendFailure {
    #[error("insufficient funds to send the requested amount")]
    InsufficientFunds,

    #[error("calculated transaction fee exceeds the configured maximum")]
    ExceededMaxFee,

    #[error("transaction spends outputs already spent by a pending transaction")]
    DuplicateTransaction,

    #[error("wallet is busy with another transaction, try again shortly")]
    LockUnavailable,

    #[error("unable to send bitcoin: {0}")]
    Failed(String),
}

/// A transaction accepted by the wallet for broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHandle {
    pub txid: String,
    pub fee: Amount,
}

/// The mnemonic backing the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSeed {
    pub words: Vec<String>,
    pub creation_time: DateTime<Utc>,
}

/// Fee rate observed in the most recent bitcoin block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub fee_per_kb: Amount,
    pub block_height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitcoinBlockInfo {
    pub hash: String,
    pub height: u64,
    pub header: Vec<u8>,
}

/// The local bitcoin wallet and SPV node.
///
/// State queries are cheap and synchronous; the wallet keeps them current
/// in the background and announces changes as events.
#[async_trait::async_trait]
pub trait BitcoinService: Send + Sync + std::fmt::Debug {
    async fn initialize(&self) -> anyhow::Result<()>;

    async fn shutdown(&self) -> anyhow::Result<()>;

    fn service_ready(&self) -> bool;

    fn blockchain_downloaded(&self) -> bool;

    fn balance(&self) -> Amount;

    fn current_receive_address(&self) -> String;

    /// builds, signs and broadcasts a payment.  sends are serialized by the
    /// wallet itself.
    async fn send_coins(
        &self,
        address: &str,
        amount: Amount,
    ) -> Result<TransactionHandle, SendFailure>;

    fn mnemonic_seed(&self) -> anyhow::Result<WalletSeed>;

    /// replaces the wallet with one restored from `words`.
    ///
    /// `creation_time` limits how far back the chain is rescanned.
    async fn import_wallet(
        &self,
        words: &[String],
        creation_time: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()>;

    async fn reset_wallet(&self) -> anyhow::Result<()>;

    /// private keys of every wallet address, serialized as WIF strings.
    fn export_private_keys(&self) -> anyhow::Result<Vec<String>>;

    async fn calculate_fees_from_latest_block(&self) -> anyhow::Result<FeeEstimate>;

    async fn last_block(&self) -> anyhow::Result<BitcoinBlockInfo>;
}
