//! Contracts of the external collaborators the miner drives.
//!
//! Implementations talk to a real bitcoin wallet and a NodeCore node; the
//! miner itself only ever sees these traits.

pub mod bitcoin;
pub mod nodecore;

pub use bitcoin::BitcoinBlockInfo;
pub use bitcoin::BitcoinService;
pub use bitcoin::FeeEstimate;
pub use bitcoin::SendFailure;
pub use bitcoin::TransactionHandle;
pub use bitcoin::WalletSeed;
pub use nodecore::NodeCoreClient;
