use serde::Deserialize;
use serde::Serialize;

/// The data NodeCore hands out for an endorsement: what to publish in the
/// bitcoin transaction and which block it endorses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningInstruction {
    /// height of the NodeCore block being endorsed.
    pub endorsed_block_height: u64,

    /// payload written into the endorsement transaction.
    pub publication_data: Vec<u8>,

    /// NodeCore address the PoP reward is paid to.
    pub miner_address: String,

    /// NodeCore headers leading up to the endorsed block.
    pub endorsed_block_context_headers: Vec<Vec<u8>>,

    /// bitcoin headers NodeCore already knows about.
    pub last_bitcoin_block_headers: Vec<Vec<u8>>,
}

impl MiningInstruction {
    pub fn new(endorsed_block_height: u64, publication_data: Vec<u8>, miner_address: String) -> Self {
        Self {
            endorsed_block_height,
            publication_data,
            miner_address,
            endorsed_block_context_headers: vec![],
            last_bitcoin_block_headers: vec![],
        }
    }
}
