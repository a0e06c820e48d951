//! Decoding of NodeCore chain-tip headers.
//!
//! Only the block height is needed by the miner (for settlement expiry), so
//! only the height field is decoded.

use serde::Deserialize;
use serde::Serialize;

/// Serialized size of a NodeCore block header.
pub const NODECORE_HEADER_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BlockTipError {
    #[error("block header must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("block header encodes negative height {0}")]
    NegativeHeight(i32),
}

/// The tip of the NodeCore chain as announced by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTip {
    pub height: u64,
    pub header: Vec<u8>,
}

impl BlockTip {
    /// A tip for which only the height is known.
    pub fn at_height(height: u64) -> Self {
        Self {
            height,
            header: vec![],
        }
    }

    /// decodes a raw header.  the height is the big-endian `i32` at offset 0.
    pub fn from_header_bytes(header: &[u8]) -> Result<Self, BlockTipError> {
        let height_bytes: [u8; 4] = match header {
            h if h.len() == NODECORE_HEADER_SIZE => [h[0], h[1], h[2], h[3]],
            h => {
                return Err(BlockTipError::InvalidLength {
                    expected: NODECORE_HEADER_SIZE,
                    actual: h.len(),
                })
            }
        };

        let height = i32::from_be_bytes(height_bytes);
        let height = u64::try_from(height).map_err(|_| BlockTipError::NegativeHeight(height))?;

        Ok(Self {
            height,
            header: header.to_vec(),
        })
    }
}
