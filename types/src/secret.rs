//! Proof blocks submitted with a tip.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width of one secret block in bytes.
pub const BLOCK_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("secret buffer of {len} bytes is not a whole number of 32-byte blocks")]
pub struct BlockLengthError {
    pub len: usize,
}

/// Ordered proof blocks produced by the miner, each rendered as `0x` followed
/// by 64 lowercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratedSecret {
    blocks: Vec<String>,
}

impl GeneratedSecret {
    /// Slice a concatenated secret buffer at 32-byte boundaries, in order.
    pub fn from_buffer(buffer: &[u8]) -> Result<Self, BlockLengthError> {
        if buffer.len() % BLOCK_BYTES != 0 {
            return Err(BlockLengthError { len: buffer.len() });
        }
        let blocks = buffer
            .chunks_exact(BLOCK_BYTES)
            .map(|block| format!("0x{}", hex::encode(block)))
            .collect();
        Ok(Self { blocks })
    }

    #[must_use]
    pub fn blocks(&self) -> &[String] {
        &self.blocks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
