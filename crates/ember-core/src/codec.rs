//! Deterministic binary block encoding.
//!
//! bincode 2 with the standard configuration (varint integers, little
//! endian). Field order is fixed by the [`Block`] definition:
//! `timestamp, data, prev_hash, hash, target_bits, nonce, height`.
//! Decoding rejects trailing bytes and inputs above [`MAX_BLOCK_SIZE`].

use bincode::config::{Configuration, Limit, LittleEndian, Varint};

use crate::block::Block;
use crate::constants::MAX_BLOCK_SIZE;
use crate::error::CodecError;

type BlockConfig = Configuration<LittleEndian, Varint, Limit<MAX_BLOCK_SIZE>>;

fn config() -> BlockConfig {
    bincode::config::standard().with_limit::<MAX_BLOCK_SIZE>()
}

/// Encode a block.
pub fn encode_block(block: &Block) -> Result<Vec<u8>, CodecError> {
    let bytes =
        bincode::encode_to_vec(block, config()).map_err(|e| CodecError::Encode(e.to_string()))?;
    if bytes.len() > MAX_BLOCK_SIZE {
        return Err(CodecError::Oversized {
            size: bytes.len(),
            max: MAX_BLOCK_SIZE,
        });
    }
    Ok(bytes)
}

/// Decode a block. The whole input must be consumed.
pub fn decode_block(bytes: &[u8]) -> Result<Block, CodecError> {
    if bytes.len() > MAX_BLOCK_SIZE {
        return Err(CodecError::Oversized {
            size: bytes.len(),
            max: MAX_BLOCK_SIZE,
        });
    }
    let (block, consumed): (Block, usize) = bincode::decode_from_slice(bytes, config())
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    if consumed != bytes.len() {
        return Err(CodecError::TrailingBytes {
            consumed,
            len: bytes.len(),
        });
    }
    Ok(block)
}
