//! Block construction.
//!
//! A [`BlockTemplate`] carries the header fields fixed before mining. The only
//! ways to obtain a [`Block`] are mining a template with
//! [`ProofOfWork`](crate::pow::ProofOfWork) or decoding stored bytes, so a
//! half-mined block is never observable and a mined one is never mutated.

use crate::codec;
use crate::difficulty;
use crate::error::{BlockError, CodecError, PowError};
use crate::params::ChainParams;
use crate::pow::ProofOfWork;
use crate::types::Hash256;

/// Current Unix time in seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Header fields of a block that has not been mined yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockTemplate {
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    /// Opaque payload.
    pub data: Vec<u8>,
    /// Parent hash; `None` for genesis.
    pub prev_hash: Option<Hash256>,
    /// Required leading zero bits of the block hash.
    pub target_bits: u32,
    /// Distance from genesis.
    pub height: u64,
}

impl BlockTemplate {
    /// Template for the first block of a chain.
    pub fn genesis(data: impl Into<Vec<u8>>, timestamp: i64, params: &ChainParams) -> Self {
        Self {
            timestamp,
            data: data.into(),
            prev_hash: None,
            target_bits: params.initial_target_bits,
            height: 0,
        }
    }

    /// Template extending `previous`, with target bits chosen by the
    /// difficulty policy as of `timestamp`.
    pub fn successor(
        data: impl Into<Vec<u8>>,
        previous: &Block,
        timestamp: i64,
        params: &ChainParams,
    ) -> Self {
        let target_bits = difficulty::next_target_bits(previous, timestamp, params);
        if target_bits != previous.target_bits {
            tracing::info!(
                height = previous.height + 1,
                elapsed_secs = timestamp.saturating_sub(previous.timestamp),
                from = previous.target_bits,
                to = target_bits,
                "difficulty retarget"
            );
        }
        Self {
            timestamp,
            data: data.into(),
            prev_hash: Some(previous.hash),
            target_bits,
            height: previous.height + 1,
        }
    }
}

/// A mined block.
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Block {
    timestamp: i64,
    data: Vec<u8>,
    prev_hash: Option<Hash256>,
    hash: Hash256,
    target_bits: u32,
    nonce: u64,
    height: u64,
}

impl Block {
    /// Seal a template with the nonce and hash found by mining.
    pub(crate) fn sealed(template: BlockTemplate, nonce: u64, hash: Hash256) -> Self {
        Self {
            timestamp: template.timestamp,
            data: template.data,
            prev_hash: template.prev_hash,
            hash,
            target_bits: template.target_bits,
            nonce,
            height: template.height,
        }
    }

    /// Build and mine a genesis block stamped with the current time.
    pub fn new_genesis(data: impl Into<Vec<u8>>, params: &ChainParams) -> Result<Self, PowError> {
        Self::new_genesis_at(data, unix_now(), params)
    }

    /// Build and mine a genesis block with an explicit timestamp.
    pub fn new_genesis_at(
        data: impl Into<Vec<u8>>,
        timestamp: i64,
        params: &ChainParams,
    ) -> Result<Self, PowError> {
        ProofOfWork::from_params(params).mine(BlockTemplate::genesis(data, timestamp, params))
    }

    /// Build and mine the block following `previous`, stamped with the current time.
    pub fn new_successor(
        data: impl Into<Vec<u8>>,
        previous: &Block,
        params: &ChainParams,
    ) -> Result<Self, PowError> {
        Self::new_successor_at(data, previous, unix_now(), params)
    }

    /// Build and mine the block following `previous` with an explicit timestamp.
    pub fn new_successor_at(
        data: impl Into<Vec<u8>>,
        previous: &Block,
        timestamp: i64,
        params: &ChainParams,
    ) -> Result<Self, PowError> {
        ProofOfWork::from_params(params).mine(BlockTemplate::successor(
            data, previous, timestamp, params,
        ))
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn prev_hash(&self) -> Option<&Hash256> {
        self.prev_hash.as_ref()
    }

    pub fn hash(&self) -> &Hash256 {
        &self.hash
    }

    pub fn target_bits(&self) -> u32 {
        self.target_bits
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.prev_hash.is_none()
    }

    /// Deterministic binary encoding. See [`codec`].
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode_block(self)
    }

    /// Inverse of [`encode`](Self::encode). The result is not validated.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode_block(bytes)
    }

    /// Re-check the proof-of-work and the stored hash.
    pub fn validate(&self) -> Result<(), BlockError> {
        ProofOfWork::check(self)
    }

    /// Check that this block links onto `parent`.
    pub fn validate_successor_of(&self, parent: &Block) -> Result<(), BlockError> {
        if self.prev_hash != Some(parent.hash) {
            return Err(BlockError::InvalidPrevHash);
        }
        if self.height != parent.height + 1 {
            return Err(BlockError::HeightMismatch {
                expected: parent.height + 1,
                got: self.height,
            });
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_nonce_for_test(&mut self, nonce: u64) {
        self.nonce = nonce;
    }
}
