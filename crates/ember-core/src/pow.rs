//! Proof-of-work: SHA-256 nonce search against a leading-zero-bits target.
//!
//! # Hash input
//!
//! Mining and validation hash the same fixed byte layout:
//!
//! ```text
//! prev_hash (0 or 32 bytes) || data || timestamp (i64 LE) || target_bits (u32 LE) || nonce (u64 LE)
//! ```
//!
//! so a block mined by one process validates identically in any other.
//!
//! # Target
//!
//! `target = 2^(256 - target_bits)`. A digest is accepted when, read as a
//! big-endian 256-bit integer, it is strictly below the target. This is the
//! same as requiring `target_bits` leading zero bits.
//!
//! # Parallel search
//!
//! With more than one thread the nonce range is split into interleaved
//! strides. Each worker stops once its next nonce exceeds the smallest hit
//! seen so far, so the smallest satisfying nonce always wins and the result
//! does not depend on the thread count.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use sha2::{Digest, Sha256};

use crate::block::{Block, BlockTemplate};
use crate::constants::{HASH_LEN, MAX_NONCE, MAX_TARGET_BITS, MIN_TARGET_BITS};
use crate::error::{BlockError, PowError};
use crate::params::ChainParams;
use crate::types::Hash256;

/// How often workers poll the cancel flag.
const CANCEL_POLL_MASK: u64 = 0x3FF;

/// Exclusive 256-bit big-endian threshold derived from `target_bits`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Target([u8; HASH_LEN]);

impl Target {
    /// `2^(256 - bits)`. Valid for `bits` in `1..=256`.
    pub fn from_bits(bits: u32) -> Result<Self, PowError> {
        if !(MIN_TARGET_BITS..=MAX_TARGET_BITS).contains(&bits) {
            return Err(PowError::InvalidTargetBits(bits));
        }
        let exponent = (MAX_TARGET_BITS - bits) as usize;
        let mut threshold = [0u8; HASH_LEN];
        threshold[HASH_LEN - 1 - exponent / 8] = 1 << (exponent % 8);
        Ok(Self(threshold))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// True if `digest < target`.
    pub fn is_met_by(&self, digest: &Hash256) -> bool {
        digest.as_bytes() < &self.0
    }
}

/// Hash input without the trailing nonce.
fn header_prefix(
    prev_hash: Option<&Hash256>,
    data: &[u8],
    timestamp: i64,
    target_bits: u32,
) -> Vec<u8> {
    let prev_len = if prev_hash.is_some() { HASH_LEN } else { 0 };
    let mut buf = Vec::with_capacity(prev_len + data.len() + 8 + 4 + 8);
    if let Some(prev) = prev_hash {
        buf.extend_from_slice(prev.as_bytes());
    }
    buf.extend_from_slice(data);
    buf.extend_from_slice(&timestamp.to_le_bytes());
    buf.extend_from_slice(&target_bits.to_le_bytes());
    buf
}

/// Full hash input for a given nonce.
pub fn hash_input(
    prev_hash: Option<&Hash256>,
    data: &[u8],
    timestamp: i64,
    target_bits: u32,
    nonce: u64,
) -> Vec<u8> {
    let mut buf = header_prefix(prev_hash, data, timestamp, target_bits);
    buf.extend_from_slice(&nonce.to_le_bytes());
    buf
}

/// Recompute the digest of a mined block from its stored fields.
pub fn block_digest(block: &Block) -> Hash256 {
    let input = hash_input(
        block.prev_hash(),
        block.data(),
        block.timestamp(),
        block.target_bits(),
        block.nonce(),
    );
    Hash256(Sha256::digest(&input).into())
}

fn digest_with_nonce(prefix: &Sha256, nonce: u64) -> Hash256 {
    let mut hasher = prefix.clone();
    hasher.update(nonce.to_le_bytes());
    Hash256(hasher.finalize().into())
}

enum SearchOutcome {
    Found(u64, Hash256),
    Exhausted,
    Cancelled,
}

/// Proof-of-work miner and validator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofOfWork {
    max_nonce: u64,
    threads: usize,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self {
            max_nonce: MAX_NONCE,
            threads: 1,
        }
    }
}

impl ProofOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: &ChainParams) -> Self {
        Self {
            max_nonce: params.max_nonce,
            threads: params.mining_threads.max(1),
        }
    }

    pub fn with_max_nonce(mut self, max_nonce: u64) -> Self {
        self.max_nonce = max_nonce;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Mine `template`: scan nonces from 0 through `max_nonce` and seal the
    /// block with the first one whose digest is below the target.
    pub fn mine(&self, template: BlockTemplate) -> Result<Block, PowError> {
        self.mine_with_cancel(template, &AtomicBool::new(false))
    }

    /// Like [`mine`](Self::mine), but gives up with [`PowError::Cancelled`]
    /// once `cancel` is set. A cancelled search never yields a block.
    pub fn mine_with_cancel(
        &self,
        template: BlockTemplate,
        cancel: &AtomicBool,
    ) -> Result<Block, PowError> {
        let target = Target::from_bits(template.target_bits)?;
        let prefix = Sha256::new_with_prefix(header_prefix(
            template.prev_hash.as_ref(),
            &template.data,
            template.timestamp,
            template.target_bits,
        ));

        tracing::debug!(
            height = template.height,
            target_bits = template.target_bits,
            threads = self.threads,
            "mining block"
        );

        let outcome = if self.threads == 1 {
            let best = AtomicU64::new(u64::MAX);
            search_stride(&prefix, &target, 0, 1, self.max_nonce, &best, cancel)
        } else {
            self.search_parallel(&prefix, &target, cancel)
        };

        match outcome {
            SearchOutcome::Found(nonce, hash) => {
                tracing::debug!(height = template.height, nonce, %hash, "block mined");
                Ok(Block::sealed(template, nonce, hash))
            }
            SearchOutcome::Exhausted => Err(PowError::MiningExhausted {
                max_nonce: self.max_nonce,
            }),
            SearchOutcome::Cancelled => Err(PowError::Cancelled),
        }
    }

    fn search_parallel(
        &self,
        prefix: &Sha256,
        target: &Target,
        cancel: &AtomicBool,
    ) -> SearchOutcome {
        let best = AtomicU64::new(u64::MAX);
        let stride = self.threads as u64;

        let outcomes: Vec<SearchOutcome> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..stride)
                .map(|start| {
                    let best = &best;
                    scope.spawn(move || {
                        search_stride(prefix, target, start, stride, self.max_nonce, best, cancel)
                    })
                })
                .collect();
            workers
                .into_iter()
                .map(|w| w.join().unwrap_or(SearchOutcome::Cancelled))
                .collect()
        });

        // A cancelled worker may have skipped a smaller nonce.
        if outcomes.iter().any(|o| matches!(o, SearchOutcome::Cancelled)) {
            return SearchOutcome::Cancelled;
        }
        outcomes
            .into_iter()
            .filter_map(|o| match o {
                SearchOutcome::Found(nonce, hash) => Some((nonce, hash)),
                _ => None,
            })
            .min_by_key(|(nonce, _)| *nonce)
            .map_or(SearchOutcome::Exhausted, |(nonce, hash)| {
                SearchOutcome::Found(nonce, hash)
            })
    }

    /// True iff the block's digest, recomputed from its stored fields, is
    /// below the target for its `target_bits`.
    pub fn validate(block: &Block) -> bool {
        match Target::from_bits(block.target_bits()) {
            Ok(target) => target.is_met_by(&block_digest(block)),
            Err(_) => false,
        }
    }

    /// Full check: the digest meets the target and equals the stored hash.
    pub fn check(block: &Block) -> Result<(), BlockError> {
        let target = Target::from_bits(block.target_bits())
            .map_err(|e| BlockError::ValidationFailed(e.to_string()))?;
        let computed = block_digest(block);
        if !target.is_met_by(&computed) {
            return Err(BlockError::ValidationFailed(format!(
                "hash {computed} does not meet {} target bits",
                block.target_bits()
            )));
        }
        if computed != *block.hash() {
            return Err(BlockError::HashMismatch {
                expected: computed.to_string(),
                got: block.hash().to_string(),
            });
        }
        Ok(())
    }
}

/// Scan `start, start + stride, ...` up to `max_nonce`.
fn search_stride(
    prefix: &Sha256,
    target: &Target,
    start: u64,
    stride: u64,
    max_nonce: u64,
    best: &AtomicU64,
    cancel: &AtomicBool,
) -> SearchOutcome {
    if start > max_nonce {
        return SearchOutcome::Exhausted;
    }
    let mut nonce = start;
    let mut tried: u64 = 0;
    loop {
        if tried & CANCEL_POLL_MASK == 0 {
            if cancel.load(Ordering::Relaxed) {
                return SearchOutcome::Cancelled;
            }
            if nonce > best.load(Ordering::Relaxed) {
                return SearchOutcome::Exhausted;
            }
        }
        tried += 1;
        let hash = digest_with_nonce(prefix, nonce);
        if target.is_met_by(&hash) {
            best.fetch_min(nonce, Ordering::Relaxed);
            return SearchOutcome::Found(nonce, hash);
        }
        match nonce.checked_add(stride) {
            Some(next) if next <= max_nonce => nonce = next,
            _ => return SearchOutcome::Exhausted,
        }
    }
}
