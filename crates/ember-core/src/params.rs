//! Tunable chain policy.
//!
//! Block timing, retarget cadence and the nonce search bound are carried in
//! [`ChainParams`] instead of being read from constants directly, so tests can
//! run the whole pipeline with tiny intervals and easy targets.

use serde::{Deserialize, Serialize};

use crate::constants::{
    BLOCK_GENERATION_INTERVAL_SECS, DIFFICULTY_ADJUSTMENT_INTERVAL, DIFFICULTY_STEP_BITS,
    INITIAL_TARGET_BITS, MAX_NONCE, MAX_TARGET_BITS, MIN_TARGET_BITS,
};
use crate::error::ChainError;

/// Chain policy shared by block construction, mining and retargeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainParams {
    /// Target seconds between blocks.
    pub block_generation_interval_secs: i64,
    /// Retarget every this many blocks.
    pub difficulty_adjustment_interval: u64,
    /// Bits added or removed per retarget.
    pub difficulty_step_bits: u32,
    /// Target bits of the genesis block.
    pub initial_target_bits: u32,
    /// Inclusive upper bound of the nonce search.
    pub max_nonce: u64,
    /// Worker threads used by the nonce search.
    pub mining_threads: usize,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            block_generation_interval_secs: BLOCK_GENERATION_INTERVAL_SECS,
            difficulty_adjustment_interval: DIFFICULTY_ADJUSTMENT_INTERVAL,
            difficulty_step_bits: DIFFICULTY_STEP_BITS,
            initial_target_bits: INITIAL_TARGET_BITS,
            max_nonce: MAX_NONCE,
            mining_threads: 1,
        }
    }
}

impl ChainParams {
    pub fn with_initial_target_bits(mut self, bits: u32) -> Self {
        self.initial_target_bits = bits;
        self
    }

    pub fn with_block_generation_interval(mut self, secs: i64) -> Self {
        self.block_generation_interval_secs = secs;
        self
    }

    pub fn with_adjustment_interval(mut self, blocks: u64) -> Self {
        self.difficulty_adjustment_interval = blocks;
        self
    }

    pub fn with_step_bits(mut self, bits: u32) -> Self {
        self.difficulty_step_bits = bits;
        self
    }

    pub fn with_max_nonce(mut self, max_nonce: u64) -> Self {
        self.max_nonce = max_nonce;
        self
    }

    pub fn with_mining_threads(mut self, threads: usize) -> Self {
        self.mining_threads = threads;
        self
    }

    /// Reject parameter sets the chain cannot run with.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.difficulty_adjustment_interval == 0 {
            return Err(ChainError::InvalidParams(
                "difficulty_adjustment_interval must be non-zero".into(),
            ));
        }
        if !(MIN_TARGET_BITS..=MAX_TARGET_BITS).contains(&self.initial_target_bits) {
            return Err(ChainError::InvalidParams(format!(
                "initial_target_bits {} outside {MIN_TARGET_BITS}..={MAX_TARGET_BITS}",
                self.initial_target_bits
            )));
        }
        if self.block_generation_interval_secs < 0 {
            return Err(ChainError::InvalidParams(
                "block_generation_interval_secs must not be negative".into(),
            ));
        }
        if self.mining_threads == 0 {
            return Err(ChainError::InvalidParams("mining_threads must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let p = ChainParams::default();
        assert_eq!(p.block_generation_interval_secs, 10);
        assert_eq!(p.difficulty_adjustment_interval, 5);
        assert_eq!(p.difficulty_step_bits, 8);
        assert_eq!(p.initial_target_bits, 8);
        assert_eq!(p.max_nonce, u64::MAX);
        assert_eq!(p.mining_threads, 1);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn builders_override_fields() {
        let p = ChainParams::default()
            .with_initial_target_bits(4)
            .with_block_generation_interval(60)
            .with_adjustment_interval(2)
            .with_step_bits(4)
            .with_max_nonce(1000)
            .with_mining_threads(3);
        assert_eq!(p.initial_target_bits, 4);
        assert_eq!(p.block_generation_interval_secs, 60);
        assert_eq!(p.difficulty_adjustment_interval, 2);
        assert_eq!(p.difficulty_step_bits, 4);
        assert_eq!(p.max_nonce, 1000);
        assert_eq!(p.mining_threads, 3);
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let p = ChainParams::default().with_adjustment_interval(0);
        assert!(matches!(p.validate(), Err(ChainError::InvalidParams(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_bits() {
        assert!(ChainParams::default().with_initial_target_bits(0).validate().is_err());
        assert!(ChainParams::default().with_initial_target_bits(257).validate().is_err());
        assert!(ChainParams::default().with_initial_target_bits(256).validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_threads() {
        assert!(ChainParams::default().with_mining_threads(0).validate().is_err());
    }
}
