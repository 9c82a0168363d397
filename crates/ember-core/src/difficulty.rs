//! Difficulty adjustment.
//!
//! Every `difficulty_adjustment_interval` blocks the target bits are
//! recomputed from the time elapsed since the parent was mined
//! (`now - parent.timestamp`):
//!
//! - slower than `block_generation_interval_secs`: remove `difficulty_step_bits` (easier)
//! - faster: add `difficulty_step_bits` (harder)
//! - exactly on time: unchanged
//!
//! At every other height the parent's bits are inherited. The result is
//! always clamped to [`MIN_TARGET_BITS`]..=[`MAX_TARGET_BITS`].

use std::cmp::Ordering;

use crate::block::Block;
use crate::constants::{MAX_TARGET_BITS, MIN_TARGET_BITS};
use crate::params::ChainParams;

/// True when the block following a parent at `parent_height` is retargeted.
pub fn is_adjustment_height(parent_height: u64, params: &ChainParams) -> bool {
    parent_height != 0
        && params.difficulty_adjustment_interval != 0
        && parent_height % params.difficulty_adjustment_interval == 0
}

/// Target bits for the block following `parent`, mined at time `now`.
pub fn next_target_bits(parent: &Block, now: i64, params: &ChainParams) -> u32 {
    if !is_adjustment_height(parent.height(), params) {
        return parent.target_bits();
    }
    let elapsed = now.saturating_sub(parent.timestamp());
    adjusted_target_bits(parent.target_bits(), elapsed, params)
}

/// Apply one retarget step to `current` given the observed block time.
pub fn adjusted_target_bits(current: u32, elapsed_secs: i64, params: &ChainParams) -> u32 {
    let step = params.difficulty_step_bits;
    let bits = match elapsed_secs.cmp(&params.block_generation_interval_secs) {
        Ordering::Greater => current.saturating_sub(step),
        Ordering::Less => current.saturating_add(step),
        Ordering::Equal => current,
    };
    clamp_target_bits(bits)
}

/// Clamp to the valid target bits range.
pub fn clamp_target_bits(bits: u32) -> u32 {
    bits.clamp(MIN_TARGET_BITS, MAX_TARGET_BITS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BLOCK_GENERATION_INTERVAL_SECS;

    fn params() -> ChainParams {
        ChainParams::default()
    }

    /// Mine a short chain with easy bits, `spacing` seconds apart.
    fn chain_of(len: u64, spacing: i64, params: &ChainParams) -> Vec<Block> {
        let mut blocks = vec![Block::new_genesis_at("g", 1_000, params).unwrap()];
        for i in 1..len {
            let parent = blocks.last().unwrap();
            let ts = parent.timestamp() + spacing;
            let next = Block::new_successor_at(format!("b{i}"), parent, ts, params).unwrap();
            blocks.push(next);
        }
        blocks
    }

    // ------------------------------------------------------------------
    // Trigger predicate
    // ------------------------------------------------------------------

    #[test]
    fn genesis_parent_never_triggers() {
        assert!(!is_adjustment_height(0, &params()));
    }

    #[test]
    fn triggers_on_interval_multiples_only() {
        let p = params();
        let triggered: Vec<u64> = (0..=20).filter(|h| is_adjustment_height(*h, &p)).collect();
        assert_eq!(triggered, vec![5, 10, 15, 20]);
    }

    // ------------------------------------------------------------------
    // Step direction
    // ------------------------------------------------------------------

    #[test]
    fn slow_blocks_decrease_bits() {
        assert_eq!(adjusted_target_bits(24, BLOCK_GENERATION_INTERVAL_SECS + 1, &params()), 16);
    }

    #[test]
    fn fast_blocks_increase_bits() {
        assert_eq!(adjusted_target_bits(24, BLOCK_GENERATION_INTERVAL_SECS - 1, &params()), 32);
    }

    #[test]
    fn on_time_blocks_keep_bits() {
        assert_eq!(adjusted_target_bits(24, BLOCK_GENERATION_INTERVAL_SECS, &params()), 24);
    }

    #[test]
    fn negative_elapsed_counts_as_fast() {
        // Clock skew: parent stamped in the future.
        assert_eq!(adjusted_target_bits(24, -30, &params()), 32);
    }

    // ------------------------------------------------------------------
    // Bounds
    // ------------------------------------------------------------------

    #[test]
    fn never_drops_to_zero() {
        assert_eq!(adjusted_target_bits(8, 1_000, &params()), MIN_TARGET_BITS);
        assert_eq!(adjusted_target_bits(1, 1_000, &params()), MIN_TARGET_BITS);
    }

    #[test]
    fn never_exceeds_digest_width() {
        assert_eq!(adjusted_target_bits(252, 0, &params()), MAX_TARGET_BITS);
        assert_eq!(adjusted_target_bits(u32::MAX, 0, &params()), MAX_TARGET_BITS);
    }

    #[test]
    fn clamp_passes_valid_bits() {
        assert_eq!(clamp_target_bits(0), 1);
        assert_eq!(clamp_target_bits(100), 100);
        assert_eq!(clamp_target_bits(300), 256);
    }

    // ------------------------------------------------------------------
    // next_target_bits over real blocks
    // ------------------------------------------------------------------

    #[test]
    fn inherits_between_retargets() {
        let p = params().with_initial_target_bits(4).with_adjustment_interval(3);
        let blocks = chain_of(3, 1, &p);
        // Parent heights 1 and 2 are not multiples of 3.
        assert_eq!(next_target_bits(&blocks[1], 1_000_000, &p), 4);
        assert_eq!(next_target_bits(&blocks[2], 0, &p), 4);
    }

    #[test]
    fn retargets_using_now_minus_parent_timestamp() {
        let p = params()
            .with_initial_target_bits(12)
            .with_adjustment_interval(2)
            .with_step_bits(4);
        let blocks = chain_of(3, 1, &p);
        let parent = &blocks[2];
        assert_eq!(parent.height(), 2);

        // Slow: 100s since the parent.
        assert_eq!(next_target_bits(parent, parent.timestamp() + 100, &p), 8);
        // Fast: 1s since the parent.
        assert_eq!(next_target_bits(parent, parent.timestamp() + 1, &p), 16);
        // Exactly on time.
        assert_eq!(
            next_target_bits(parent, parent.timestamp() + p.block_generation_interval_secs, &p),
            12
        );
    }

    #[test]
    fn successor_blocks_follow_policy() {
        let p = params()
            .with_initial_target_bits(8)
            .with_adjustment_interval(2)
            .with_step_bits(4);
        // 100s spacing: slow, so each retarget removes 4 bits.
        let blocks = chain_of(6, 100, &p);
        let bits: Vec<u32> = blocks.iter().map(|b| b.target_bits()).collect();
        assert_eq!(bits, vec![8, 8, 8, 4, 4, 1]);
    }
}
