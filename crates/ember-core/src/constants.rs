//! Protocol constants. These are the defaults behind
//! [`ChainParams`](crate::params::ChainParams); tests override them there.

/// Target number of seconds between two blocks.
pub const BLOCK_GENERATION_INTERVAL_SECS: i64 = 10;

/// Number of blocks between difficulty retargets.
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u64 = 5;

/// Bits added or removed by a single retarget (one byte).
pub const DIFFICULTY_STEP_BITS: u32 = 8;

/// Target bits of the genesis block.
pub const INITIAL_TARGET_BITS: u32 = 8;

/// Lowest accepted `target_bits`. Zero would accept every hash.
pub const MIN_TARGET_BITS: u32 = 1;

/// Highest accepted `target_bits`: the digest width.
pub const MAX_TARGET_BITS: u32 = 256;

/// Default upper bound (inclusive) of the nonce search.
pub const MAX_NONCE: u64 = u64::MAX;

/// Largest encoded block the codec will decode.
pub const MAX_BLOCK_SIZE: usize = 16 * 1024 * 1024;

/// Block hash length in bytes.
pub const HASH_LEN: usize = 32;
