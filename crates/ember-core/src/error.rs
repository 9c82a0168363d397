//! Error types for the Ember chain.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PowError {
    #[error("nonce space exhausted: no valid hash for nonces 0..={max_nonce}")] MiningExhausted { max_nonce: u64 },
    #[error("mining cancelled")] Cancelled,
    #[error("invalid target bits: {0}")] InvalidTargetBits(u32),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("proof-of-work validation failed: {0}")] ValidationFailed(String),
    #[error("hash mismatch: expected {expected}, got {got}")] HashMismatch { expected: String, got: String },
    #[error("invalid target bits: expected {expected}, got {got}")] InvalidTargetBits { expected: u32, got: u32 },
    #[error("invalid prev hash")] InvalidPrevHash,
    #[error("height mismatch: expected {expected}, got {got}")] HeightMismatch { expected: u64, got: u64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("encode: {0}")] Encode(String),
    #[error("decode: {0}")] Decode(String),
    #[error("trailing bytes: decoded {consumed} of {len}")] TrailingBytes { consumed: usize, len: usize },
    #[error("oversized: {size} > {max}")] Oversized { size: usize, max: usize },
    #[error("invalid hash: {0}")] InvalidHash(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("not found: {0}")] NotFound(String),
    #[error("empty chain: no block stored")] EmptyChain,
    #[error("store is closed")] Closed,
    #[error("corrupt record: {0}")] Corrupt(String),
    #[error("io: {0}")] Io(String),
}

#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)] Pow(#[from] PowError),
    #[error(transparent)] Block(#[from] BlockError),
    #[error(transparent)] Codec(#[from] CodecError),
    #[error(transparent)] Storage(#[from] StorageError),
    #[error("invalid chain params: {0}")] InvalidParams(String),
    #[error("chain already has a genesis block")] AlreadyInitialized,
    #[error("empty chain: create a genesis block first")] EmptyChain,
}
