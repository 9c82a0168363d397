//! # ember-node — Persistent chain: RocksDB index, block files, orchestration.
//!
//! - [`storage::RocksMetadataStore`] — block metadata index and tip pointer in RocksDB
//! - [`block_files::FsBlockStore`] — one file per encoded block
//! - [`chain::Chain`] — mining, persistence and retrieval over both stores
//! - [`config::NodeConfig`] — node configuration

pub mod block_files;
pub mod chain;
pub mod config;
pub mod storage;

pub use block_files::FsBlockStore;
pub use chain::{Chain, ChainIter};
pub use config::NodeConfig;
pub use storage::RocksMetadataStore;
