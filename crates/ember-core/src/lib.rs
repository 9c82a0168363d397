//! # ember-core
//! Block model, proof-of-work and difficulty policy for the Ember chain.
//!
//! - [`block::Block`] — a mined, immutable chain link
//! - [`pow::ProofOfWork`] — nonce search and validation
//! - [`difficulty`] — periodic retargeting of `target_bits`
//! - [`codec`] — deterministic binary encoding of blocks
//! - [`traits`] — storage capabilities implemented by ember-node

pub mod block;
pub mod codec;
pub mod constants;
pub mod difficulty;
pub mod error;
pub mod memory;
pub mod params;
pub mod pow;
pub mod traits;
pub mod types;
