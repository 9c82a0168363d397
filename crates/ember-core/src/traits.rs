//! Storage capabilities the chain depends on.
//!
//! Persistence is split in two independent capabilities so either side can
//! be swapped without touching chain logic:
//! - [`MetadataIndex`] — hash → {height, location} plus the chain tip
//!   (ember-node implements it over RocksDB)
//! - [`BlockBytes`] — raw encoded blocks addressed by generated names
//!   (ember-node implements it over a directory of files)
//!
//! Keys at this boundary are raw hash bytes.

use crate::error::StorageError;
use crate::types::BlockMetadata;

/// Persistent index from block hash to [`BlockMetadata`], plus the tip pointer.
pub trait MetadataIndex {
    /// Insert or overwrite `hash → metadata`.
    ///
    /// The tip advances to `hash` only if `metadata.height` is strictly greater
    /// than the current tip height, or the index is empty. The entry and the
    /// tip move together atomically.
    fn save_block_metadata(
        &mut self,
        hash: &[u8],
        metadata: &BlockMetadata,
    ) -> Result<(), StorageError>;

    /// Full metadata for `hash`. [`StorageError::NotFound`] if absent.
    fn retrieve_block_metadata(&self, hash: &[u8]) -> Result<BlockMetadata, StorageError>;

    /// Storage location for `hash`. [`StorageError::NotFound`] if absent.
    fn retrieve_block_location(&self, hash: &[u8]) -> Result<String, StorageError> {
        Ok(self.retrieve_block_metadata(hash)?.location)
    }

    /// Current tip as `(height, hash)`, or `None` if nothing was saved yet.
    fn tip(&self) -> Result<Option<(u64, Vec<u8>)>, StorageError>;

    /// Hash of the current tip. [`StorageError::EmptyChain`] if nothing was saved yet.
    fn last_used_hash(&self) -> Result<Vec<u8>, StorageError> {
        self.tip()?
            .map(|(_, hash)| hash)
            .ok_or(StorageError::EmptyChain)
    }

    /// Release the underlying handle. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), StorageError>;
}

/// Raw block storage addressed by generated, filesystem-safe names.
pub trait BlockBytes {
    /// Durably write `bytes` for the block at `height`; returns its location.
    fn save_block(&mut self, bytes: &[u8], height: u64) -> Result<String, StorageError>;

    /// Bytes previously written at `location`. [`StorageError::NotFound`] if absent.
    fn load_block(&self, location: &str) -> Result<Vec<u8>, StorageError>;

    /// Delete the block at `location`. Missing locations are not an error.
    fn remove_block(&mut self, location: &str) -> Result<(), StorageError>;
}

/// Location name for the block at `height`.
pub fn block_file_name(height: u64) -> String {
    format!("block_{height:010}.dat")
}
