//! In-memory storage backends.
//!
//! [`MemoryMetadataIndex`] and [`MemoryBlockBytes`] implement the storage
//! traits with hash maps. They are used in tests; the node persists with
//! RocksDB and block files (ember-node).

use std::collections::HashMap;

use crate::error::StorageError;
use crate::traits::{block_file_name, BlockBytes, MetadataIndex};
use crate::types::BlockMetadata;

/// Hash-map backed [`MetadataIndex`].
#[derive(Debug, Default)]
pub struct MemoryMetadataIndex {
    entries: HashMap<Vec<u8>, BlockMetadata>,
    tip: Option<(u64, Vec<u8>)>,
    closed: bool,
}

impl MemoryMetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed blocks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

impl MetadataIndex for MemoryMetadataIndex {
    fn save_block_metadata(
        &mut self,
        hash: &[u8],
        metadata: &BlockMetadata,
    ) -> Result<(), StorageError> {
        self.ensure_open()?;
        let advance = match &self.tip {
            Some((tip_height, _)) => metadata.height > *tip_height,
            None => true,
        };
        self.entries.insert(hash.to_vec(), metadata.clone());
        if advance {
            self.tip = Some((metadata.height, hash.to_vec()));
        }
        Ok(())
    }

    fn retrieve_block_metadata(&self, hash: &[u8]) -> Result<BlockMetadata, StorageError> {
        self.ensure_open()?;
        self.entries
            .get(hash)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(hex::encode(hash)))
    }

    fn tip(&self) -> Result<Option<(u64, Vec<u8>)>, StorageError> {
        self.ensure_open()?;
        Ok(self.tip.clone())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.closed = true;
        Ok(())
    }
}

/// Hash-map backed [`BlockBytes`].
#[derive(Debug, Default)]
pub struct MemoryBlockBytes {
    blocks: HashMap<String, Vec<u8>>,
}

impl MemoryBlockBytes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Overwrite the bytes at `location`, e.g. to simulate corruption.
    pub fn put_raw(&mut self, location: &str, bytes: Vec<u8>) {
        self.blocks.insert(location.to_string(), bytes);
    }
}

impl BlockBytes for MemoryBlockBytes {
    fn save_block(&mut self, bytes: &[u8], height: u64) -> Result<String, StorageError> {
        let location = block_file_name(height);
        self.blocks.insert(location.clone(), bytes.to_vec());
        Ok(location)
    }

    fn load_block(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        self.blocks
            .get(location)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(location.to_string()))
    }

    fn remove_block(&mut self, location: &str) -> Result<(), StorageError> {
        self.blocks.remove(location);
        Ok(())
    }
}
