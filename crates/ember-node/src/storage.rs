//! RocksDB-backed block metadata index.
//!
//! Implements [`MetadataIndex`] with two column families: `block_meta`
//! (raw hash → bincode [`BlockMetadata`]) and `chain_meta` (the reserved tip
//! keys). An entry and its tip advance are written in one [`WriteBatch`], so a
//! crash can never leave the tip pointing at an unindexed block.

use std::path::Path;

use rocksdb::{ColumnFamily, Options, WriteBatch, DB};

use ember_core::error::StorageError;
use ember_core::traits::MetadataIndex;
use ember_core::types::BlockMetadata;

// --- Column family names ---

const CF_BLOCK_META: &str = "block_meta";
const CF_CHAIN_META: &str = "chain_meta";

const ALL_CFS: &[&str] = &[CF_BLOCK_META, CF_CHAIN_META];

// --- Reserved chain_meta keys ---

const META_TIP_HASH: &[u8] = b"tip_hash";
const META_TIP_HEIGHT: &[u8] = b"tip_height";

fn storage_err(e: rocksdb::Error) -> StorageError {
    StorageError::Io(e.to_string())
}

/// RocksDB-backed [`MetadataIndex`].
pub struct RocksMetadataStore {
    db: Option<DB>,
}

impl std::fmt::Debug for RocksMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksMetadataStore")
            .field("open", &self.db.is_some())
            .finish()
    }
}

impl RocksMetadataStore {
    /// Open or create the index at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let db = DB::open_cf(&db_opts, path.as_ref(), ALL_CFS).map_err(storage_err)?;
        tracing::debug!(path = %path.as_ref().display(), "opened metadata store");
        Ok(Self { db: Some(db) })
    }

    /// Whether [`close`](MetadataIndex::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.db.is_none()
    }

    /// Flush memtables to disk.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db()?.flush().map_err(storage_err)
    }

    // --- Internal helpers ---

    fn db(&self) -> Result<&DB, StorageError> {
        self.db.as_ref().ok_or(StorageError::Closed)
    }

    fn cf_handle<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily, StorageError> {
        db.cf_handle(name)
            .ok_or_else(|| StorageError::Io(format!("missing column family: {name}")))
    }

    fn encode_metadata(metadata: &BlockMetadata) -> Result<Vec<u8>, StorageError> {
        bincode::encode_to_vec(metadata, bincode::config::standard())
            .map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    fn decode_metadata(bytes: &[u8]) -> Result<BlockMetadata, StorageError> {
        let (metadata, _): (BlockMetadata, _) =
            bincode::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        Ok(metadata)
    }
}

impl MetadataIndex for RocksMetadataStore {
    fn save_block_metadata(
        &mut self,
        hash: &[u8],
        metadata: &BlockMetadata,
    ) -> Result<(), StorageError> {
        let advance = match self.tip()? {
            Some((tip_height, _)) => metadata.height > tip_height,
            None => true,
        };

        let db = self.db()?;
        let cf_blocks = Self::cf_handle(db, CF_BLOCK_META)?;
        let cf_chain = Self::cf_handle(db, CF_CHAIN_META)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(cf_blocks, hash, Self::encode_metadata(metadata)?);
        if advance {
            batch.put_cf(cf_chain, META_TIP_HASH, hash);
            batch.put_cf(cf_chain, META_TIP_HEIGHT, metadata.height.to_le_bytes());
        }
        db.write(batch).map_err(storage_err)?;

        tracing::debug!(
            hash = %hex::encode(hash),
            height = metadata.height,
            location = %metadata.location,
            tip_advanced = advance,
            "saved block metadata"
        );
        Ok(())
    }

    fn retrieve_block_metadata(&self, hash: &[u8]) -> Result<BlockMetadata, StorageError> {
        let db = self.db()?;
        let cf = Self::cf_handle(db, CF_BLOCK_META)?;
        match db.get_cf(cf, hash).map_err(storage_err)? {
            Some(bytes) => Self::decode_metadata(&bytes),
            None => Err(StorageError::NotFound(hex::encode(hash))),
        }
    }

    fn tip(&self) -> Result<Option<(u64, Vec<u8>)>, StorageError> {
        let db = self.db()?;
        let cf = Self::cf_handle(db, CF_CHAIN_META)?;
        let hash = db.get_cf(cf, META_TIP_HASH).map_err(storage_err)?;
        let height = db.get_cf(cf, META_TIP_HEIGHT).map_err(storage_err)?;
        match (hash, height) {
            (None, None) => Ok(None),
            (Some(hash), Some(height)) => {
                let height: [u8; 8] = height
                    .as_slice()
                    .try_into()
                    .map_err(|_| StorageError::Corrupt("invalid tip height length".into()))?;
                Ok(Some((u64::from_le_bytes(height), hash)))
            }
            _ => Err(StorageError::Corrupt("partial tip record".into())),
        }
    }

    fn close(&mut self) -> Result<(), StorageError> {
        if let Some(db) = self.db.take() {
            db.flush().map_err(storage_err)?;
            tracing::debug!("closed metadata store");
        }
        Ok(())
    }
}
