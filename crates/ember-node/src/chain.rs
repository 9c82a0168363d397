//! Chain orchestration.
//!
//! [`Chain`] ties a [`MetadataIndex`] and a [`BlockBytes`] store to the
//! proof-of-work engine. It is the single writer of both stores: a block's
//! bytes are written before its metadata, so the index never names a block
//! that cannot be loaded. If the index write fails the freshly written file
//! is removed again.

use std::sync::atomic::AtomicBool;

use tracing::{debug, info, warn};

use ember_core::block::{unix_now, Block, BlockTemplate};
use ember_core::difficulty;
use ember_core::error::{BlockError, ChainError, StorageError};
use ember_core::params::ChainParams;
use ember_core::pow::ProofOfWork;
use ember_core::traits::{BlockBytes, MetadataIndex};
use ember_core::types::{BlockMetadata, Hash256};

use crate::block_files::FsBlockStore;
use crate::config::NodeConfig;
use crate::storage::RocksMetadataStore;

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

/// A single-writer proof-of-work chain over pluggable storage.
pub struct Chain<M, B> {
    index: M,
    blocks: B,
    params: ChainParams,
    pow: ProofOfWork,
    clock: Clock,
}

impl<M, B> std::fmt::Debug for Chain<M, B>
where
    M: std::fmt::Debug,
    B: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("index", &self.index)
            .field("blocks", &self.blocks)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl<M: MetadataIndex, B: BlockBytes> Chain<M, B> {
    /// Wrap already opened stores. Fails if `params` are inconsistent.
    pub fn open(index: M, blocks: B, params: ChainParams) -> Result<Self, ChainError> {
        params.validate()?;
        let chain = Self {
            index,
            blocks,
            pow: ProofOfWork::from_params(&params),
            params,
            clock: Box::new(unix_now),
        };
        match chain.tip()? {
            Some((height, hash)) => info!(height, %hash, "opened chain"),
            None => info!("opened empty chain"),
        }
        Ok(chain)
    }

    /// Replace the wall clock used to timestamp new blocks.
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn index(&self) -> &M {
        &self.index
    }

    pub fn blocks(&self) -> &B {
        &self.blocks
    }

    /// Mutable access to the block store, e.g. for repair tooling.
    pub fn blocks_mut(&mut self) -> &mut B {
        &mut self.blocks
    }

    /// Current tip as `(height, hash)`, or `None` before genesis.
    pub fn tip(&self) -> Result<Option<(u64, Hash256)>, ChainError> {
        match self.index.tip()? {
            None => Ok(None),
            Some((height, raw)) => Ok(Some((height, tip_hash(&raw)?))),
        }
    }

    pub fn is_empty(&self) -> Result<bool, ChainError> {
        Ok(self.index.tip()?.is_none())
    }

    /// Mine and persist the genesis block.
    pub fn create_genesis(&mut self, data: impl Into<Vec<u8>>) -> Result<Block, ChainError> {
        self.create_genesis_with_cancel(data, &AtomicBool::new(false))
    }

    /// As [`create_genesis`](Self::create_genesis), abandoning the search once
    /// `cancel` is set.
    pub fn create_genesis_with_cancel(
        &mut self,
        data: impl Into<Vec<u8>>,
        cancel: &AtomicBool,
    ) -> Result<Block, ChainError> {
        if !self.is_empty()? {
            return Err(ChainError::AlreadyInitialized);
        }
        let template = BlockTemplate::genesis(data, (self.clock)(), &self.params);
        let block = self.pow.mine_with_cancel(template, cancel)?;
        self.persist(&block)?;
        Ok(block)
    }

    /// Mine a block carrying `data` on top of the tip and persist it.
    pub fn append(&mut self, data: impl Into<Vec<u8>>) -> Result<Block, ChainError> {
        self.append_with_cancel(data, &AtomicBool::new(false))
    }

    /// As [`append`](Self::append), abandoning the search once `cancel` is set.
    /// Nothing is written for a cancelled block.
    pub fn append_with_cancel(
        &mut self,
        data: impl Into<Vec<u8>>,
        cancel: &AtomicBool,
    ) -> Result<Block, ChainError> {
        let parent = self.tip_block()?;
        let template = BlockTemplate::successor(data, &parent, (self.clock)(), &self.params);
        let block = self.pow.mine_with_cancel(template, cancel)?;
        self.persist(&block)?;
        Ok(block)
    }

    fn persist(&mut self, block: &Block) -> Result<(), ChainError> {
        let bytes = block.encode()?;
        let location = self.blocks.save_block(&bytes, block.height())?;
        let metadata = BlockMetadata::new(block.height(), location.clone());

        if let Err(e) = self.index.save_block_metadata(block.hash().as_bytes(), &metadata) {
            if let Err(cleanup) = self.blocks.remove_block(&location) {
                warn!(%location, error = %cleanup, "failed to remove unindexed block file");
            }
            return Err(e.into());
        }

        info!(
            height = block.height(),
            hash = %block.hash(),
            target_bits = block.target_bits(),
            nonce = block.nonce(),
            size = bytes.len(),
            "appended block"
        );
        Ok(())
    }

    /// Load, decode and validate the block stored under `hash`.
    pub fn get_block(&self, hash: &Hash256) -> Result<Block, ChainError> {
        let metadata = self.index.retrieve_block_metadata(hash.as_bytes())?;
        let bytes = self.blocks.load_block(&metadata.location)?;
        let block = Block::decode(&bytes)?;

        if block.hash() != hash {
            return Err(BlockError::HashMismatch {
                expected: hash.to_string(),
                got: block.hash().to_string(),
            }
            .into());
        }
        if let Err(e) = block.validate() {
            warn!(%hash, location = %metadata.location, error = %e, "stored block failed validation");
            return Err(e.into());
        }
        if block.height() != metadata.height {
            return Err(BlockError::HeightMismatch {
                expected: metadata.height,
                got: block.height(),
            }
            .into());
        }
        Ok(block)
    }

    /// The block at the tip. [`ChainError::EmptyChain`] before genesis.
    pub fn tip_block(&self) -> Result<Block, ChainError> {
        let (_, hash) = self.tip()?.ok_or(ChainError::EmptyChain)?;
        self.get_block(&hash)
    }

    /// Walk from the tip back to genesis. The first error ends the walk.
    pub fn iter(&self) -> Result<ChainIter<'_, M, B>, ChainError> {
        let next = self.tip()?.map(|(_, hash)| hash);
        Ok(ChainIter { chain: self, next })
    }

    /// Re-validate every block from tip to genesis: proof-of-work, parent
    /// links, heights and the difficulty schedule under the current params.
    /// Returns the number of blocks checked.
    pub fn verify(&self) -> Result<u64, ChainError> {
        let mut child: Option<Block> = None;
        let mut count = 0u64;

        for block in self.iter()? {
            let block = block?;
            if let Some(child) = &child {
                child.validate_successor_of(&block)?;
                let expected = difficulty::next_target_bits(&block, child.timestamp(), &self.params);
                if child.target_bits() != expected {
                    return Err(BlockError::InvalidTargetBits {
                        expected,
                        got: child.target_bits(),
                    }
                    .into());
                }
            }
            count += 1;
            child = Some(block);
        }

        match &child {
            Some(last) if !last.is_genesis() => {
                return Err(BlockError::HeightMismatch {
                    expected: 0,
                    got: last.height(),
                }
                .into());
            }
            _ => {}
        }
        debug!(blocks = count, "chain verified");
        Ok(count)
    }

    /// Close the metadata index. Block files need no teardown.
    pub fn close(mut self) -> Result<(), ChainError> {
        self.index.close()?;
        info!("chain closed");
        Ok(())
    }
}

impl Chain<RocksMetadataStore, FsBlockStore> {
    /// Open the on-disk chain described by `config`.
    pub fn open_default(config: &NodeConfig) -> Result<Self, ChainError> {
        let index = RocksMetadataStore::open(config.metadata_path())?;
        let blocks = FsBlockStore::open(config.blocks_path())?;
        Self::open(index, blocks, config.params.clone())
    }
}

fn tip_hash(raw: &[u8]) -> Result<Hash256, StorageError> {
    Hash256::from_slice(raw)
        .ok_or_else(|| StorageError::Corrupt(format!("tip hash has {} bytes", raw.len())))
}

/// Iterator from the tip back to genesis, yielded by [`Chain::iter`].
pub struct ChainIter<'a, M, B> {
    chain: &'a Chain<M, B>,
    next: Option<Hash256>,
}

impl<M: MetadataIndex, B: BlockBytes> Iterator for ChainIter<'_, M, B> {
    type Item = Result<Block, ChainError>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;
        match self.chain.get_block(&hash) {
            Ok(block) => {
                self.next = block.prev_hash().copied();
                Some(Ok(block))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    use ember_core::error::PowError;
    use ember_core::memory::{MemoryBlockBytes, MemoryMetadataIndex};

    type MemChain = Chain<MemoryMetadataIndex, MemoryBlockBytes>;

    fn easy_params() -> ChainParams {
        ChainParams::default().with_initial_target_bits(4)
    }

    fn mem_chain(params: ChainParams) -> MemChain {
        Chain::open(MemoryMetadataIndex::new(), MemoryBlockBytes::new(), params).unwrap()
    }

    /// Clock that advances by `step` seconds on every read.
    fn stepping_clock(start: i64, step: i64) -> impl Fn() -> i64 + Send + Sync + 'static {
        let now = Arc::new(AtomicI64::new(start));
        move || now.fetch_add(step, Ordering::SeqCst)
    }

    #[test]
    fn open_rejects_invalid_params() {
        let params = ChainParams::default().with_adjustment_interval(0);
        assert!(matches!(
            Chain::open(MemoryMetadataIndex::new(), MemoryBlockBytes::new(), params),
            Err(ChainError::InvalidParams(_))
        ));
    }

    #[test]
    fn empty_chain_has_no_tip() {
        let chain = mem_chain(easy_params());
        assert!(chain.is_empty().unwrap());
        assert!(chain.tip().unwrap().is_none());
        assert!(matches!(chain.tip_block(), Err(ChainError::EmptyChain)));
        assert_eq!(chain.iter().unwrap().count(), 0);
        assert_eq!(chain.verify().unwrap(), 0);
    }

    #[test]
    fn append_requires_genesis() {
        let mut chain = mem_chain(easy_params());
        assert!(matches!(chain.append("x"), Err(ChainError::EmptyChain)));
    }

    #[test]
    fn genesis_only_once() {
        let mut chain = mem_chain(easy_params());
        chain.create_genesis("g").unwrap();
        assert!(matches!(
            chain.create_genesis("again"),
            Err(ChainError::AlreadyInitialized)
        ));
    }

    #[test]
    fn append_moves_tip_and_links_blocks() {
        let mut chain = mem_chain(easy_params());
        let genesis = chain.create_genesis("g").unwrap();
        let b1 = chain.append("one").unwrap();
        let b2 = chain.append("two").unwrap();

        assert_eq!(chain.tip().unwrap(), Some((2, *b2.hash())));
        assert_eq!(b1.prev_hash(), Some(genesis.hash()));
        assert_eq!(b2.prev_hash(), Some(b1.hash()));
        assert_eq!(chain.get_block(b1.hash()).unwrap(), b1);
        assert_eq!(chain.tip_block().unwrap(), b2);
    }

    #[test]
    fn iter_walks_tip_to_genesis() {
        let mut chain = mem_chain(easy_params());
        chain.create_genesis("g").unwrap();
        for i in 0..4 {
            chain.append(format!("b{i}")).unwrap();
        }
        let heights: Vec<u64> = chain
            .iter()
            .unwrap()
            .map(|b| b.unwrap().height())
            .collect();
        assert_eq!(heights, vec![4, 3, 2, 1, 0]);
        assert_eq!(chain.verify().unwrap(), 5);
    }

    #[test]
    fn get_block_unknown_hash_is_not_found() {
        let chain = mem_chain(easy_params());
        assert!(matches!(
            chain.get_block(&Hash256([7; 32])),
            Err(ChainError::Storage(StorageError::NotFound(_)))
        ));
    }

    #[test]
    fn garbage_block_bytes_fail_to_decode() {
        let mut chain = mem_chain(easy_params());
        let genesis = chain.create_genesis("g").unwrap();
        let location = chain
            .index()
            .retrieve_block_location(genesis.hash().as_bytes())
            .unwrap();
        chain.blocks_mut().put_raw(&location, vec![0xff; 3]);
        assert!(matches!(
            chain.get_block(genesis.hash()),
            Err(ChainError::Codec(_))
        ));
    }

    #[test]
    fn swapped_block_bytes_are_a_hash_mismatch() {
        let mut chain = mem_chain(easy_params());
        let genesis = chain.create_genesis("g").unwrap();
        let b1 = chain.append("one").unwrap();
        let location = chain
            .index()
            .retrieve_block_location(b1.hash().as_bytes())
            .unwrap();
        chain.blocks_mut().put_raw(&location, genesis.encode().unwrap());
        assert!(matches!(
            chain.get_block(b1.hash()),
            Err(ChainError::Block(BlockError::HashMismatch { .. }))
        ));
        assert!(chain.verify().is_err());
    }

    #[test]
    fn retarget_raises_bits_when_blocks_come_fast() {
        let params = easy_params()
            .with_adjustment_interval(2)
            .with_step_bits(2)
            .with_block_generation_interval(10);
        // One second between blocks: faster than the 10s target.
        let mut chain = mem_chain(params).with_clock(stepping_clock(1_000, 1));
        chain.create_genesis("g").unwrap();
        let b1 = chain.append("1").unwrap();
        let b2 = chain.append("2").unwrap();
        let b3 = chain.append("3").unwrap();
        assert_eq!(b1.target_bits(), 4);
        assert_eq!(b2.target_bits(), 4);
        // Parent height 2 is a retarget point.
        assert_eq!(b3.target_bits(), 6);
        assert_eq!(chain.verify().unwrap(), 4);
    }

    #[test]
    fn retarget_lowers_bits_when_blocks_come_slow() {
        let params = easy_params()
            .with_adjustment_interval(1)
            .with_step_bits(2)
            .with_block_generation_interval(10);
        let mut chain = mem_chain(params).with_clock(stepping_clock(1_000, 100));
        chain.create_genesis("g").unwrap();
        let b1 = chain.append("1").unwrap();
        let b2 = chain.append("2").unwrap();
        // Height 0 never retargets; height 1 does.
        assert_eq!(b1.target_bits(), 4);
        assert_eq!(b2.target_bits(), 2);
    }

    #[test]
    fn cancelled_append_writes_nothing() {
        let params = easy_params();
        let mut chain = mem_chain(params);
        chain.create_genesis("g").unwrap();
        let cancel = AtomicBool::new(true);
        assert!(matches!(
            chain.append_with_cancel("x", &cancel),
            Err(ChainError::Pow(PowError::Cancelled))
        ));
        assert_eq!(chain.tip().unwrap().map(|(h, _)| h), Some(0));
        assert_eq!(chain.blocks().len(), 1);
    }

    #[test]
    fn exhausted_nonce_space_writes_nothing() {
        let params = ChainParams::default()
            .with_initial_target_bits(64)
            .with_max_nonce(16);
        let mut chain = mem_chain(params);
        assert!(matches!(
            chain.create_genesis("g"),
            Err(ChainError::Pow(PowError::MiningExhausted { max_nonce: 16 }))
        ));
        assert!(chain.is_empty().unwrap());
        assert!(chain.blocks().is_empty());
    }

    #[test]
    fn failed_index_write_removes_block_file() {
        let mut chain = mem_chain(easy_params());
        chain.create_genesis("g").unwrap();
        chain.index.close().unwrap();
        // Closed index: tip lookup fails before mining.
        assert!(matches!(
            chain.append("x"),
            Err(ChainError::Storage(StorageError::Closed))
        ));

        let mut chain = mem_chain(easy_params());
        let block = Block::new_genesis_at("g", 1_000, &easy_params()).unwrap();
        chain.index.close().unwrap();
        assert!(chain.persist(&block).is_err());
        assert!(chain.blocks().is_empty());
    }

    #[test]
    fn close_consumes_chain() {
        let mut chain = mem_chain(easy_params());
        chain.create_genesis("g").unwrap();
        chain.close().unwrap();
    }
}
