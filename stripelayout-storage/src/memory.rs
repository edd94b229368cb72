//! In-memory block store
//!
//! Stands in for the cluster during tests and the CLI round trip: it stripes
//! written files into data blocks, keeps the block content, and answers
//! location queries with one [`LocatedBlockGroup`] per group. Parity blocks
//! are never materialised. Not persistent.

use crate::reader::{BlockReaderSync, ReaderStats};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use stripelayout_core::block_group::{
    BlockToken, ExtendedBlock, LocatedBlock, LocatedBlockGroup, StorageLocation,
};
use stripelayout_core::error::{Result, StripeError};
use stripelayout_core::stripe::stripe_file;
use stripelayout_core::StripingConfig;
use tracing::{debug, info};

/// Pool id reported for every block
pub const MEMORY_POOL_ID: &str = "BP-memory";

/// First block id handed out
const FIRST_BLOCK_ID: u64 = 1 << 20;

/// Generation stamp reported for every block
const GENERATION_STAMP: u64 = 1001;

/// Base port of the synthetic per-node transfer addresses
const XFER_PORT_BASE: u16 = 9866;

#[derive(Debug, Clone)]
struct StoredFile {
    len: u64,
    groups: Vec<LocatedBlockGroup>,
}

/// In-memory block store
pub struct MemoryBlockStore {
    config: StripingConfig,

    /// Block content by block id
    blocks: RwLock<HashMap<u64, Bytes>>,

    /// Located groups by file path
    files: RwLock<HashMap<String, StoredFile>>,

    next_block_id: AtomicU64,

    /// Operation counters
    reads: AtomicU64,
    writes: AtomicU64,
    bytes_read: AtomicU64,
}

impl MemoryBlockStore {
    /// Create an empty store striping files with `config`
    pub fn new(config: StripingConfig) -> Self {
        Self::with_first_block_id(config, FIRST_BLOCK_ID)
    }

    /// Create an empty store that hands out block ids from `first_block_id`
    pub fn with_first_block_id(config: StripingConfig, first_block_id: u64) -> Self {
        Self {
            config,
            blocks: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
            next_block_id: AtomicU64::new(first_block_id),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &StripingConfig {
        &self.config
    }

    /// Stripe `data` into block groups and store it under `path`.
    ///
    /// Every data block is located, including empty ones past the end of a
    /// short group; only non-empty blocks hold content. Rewriting a path
    /// releases the blocks of the previous content. Returns the number of
    /// groups written.
    pub fn write_file(&self, path: &str, data: &[u8]) -> Result<usize> {
        let width = self.config.total_blocks() as u64;
        let group_capacity = self.config.group_data_capacity();
        let striped = stripe_file(&self.config, data)?;
        let first_id = self.allocate_block_ids(striped.len() as u64 * width)?;
        let mut groups = Vec::with_capacity(striped.len());

        {
            let mut blocks = self.blocks.write();
            for (g, data_blocks) in striped.into_iter().enumerate() {
                let base_id = first_id + g as u64 * width;
                let group_len = self.config.group_data_length(data.len() as u64, g as u64);

                let mut locations = Vec::with_capacity(data_blocks.len());
                let mut block_indices = Vec::with_capacity(data_blocks.len());
                for (i, buf) in data_blocks.into_iter().enumerate() {
                    locations.push(node_location(i));
                    block_indices.push(i as u8);
                    if !buf.is_empty() {
                        blocks.insert(base_id + i as u64, buf);
                        self.writes.fetch_add(1, Ordering::Relaxed);
                    }
                }

                groups.push(LocatedBlockGroup {
                    block: ExtendedBlock::new(MEMORY_POOL_ID, base_id, group_len, GENERATION_STAMP),
                    start_offset: g as u64 * group_capacity,
                    locations,
                    block_indices,
                    token: BlockToken(Bytes::from(format!("token-{}", base_id))),
                });
            }
        }

        let count = groups.len();
        info!(path, bytes = data.len(), groups = count, "Wrote striped file");
        let previous = self.files.write().insert(
            path.to_string(),
            StoredFile {
                len: data.len() as u64,
                groups,
            },
        );
        if let Some(previous) = previous {
            debug!(path, groups = previous.groups.len(), "Released overwritten file");
            self.remove_groups(&previous.groups);
        }
        Ok(count)
    }

    /// Reserve `count` consecutive block ids, returning the first
    fn allocate_block_ids(&self, count: u64) -> Result<u64> {
        self.next_block_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| {
                next.checked_add(count)
            })
            .map_err(|next| {
                StripeError::Storage(format!(
                    "block id space exhausted: cannot allocate {} ids from {}",
                    count, next
                ))
            })
    }

    fn remove_groups(&self, groups: &[LocatedBlockGroup]) {
        let width = self.config.total_blocks() as u64;
        let mut blocks = self.blocks.write();
        for group in groups {
            for id in group.block.block_id..group.block.block_id + width {
                blocks.remove(&id);
            }
        }
    }

    /// Reported length of a stored file
    pub fn file_length(&self, path: &str) -> Result<u64> {
        self.files
            .read()
            .get(path)
            .map(|f| f.len)
            .ok_or_else(|| StripeError::FileNotFound(path.to_string()))
    }

    /// Located block groups of a stored file, in file order
    pub fn located_block_groups(&self, path: &str) -> Result<Vec<LocatedBlockGroup>> {
        self.files
            .read()
            .get(path)
            .map(|f| f.groups.clone())
            .ok_or_else(|| StripeError::FileNotFound(path.to_string()))
    }

    /// Store raw content for a block id, replacing any previous content
    pub fn put_block(&self, block_id: u64, data: Bytes) {
        self.blocks.write().insert(block_id, data);
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Overwrite one byte of a stored block
    pub fn corrupt_byte(&self, block_id: u64, offset: usize, value: u8) -> Result<()> {
        let mut blocks = self.blocks.write();
        let block = blocks
            .get_mut(&block_id)
            .ok_or(StripeError::BlockNotFound(block_id))?;
        if offset >= block.len() {
            return Err(StripeError::OffsetOutOfRange {
                offset: offset as u64,
                capacity: block.len() as u64,
            });
        }
        let mut data = block.to_vec();
        data[offset] = value;
        *block = Bytes::from(data);
        debug!(block_id, offset, value, "Corrupted block byte");
        Ok(())
    }

    /// Remove a block, as if its storage node had lost it
    pub fn drop_block(&self, block_id: u64) -> bool {
        self.blocks.write().remove(&block_id).is_some()
    }

    /// Remove a file and its blocks
    pub fn delete_file(&self, path: &str) -> Result<()> {
        let file = self
            .files
            .write()
            .remove(path)
            .ok_or_else(|| StripeError::FileNotFound(path.to_string()))?;
        self.remove_groups(&file.groups);
        Ok(())
    }
}

fn node_location(index: usize) -> StorageLocation {
    StorageLocation::new(
        format!("memory-node-{}", index),
        format!("127.0.0.1:{}", XFER_PORT_BASE as usize + index),
    )
}

impl BlockReaderSync for MemoryBlockStore {
    fn read_block(&self, block: &LocatedBlock) -> Result<Bytes> {
        let id = block.block.block_id;
        let data = self
            .blocks
            .read()
            .get(&id)
            .cloned()
            .ok_or(StripeError::BlockNotFound(id))?;

        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(data)
    }

    fn stats(&self) -> Result<ReaderStats> {
        let blocks = self.blocks.read();
        Ok(ReaderStats {
            block_count: blocks.len() as u64,
            bytes_stored: blocks.values().map(|b| b.len() as u64).sum(),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stripelayout_core::{split_block_group, ByteOracle};

    fn store() -> MemoryBlockStore {
        MemoryBlockStore::new(StripingConfig::new(16, 3, 2, 2).unwrap())
    }

    #[test]
    fn test_write_and_locate() {
        let store = store();
        let data = ByteOracle::default().generate(100);
        assert_eq!(store.write_file("/a", &data).unwrap(), 2);
        assert_eq!(store.file_length("/a").unwrap(), 100);

        let groups = store.located_block_groups("/a").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].block.num_bytes, 96);
        assert_eq!(groups[1].block.num_bytes, 4);
        assert_eq!(groups[1].start_offset, 96);
        assert_eq!(groups[1].block.block_id - groups[0].block.block_id, 5);
        assert_eq!(groups[0].block_indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_read_block() {
        let store = store();
        let data = ByteOracle::default().generate(40);
        store.write_file("/b", &data).unwrap();

        let group = &store.located_block_groups("/b").unwrap()[0];
        let blocks = split_block_group(group, store.config()).unwrap();
        let b1 = blocks[1].as_ref().unwrap();
        assert_eq!(store.read_block(b1).unwrap().as_ref(), &data[16..32]);

        let b2 = blocks[2].as_ref().unwrap();
        assert_eq!(b2.block.num_bytes, 8);
        assert_eq!(store.read_block(b2).unwrap().as_ref(), &data[32..40]);

        let stats = store.stats().unwrap();
        assert_eq!(stats.reads, 2);
        assert_eq!(stats.bytes_read, 24);
        assert_eq!(stats.block_count, 3);
        assert_eq!(stats.avg_read_size(), 12);
    }

    #[test]
    fn test_empty_blocks_not_stored() {
        let store = store();
        store.write_file("/c", &[7u8; 5]).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.block_count, 1);
        assert_eq!(stats.bytes_stored, 5);
    }

    #[test]
    fn test_missing_file_and_block() {
        let store = store();
        assert!(matches!(
            store.file_length("/nope"),
            Err(StripeError::FileNotFound(_))
        ));
        assert!(matches!(
            store.corrupt_byte(1, 0, 0),
            Err(StripeError::BlockNotFound(1))
        ));
    }

    #[test]
    fn test_corrupt_and_delete() {
        let store = store();
        store.write_file("/d", &[1u8; 20]).unwrap();
        let base = store.located_block_groups("/d").unwrap()[0].block.block_id;

        store.corrupt_byte(base, 3, 0xAA).unwrap();
        assert!(store.corrupt_byte(base, 16, 0).is_err());

        store.delete_file("/d").unwrap();
        assert_eq!(store.stats().unwrap().block_count, 0);
        assert!(store.delete_file("/d").is_err());
    }

    #[test]
    fn test_overwrite_releases_old_blocks() {
        let store = store();
        let data = ByteOracle::default().generate(100);
        store.write_file("/e", &data).unwrap();
        let before = store.stats().unwrap().block_count;
        let old_base = store.located_block_groups("/e").unwrap()[0].block.block_id;

        store.write_file("/e", &data).unwrap();
        assert_eq!(store.stats().unwrap().block_count, before);
        let new_base = store.located_block_groups("/e").unwrap()[0].block.block_id;
        assert_ne!(old_base, new_base);

        // shorter content leaves nothing of the first write behind
        store.write_file("/e", &data[..10]).unwrap();
        assert_eq!(store.stats().unwrap().block_count, 1);

        store.delete_file("/e").unwrap();
        assert_eq!(store.stats().unwrap().block_count, 0);
    }

    #[test]
    fn test_block_id_exhaustion() {
        let config = StripingConfig::new(16, 3, 2, 2).unwrap();
        let store = MemoryBlockStore::with_first_block_id(config, u64::MAX - 7);

        // one group takes five ids
        store.write_file("/f", &[1u8; 10]).unwrap();
        let err = store.write_file("/g", &[1u8; 10]).unwrap_err();
        assert!(matches!(err, StripeError::Storage(_)));
        assert!(store.file_length("/g").is_err());
        assert_eq!(store.stats().unwrap().block_count, 1);
    }
}
