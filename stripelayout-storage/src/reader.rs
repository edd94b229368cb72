//! Block reader traits
//!
//! The capability the layout engine needs from the transport: given a block
//! descriptor, return its content. Implementations own their connections,
//! timeouts and cleanup.

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use stripelayout_core::block_group::LocatedBlock;
use stripelayout_core::error::Result;

/// Retrieval counters
#[derive(Debug, Clone, Default)]
pub struct ReaderStats {
    /// Number of blocks stored
    pub block_count: u64,

    /// Total bytes held
    pub bytes_stored: u64,

    /// Number of block reads served
    pub reads: u64,

    /// Number of block writes
    pub writes: u64,

    /// Bytes returned by reads
    pub bytes_read: u64,
}

impl ReaderStats {
    /// Average bytes per read
    pub fn avg_read_size(&self) -> u64 {
        if self.reads == 0 {
            0
        } else {
            self.bytes_read / self.reads
        }
    }
}

/// Async block reader trait
///
/// All implementations must be Send + Sync so blocks of a group can be
/// fetched concurrently.
pub trait BlockReader: Send + Sync {
    /// Read the full content of a block
    fn read_block<'a>(
        &'a self,
        block: &'a LocatedBlock,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes>> + Send + 'a>>;

    /// Get retrieval statistics
    fn stats<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<ReaderStats>> + Send + 'a>>;
}

/// Synchronous block reader trait (for simpler implementations)
pub trait BlockReaderSync: Send + Sync {
    /// Read the full content of a block
    fn read_block(&self, block: &LocatedBlock) -> Result<Bytes>;

    /// Get retrieval statistics
    fn stats(&self) -> Result<ReaderStats>;
}

/// Wrapper to convert sync reader to async
pub struct AsyncWrapper<T: BlockReaderSync>(pub T);

impl<T: BlockReaderSync + 'static> BlockReader for AsyncWrapper<T> {
    fn read_block<'a>(
        &'a self,
        block: &'a LocatedBlock,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes>> + Send + 'a>> {
        Box::pin(async move { self.0.read_block(block) })
    }

    fn stats<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<ReaderStats>> + Send + 'a>> {
        Box::pin(async move { self.0.stats() })
    }
}
