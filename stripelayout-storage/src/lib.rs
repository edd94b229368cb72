//! stripelayout block retrieval
//!
//! Provides the retrieval side of the layout engine:
//! - `BlockReader` trait for pluggable block transports
//! - `MemoryBlockStore` for testing and the CLI round trip
//! - Group and file fetch helpers built on the layout core

pub mod fetch;
pub mod memory;
pub mod reader;

pub use fetch::{fetch_file, fetch_group, read_file};
pub use memory::MemoryBlockStore;
pub use reader::{AsyncWrapper, BlockReader, BlockReaderSync, ReaderStats};
