//! stripelayout core library
//!
//! Layout engine for erasure-coded striped files. This crate provides:
//! - Offset mapping between logical file positions and (block, offset) pairs
//! - Block group splitting into data and parity block descriptors
//! - Stripe placement and reassembly of block buffers
//! - Verification of retrieved block content against a byte oracle
//!
//! Everything here is pure and free of I/O. Retrieval of block content lives
//! in `stripelayout-storage`.

pub mod block_group;
pub mod config;
pub mod error;
pub mod layout;
pub mod oracle;
pub mod stripe;
pub mod verify;

pub use block_group::{
    split_block_group, BlockToken, ExtendedBlock, LocatedBlock, LocatedBlockGroup, StorageLocation,
};
pub use config::StripingConfig;
pub use error::{Mismatch, Result, StripeError};
pub use layout::{
    logical_offset_to_physical, physical_to_logical_offset_in_group, BlockRole, CellLocation,
};
pub use oracle::ByteOracle;
pub use stripe::{assemble_group, stripe_file, stripe_group, GroupBuffers};
pub use verify::{StripeVerifier, VerificationReport};

/// Default layout: 64 KB cells, 6 data + 3 parity blocks, 4 stripes per block.
///
/// Override at runtime via the `STRIPE_*` env vars, see [`StripingConfig::from_env`].
pub const DEFAULT_CELL_SIZE: u64 = 64 * 1024;
pub const DEFAULT_DATA_BLOCKS: usize = 6;
pub const DEFAULT_PARITY_BLOCKS: usize = 3;
pub const DEFAULT_STRIPES_PER_BLOCK: u64 = 4;

/// Modulus of the default byte oracle
pub const DEFAULT_ORACLE_MODULUS: u64 = 29;
