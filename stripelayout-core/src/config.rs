//! Striping configuration
//!
//! A block group spans `data_blocks + parity_blocks` physical blocks. Each
//! block holds `stripes_per_block` cells of `cell_size` bytes, so a group
//! carries `cell_size * stripes_per_block * data_blocks` logical bytes.

use crate::error::{Result, StripeError};
use crate::{DEFAULT_CELL_SIZE, DEFAULT_DATA_BLOCKS, DEFAULT_PARITY_BLOCKS, DEFAULT_STRIPES_PER_BLOCK};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Environment variables read by [`StripingConfig::from_env`]
pub const CELL_SIZE_ENV: &str = "STRIPE_CELL_SIZE";
pub const DATA_BLOCKS_ENV: &str = "STRIPE_DATA_BLOCKS";
pub const PARITY_BLOCKS_ENV: &str = "STRIPE_PARITY_BLOCKS";
pub const STRIPES_PER_BLOCK_ENV: &str = "STRIPE_STRIPES_PER_BLOCK";

/// Parse `name` from the environment. Unset or unparsable values give `default`.
pub fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Immutable striping layout parameters, fixed when a file is created.
///
/// Only constructed through [`StripingConfig::new`], so every instance
/// satisfies [`StripingConfig::validate`]. Deserialization goes through the
/// same check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStripingConfig")]
pub struct StripingConfig {
    cell_size: u64,
    data_blocks: usize,
    parity_blocks: usize,
    stripes_per_block: u64,
}

/// Unchecked wire form of [`StripingConfig`]
#[derive(Deserialize)]
struct RawStripingConfig {
    cell_size: u64,
    data_blocks: usize,
    parity_blocks: usize,
    stripes_per_block: u64,
}

impl TryFrom<RawStripingConfig> for StripingConfig {
    type Error = StripeError;

    fn try_from(raw: RawStripingConfig) -> Result<Self> {
        Self::new(
            raw.cell_size,
            raw.data_blocks,
            raw.parity_blocks,
            raw.stripes_per_block,
        )
    }
}

impl Default for StripingConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            data_blocks: DEFAULT_DATA_BLOCKS,
            parity_blocks: DEFAULT_PARITY_BLOCKS,
            stripes_per_block: DEFAULT_STRIPES_PER_BLOCK,
        }
    }
}

impl StripingConfig {
    /// Create a new striping config
    pub fn new(
        cell_size: u64,
        data_blocks: usize,
        parity_blocks: usize,
        stripes_per_block: u64,
    ) -> Result<Self> {
        let config = Self {
            cell_size,
            data_blocks,
            parity_blocks,
            stripes_per_block,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the layout invariants
    pub fn validate(&self) -> Result<()> {
        if self.cell_size == 0 {
            return Err(StripeError::Configuration(
                "cell_size must be > 0".to_string(),
            ));
        }
        if self.data_blocks == 0 {
            return Err(StripeError::Configuration(
                "data_blocks must be > 0".to_string(),
            ));
        }
        if self.stripes_per_block == 0 {
            return Err(StripeError::Configuration(
                "stripes_per_block must be > 0".to_string(),
            ));
        }
        if self.data_blocks + self.parity_blocks > u8::MAX as usize + 1 {
            return Err(StripeError::Configuration(format!(
                "group width {} exceeds {}",
                self.data_blocks + self.parity_blocks,
                u8::MAX as usize + 1
            )));
        }
        if self
            .cell_size
            .checked_mul(self.stripes_per_block)
            .and_then(|c| c.checked_mul(self.data_blocks as u64))
            .is_none()
        {
            return Err(StripeError::Configuration(
                "group capacity overflows u64".to_string(),
            ));
        }
        Ok(())
    }

    /// Read the layout from environment, falling back to defaults.
    ///
    /// Honours `STRIPE_CELL_SIZE`, `STRIPE_DATA_BLOCKS`, `STRIPE_PARITY_BLOCKS`
    /// and `STRIPE_STRIPES_PER_BLOCK`.
    pub fn from_env() -> Result<Self> {
        Self::new(
            env_or(CELL_SIZE_ENV, DEFAULT_CELL_SIZE),
            env_or(DATA_BLOCKS_ENV, DEFAULT_DATA_BLOCKS),
            env_or(PARITY_BLOCKS_ENV, DEFAULT_PARITY_BLOCKS),
            env_or(STRIPES_PER_BLOCK_ENV, DEFAULT_STRIPES_PER_BLOCK),
        )
    }

    /// Bytes per cell
    pub fn cell_size(&self) -> u64 {
        self.cell_size
    }

    /// Number of data blocks per group (D)
    pub fn data_blocks(&self) -> usize {
        self.data_blocks
    }

    /// Number of parity blocks per group (P)
    pub fn parity_blocks(&self) -> usize {
        self.parity_blocks
    }

    /// Cells stored in one block
    pub fn stripes_per_block(&self) -> u64 {
        self.stripes_per_block
    }

    /// Total number of blocks in a group (D + P)
    pub fn total_blocks(&self) -> usize {
        self.data_blocks + self.parity_blocks
    }

    /// Nominal bytes per block
    pub fn block_capacity(&self) -> u64 {
        self.cell_size * self.stripes_per_block
    }

    /// Logical bytes covered by one full stripe
    pub fn stripe_data_size(&self) -> u64 {
        self.cell_size * self.data_blocks as u64
    }

    /// Logical bytes covered by one full block group
    pub fn group_data_capacity(&self) -> u64 {
        self.block_capacity() * self.data_blocks as u64
    }

    /// Storage overhead ratio (parity/data)
    pub fn overhead_ratio(&self) -> f64 {
        self.parity_blocks as f64 / self.data_blocks as f64
    }
}
