//! Layout calculator
//!
//! Maps logical byte positions to physical cells and back. Within a group,
//! cells are distributed round-robin across the data blocks:
//!
//! ```text
//!            block 0   block 1   ...  block D-1
//! stripe 0   cell 0    cell 1    ...  cell D-1
//! stripe 1   cell D    cell D+1  ...  cell 2D-1
//! ```
//!
//! The two free functions are total and exact inverses of each other for
//! `block_index < data_blocks`. The checked helpers on [`StripingConfig`]
//! reject coordinates outside the group.

use crate::config::StripingConfig;
use crate::error::{Result, StripeError};
use serde::{Deserialize, Serialize};

/// Map a group-relative logical offset to `(block_index, offset_in_block)`.
pub fn logical_offset_to_physical(pos: u64, cell_size: u64, data_blocks: usize) -> (usize, u64) {
    let stripe_size = cell_size * data_blocks as u64;
    let stripe_index = pos / stripe_size;
    let offset_in_stripe = pos % stripe_size;
    let block_index = (offset_in_stripe / cell_size) as usize;
    let offset_in_cell = offset_in_stripe % cell_size;
    (block_index, stripe_index * cell_size + offset_in_cell)
}

/// Map an offset inside data block `block_index` back to its group-relative
/// logical offset.
pub fn physical_to_logical_offset_in_group(
    offset_in_block: u64,
    block_index: usize,
    cell_size: u64,
    data_blocks: usize,
) -> u64 {
    let stripe_index = offset_in_block / cell_size;
    let offset_in_cell = offset_in_block % cell_size;
    stripe_index * cell_size * data_blocks as u64 + block_index as u64 * cell_size + offset_in_cell
}

/// Whether a block holds original content or redundancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockRole {
    Data,
    Parity,
}

/// Full physical coordinate of one logical file byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellLocation {
    /// Block group index within the file
    pub group: u64,
    /// Data block index within the group
    pub block: usize,
    /// Stripe index (cell index within the block)
    pub stripe: u64,
    /// Byte offset within the cell
    pub offset_in_cell: u64,
    /// Byte offset within the block
    pub offset_in_block: u64,
}

impl StripingConfig {
    /// Role of the block at `index` in group order
    pub fn block_role(&self, index: usize) -> Result<BlockRole> {
        self.check_block_index(index)?;
        Ok(if index < self.data_blocks() {
            BlockRole::Data
        } else {
            BlockRole::Parity
        })
    }

    /// Reject indices outside `[0, D + P)`
    pub fn check_block_index(&self, index: usize) -> Result<()> {
        if index >= self.total_blocks() {
            return Err(StripeError::BlockIndexOutOfRange {
                index,
                limit: self.total_blocks(),
            });
        }
        Ok(())
    }

    /// Locate an absolute file position
    pub fn locate(&self, pos_in_file: u64) -> CellLocation {
        let group_capacity = self.group_data_capacity();
        let group = pos_in_file / group_capacity;
        let (block, offset_in_block) = logical_offset_to_physical(
            pos_in_file % group_capacity,
            self.cell_size(),
            self.data_blocks(),
        );
        CellLocation {
            group,
            block,
            stripe: offset_in_block / self.cell_size(),
            offset_in_cell: offset_in_block % self.cell_size(),
            offset_in_block,
        }
    }

    /// Absolute file position of a byte in data block `block_index` of `group`
    pub fn file_offset(&self, group: u64, block_index: usize, offset_in_block: u64) -> Result<u64> {
        if block_index >= self.data_blocks() {
            // parity blocks have no logical address
            return Err(StripeError::BlockIndexOutOfRange {
                index: block_index,
                limit: self.data_blocks(),
            });
        }
        if offset_in_block >= self.block_capacity() {
            return Err(StripeError::OffsetOutOfRange {
                offset: offset_in_block,
                capacity: self.block_capacity(),
            });
        }
        let in_group = physical_to_logical_offset_in_group(
            offset_in_block,
            block_index,
            self.cell_size(),
            self.data_blocks(),
        );
        group
            .checked_mul(self.group_data_capacity())
            .and_then(|base| base.checked_add(in_group))
            .ok_or_else(|| {
                StripeError::LayoutViolation(format!("group {} is beyond addressable range", group))
            })
    }

    /// Number of block groups needed for a file of `file_len` bytes
    pub fn block_group_count(&self, file_len: u64) -> u64 {
        file_len.div_ceil(self.group_data_capacity())
    }

    /// Logical bytes carried by group `group` of a file of `file_len` bytes
    pub fn group_data_length(&self, file_len: u64, group: u64) -> u64 {
        let capacity = self.group_data_capacity();
        let start = group.saturating_mul(capacity);
        if file_len <= start {
            0
        } else {
            (file_len - start).min(capacity)
        }
    }

    /// Bytes physically stored in block `index` of a group holding
    /// `group_len` logical bytes.
    ///
    /// Parity blocks are as long as data block 0.
    pub fn internal_block_length(&self, group_len: u64, index: usize) -> Result<u64> {
        self.check_block_index(index)?;
        if group_len > self.group_data_capacity() {
            return Err(StripeError::LayoutViolation(format!(
                "group length {} exceeds group capacity {}",
                group_len,
                self.group_data_capacity()
            )));
        }

        let stripe_size = self.stripe_data_size();
        let last_stripe_len = group_len % stripe_size;
        if last_stripe_len == 0 {
            return Ok(group_len / self.data_blocks() as u64);
        }

        let full_stripes = (group_len - 1) / stripe_size;
        Ok(full_stripes * self.cell_size() + self.last_cell_size(last_stripe_len, index))
    }

    fn last_cell_size(&self, last_stripe_len: u64, index: usize) -> u64 {
        let size = if index < self.data_blocks() {
            last_stripe_len.saturating_sub(index as u64 * self.cell_size())
        } else {
            last_stripe_len
        };
        size.min(self.cell_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const C: u64 = 64;

    fn config() -> StripingConfig {
        StripingConfig::new(C, 6, 3, 4).unwrap()
    }

    #[test]
    fn test_first_stripe_mapping() {
        assert_eq!(logical_offset_to_physical(0, C, 6), (0, 0));
        assert_eq!(logical_offset_to_physical(C - 1, C, 6), (0, C - 1));
        assert_eq!(logical_offset_to_physical(C, C, 6), (1, 0));
        assert_eq!(logical_offset_to_physical(5 * C + 3, C, 6), (5, 3));
    }

    #[test]
    fn test_second_stripe_mapping() {
        // first byte of the second stripe wraps back to block 0
        assert_eq!(logical_offset_to_physical(6 * C, C, 6), (0, C));
        assert_eq!(logical_offset_to_physical(6 * C + 123 - 64, C, 6), (0, C + 59));
        assert_eq!(physical_to_logical_offset_in_group(C, 0, C, 6), 6 * C);
        assert_eq!(physical_to_logical_offset_in_group(C + 1, 2, C, 6), 8 * C + 1);
    }

    #[test]
    fn test_locate_crosses_group_boundary() {
        let config = config();
        let group_capacity = config.group_data_capacity();

        let loc = config.locate(group_capacity + C + 5);
        assert_eq!(loc.group, 1);
        assert_eq!(loc.block, 1);
        assert_eq!(loc.stripe, 0);
        assert_eq!(loc.offset_in_cell, 5);
        assert_eq!(loc.offset_in_block, 5);

        let loc = config.locate(group_capacity - 1);
        assert_eq!(loc.group, 0);
        assert_eq!(loc.block, 5);
        assert_eq!(loc.stripe, 3);
        assert_eq!(loc.offset_in_block, config.block_capacity() - 1);
    }

    #[test]
    fn test_file_offset_inverts_locate() {
        let config = config();
        for pos in [0, 1, C, 6 * C + 123, 24 * C, 24 * C + C + 123, 100 * C + 7] {
            let loc = config.locate(pos);
            assert_eq!(
                config.file_offset(loc.group, loc.block, loc.offset_in_block).unwrap(),
                pos
            );
        }
    }

    #[test]
    fn test_file_offset_rejects_parity_and_overflowing_offsets() {
        let config = config();
        assert!(matches!(
            config.file_offset(0, 6, 0),
            Err(StripeError::BlockIndexOutOfRange { index: 6, limit: 6 })
        ));
        assert!(matches!(
            config.file_offset(0, 0, config.block_capacity()),
            Err(StripeError::OffsetOutOfRange { .. })
        ));
        assert!(config.file_offset(u64::MAX, 0, 0).unwrap_err().is_layout_violation());
    }

    #[test]
    fn test_block_roles() {
        let config = config();
        assert_eq!(config.block_role(0).unwrap(), BlockRole::Data);
        assert_eq!(config.block_role(5).unwrap(), BlockRole::Data);
        assert_eq!(config.block_role(6).unwrap(), BlockRole::Parity);
        assert_eq!(config.block_role(8).unwrap(), BlockRole::Parity);
        assert!(config.block_role(9).is_err());
    }

    #[test]
    fn test_group_counts_and_lengths() {
        let config = config();
        let cap = config.group_data_capacity();
        assert_eq!(config.block_group_count(0), 0);
        assert_eq!(config.block_group_count(1), 1);
        assert_eq!(config.block_group_count(cap), 1);
        assert_eq!(config.block_group_count(cap + 1), 2);

        assert_eq!(config.group_data_length(cap + C + 123, 0), cap);
        assert_eq!(config.group_data_length(cap + C + 123, 1), C + 123);
        assert_eq!(config.group_data_length(cap + C + 123, 2), 0);
    }

    #[test]
    fn test_internal_block_length_single_byte() {
        let config = config();
        assert_eq!(config.internal_block_length(1, 0).unwrap(), 1);
        for i in 1..6 {
            assert_eq!(config.internal_block_length(1, i).unwrap(), 0);
        }
        // parity mirrors block 0
        assert_eq!(config.internal_block_length(1, 6).unwrap(), 1);
    }

    #[test]
    fn test_internal_block_length_one_cell() {
        let config = config();
        assert_eq!(config.internal_block_length(C, 0).unwrap(), C);
        for i in 1..6 {
            assert_eq!(config.internal_block_length(C, i).unwrap(), 0);
        }
        assert_eq!(config.internal_block_length(C, 8).unwrap(), C);
    }

    #[test]
    fn test_internal_block_length_partial_second_stripe() {
        let config = config();
        let len = 6 * C + 123;
        assert_eq!(config.internal_block_length(len, 0).unwrap(), C + C);
        assert_eq!(config.internal_block_length(len, 1).unwrap(), C + 59);
        for i in 2..6 {
            assert_eq!(config.internal_block_length(len, i).unwrap(), C);
        }
        assert_eq!(config.internal_block_length(len, 7).unwrap(), 2 * C);
    }

    #[test]
    fn test_internal_block_length_full_group() {
        let config = config();
        let cap = config.group_data_capacity();
        for i in 0..config.total_blocks() {
            assert_eq!(config.internal_block_length(cap, i).unwrap(), config.block_capacity());
        }
        assert!(config.internal_block_length(cap + 1, 0).unwrap_err().is_layout_violation());
        assert!(config.internal_block_length(0, 9).is_err());
    }

    #[test]
    fn test_coverage_without_gaps_or_duplicates() {
        let config = StripingConfig::new(8, 3, 2, 4).unwrap();
        let mut seen = vec![false; config.group_data_capacity() as usize];
        for block in 0..config.data_blocks() {
            for off in 0..config.block_capacity() {
                let pos = physical_to_logical_offset_in_group(off, block, 8, 3) as usize;
                assert!(!seen[pos], "position {} mapped twice", pos);
                seen[pos] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    proptest! {
        #[test]
        fn prop_physical_logical_bijection(
            cell_size in 1u64..4096,
            data_blocks in 1usize..16,
            block_seed in any::<usize>(),
            offset_in_block in 0u64..1_000_000,
        ) {
            let block_index = block_seed % data_blocks;
            let pos = physical_to_logical_offset_in_group(
                offset_in_block, block_index, cell_size, data_blocks);
            prop_assert_eq!(
                logical_offset_to_physical(pos, cell_size, data_blocks),
                (block_index, offset_in_block)
            );
        }

        #[test]
        fn prop_logical_physical_bijection(
            cell_size in 1u64..4096,
            data_blocks in 1usize..16,
            pos in 0u64..10_000_000,
        ) {
            let (block, off) = logical_offset_to_physical(pos, cell_size, data_blocks);
            prop_assert!(block < data_blocks);
            prop_assert_eq!(
                physical_to_logical_offset_in_group(off, block, cell_size, data_blocks),
                pos
            );
        }

        #[test]
        fn prop_internal_lengths_sum_to_group_length(
            cell_size in 1u64..256,
            data_blocks in 1usize..10,
            stripes_per_block in 1u64..8,
            fraction in 0.0f64..=1.0,
        ) {
            let config = StripingConfig::new(cell_size, data_blocks, 2, stripes_per_block).unwrap();
            let group_len = (config.group_data_capacity() as f64 * fraction) as u64;
            let total: u64 = (0..data_blocks)
                .map(|i| config.internal_block_length(group_len, i).unwrap())
                .sum();
            prop_assert_eq!(total, group_len);
        }
    }
}
