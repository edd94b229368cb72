//! Block group descriptors and the group splitter
//!
//! The location service describes a whole group with one representative
//! block: its id is the id of internal block 0 and its length is the group's
//! logical data length. [`split_block_group`] expands that into one
//! descriptor per internal block, in group order.

use crate::config::StripingConfig;
use crate::error::{Result, StripeError};
use crate::layout::BlockRole;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical block identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtendedBlock {
    /// Storage pool the block lives in
    pub pool_id: String,
    /// Block identifier
    pub block_id: u64,
    /// Bytes stored in the block
    pub num_bytes: u64,
    /// Generation stamp
    pub generation_stamp: u64,
}

impl ExtendedBlock {
    pub fn new(pool_id: impl Into<String>, block_id: u64, num_bytes: u64, generation_stamp: u64) -> Self {
        Self {
            pool_id: pool_id.into(),
            block_id,
            num_bytes,
            generation_stamp,
        }
    }
}

impl fmt::Display for ExtendedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:blk_{}_{}", self.pool_id, self.block_id, self.generation_stamp)
    }
}

/// Where a block replica can be fetched from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageLocation {
    /// Storage node identifier
    pub node_id: String,
    /// Data transfer address (`host:port`)
    pub xfer_addr: String,
}

impl StorageLocation {
    pub fn new(node_id: impl Into<String>, xfer_addr: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            xfer_addr: xfer_addr.into(),
        }
    }
}

/// Opaque access token presented to the storage node
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockToken(pub Bytes);

impl fmt::Debug for BlockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockToken({} bytes)", self.0.len())
    }
}

/// Located representative of a block group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatedBlockGroup {
    /// Block 0 identity; `num_bytes` is the group's logical data length
    pub block: ExtendedBlock,
    /// Logical file offset where the group starts
    pub start_offset: u64,
    /// Storage locations, parallel to `block_indices`
    pub locations: Vec<StorageLocation>,
    /// In-group index of the internal block stored at each location
    pub block_indices: Vec<u8>,
    /// Access token shared by every internal block
    pub token: BlockToken,
}

/// One internal block of a group, ready for retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatedBlock {
    pub block: ExtendedBlock,
    pub start_offset: u64,
    pub location: StorageLocation,
    pub token: BlockToken,
    pub index_in_group: usize,
    pub role: BlockRole,
}

impl LocatedBlock {
    pub fn is_parity(&self) -> bool {
        self.role == BlockRole::Parity
    }
}

/// Expand a group into its `D + P` internal blocks.
///
/// Indices with no reported location come back as `None`. Data blocks past
/// the end of a short group are described with zero length.
pub fn split_block_group(
    group: &LocatedBlockGroup,
    config: &StripingConfig,
) -> Result<Vec<Option<LocatedBlock>>> {
    if group.locations.len() != group.block_indices.len() {
        return Err(StripeError::Configuration(format!(
            "group {} has {} locations but {} block indices",
            group.block,
            group.locations.len(),
            group.block_indices.len()
        )));
    }

    let mut blocks: Vec<Option<LocatedBlock>> = vec![None; config.total_blocks()];

    for (location, &index) in group.locations.iter().zip(group.block_indices.iter()) {
        let index = index as usize;
        let role = config.block_role(index)?;
        let num_bytes = config.internal_block_length(group.block.num_bytes, index)?;

        let block_id = group.block.block_id.checked_add(index as u64).ok_or_else(|| {
            StripeError::LayoutViolation(format!(
                "block id of index {} in group {} overflows",
                index, group.block
            ))
        })?;
        let start_offset = (index as u64)
            .checked_mul(config.cell_size())
            .and_then(|o| group.start_offset.checked_add(o))
            .ok_or_else(|| {
                StripeError::LayoutViolation(format!(
                    "start offset of index {} in group {} overflows",
                    index, group.block
                ))
            })?;

        let block = ExtendedBlock {
            pool_id: group.block.pool_id.clone(),
            block_id,
            num_bytes,
            generation_stamp: group.block.generation_stamp,
        };

        // first replica listed wins
        if blocks[index].is_none() {
            blocks[index] = Some(LocatedBlock {
                block,
                start_offset,
                location: location.clone(),
                token: group.token.clone(),
                index_in_group: index,
                role,
            });
        }
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const C: u64 = 1024;

    fn config() -> StripingConfig {
        StripingConfig::new(C, 6, 3, 4).unwrap()
    }

    fn full_group(num_bytes: u64) -> LocatedBlockGroup {
        LocatedBlockGroup {
            block: ExtendedBlock::new("pool-1", 1_000, num_bytes, 7),
            start_offset: 0,
            locations: (0..9)
                .map(|i| StorageLocation::new(format!("node-{}", i), format!("127.0.0.1:{}", 9866 + i)))
                .collect(),
            block_indices: (0..9).collect(),
            token: BlockToken(Bytes::from_static(b"token")),
        }
    }

    #[test]
    fn test_split_full_group() {
        let config = config();
        let group = full_group(config.group_data_capacity());
        let blocks = split_block_group(&group, &config).unwrap();

        assert_eq!(blocks.len(), 9);
        for (i, b) in blocks.iter().enumerate() {
            let b = b.as_ref().unwrap();
            assert_eq!(b.index_in_group, i);
            assert_eq!(b.block.block_id, 1_000 + i as u64);
            assert_eq!(b.block.num_bytes, config.block_capacity());
            assert_eq!(b.block.generation_stamp, 7);
            assert_eq!(b.start_offset, i as u64 * C);
            assert_eq!(b.location.node_id, format!("node-{}", i));
            assert_eq!(b.token, group.token);
            assert_eq!(b.is_parity(), i >= 6);
        }
    }

    #[test]
    fn test_split_one_cell_group() {
        let config = config();
        let blocks = split_block_group(&full_group(C), &config).unwrap();

        let lengths: Vec<u64> = blocks.iter().map(|b| b.as_ref().unwrap().block.num_bytes).collect();
        assert_eq!(lengths, vec![C, 0, 0, 0, 0, 0, C, C, C]);
    }

    #[test]
    fn test_split_with_missing_locations() {
        let config = config();
        let mut group = full_group(6 * C + 123);
        group.locations = vec![
            StorageLocation::new("node-a", "10.0.0.1:9866"),
            StorageLocation::new("node-c", "10.0.0.3:9866"),
        ];
        group.block_indices = vec![0, 2];

        let blocks = split_block_group(&group, &config).unwrap();
        assert_eq!(blocks.len(), 9);
        assert_eq!(blocks[0].as_ref().unwrap().block.num_bytes, C + 123);
        assert!(blocks[1].is_none());
        assert_eq!(blocks[2].as_ref().unwrap().block.num_bytes, C);
        assert_eq!(blocks[2].as_ref().unwrap().location.node_id, "node-c");
        assert!(blocks[3..].iter().all(|b| b.is_none()));
    }

    #[test]
    fn test_split_rejects_bad_index() {
        let config = config();
        let mut group = full_group(C);
        group.block_indices[8] = 9;
        let err = split_block_group(&group, &config).unwrap_err();
        assert!(err.is_layout_violation());
    }

    #[test]
    fn test_split_rejects_ragged_metadata() {
        let config = config();
        let mut group = full_group(C);
        group.block_indices.pop();
        assert!(matches!(
            split_block_group(&group, &config),
            Err(StripeError::Configuration(_))
        ));
    }

    #[test]
    fn test_split_rejects_overflowing_ids() {
        let config = config();
        let mut group = full_group(C);
        group.block.block_id = u64::MAX - 4;
        let err = split_block_group(&group, &config).unwrap_err();
        assert!(err.is_layout_violation());

        let mut group = full_group(C);
        group.start_offset = u64::MAX - C;
        let err = split_block_group(&group, &config).unwrap_err();
        assert!(err.is_layout_violation());

        // the last index still fits
        let mut group = full_group(C);
        group.block.block_id = u64::MAX - 8;
        let blocks = split_block_group(&group, &config).unwrap();
        assert_eq!(blocks[8].as_ref().unwrap().block.block_id, u64::MAX);
    }

    #[test]
    fn test_split_empty_group() {
        let config = config();
        let blocks = split_block_group(&full_group(0), &config).unwrap();
        assert!(blocks.iter().all(|b| b.as_ref().unwrap().block.num_bytes == 0));
    }
}
