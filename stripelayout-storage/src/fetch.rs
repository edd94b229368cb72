//! Group retrieval
//!
//! Splits each located group into its internal blocks and reads them through
//! a [`BlockReader`]. Blocks of one group are read concurrently; groups are
//! fetched one after another.

use crate::reader::BlockReader;
use bytes::{Bytes, BytesMut};
use futures::future::try_join_all;
use stripelayout_core::block_group::{split_block_group, LocatedBlock, LocatedBlockGroup};
use stripelayout_core::error::{Result, StripeError};
use stripelayout_core::stripe::{assemble_group, GroupBuffers};
use stripelayout_core::StripingConfig;
use tracing::{debug, warn};

/// Read every located block of one group.
///
/// Zero-length blocks are not read. A block whose content length differs
/// from its reported length fails the whole group.
pub async fn fetch_group<R>(
    reader: &R,
    config: &StripingConfig,
    group_index: u64,
    blocks: &[Option<LocatedBlock>],
) -> Result<GroupBuffers>
where
    R: BlockReader + ?Sized,
{
    let reads = blocks
        .iter()
        .flatten()
        .map(|located| read_located(reader, located));

    let mut buffers = GroupBuffers::new(group_index, config);
    for (index, data) in try_join_all(reads).await? {
        buffers.insert(index, data)?;
    }
    Ok(buffers)
}

async fn read_located<R>(reader: &R, located: &LocatedBlock) -> Result<(usize, Bytes)>
where
    R: BlockReader + ?Sized,
{
    let expected = located.block.num_bytes;
    if expected == 0 {
        return Ok((located.index_in_group, Bytes::new()));
    }

    let data = reader.read_block(located).await?;
    if data.len() as u64 != expected {
        warn!(
            block = %located.block,
            expected,
            actual = data.len(),
            "Block length differs from reported length"
        );
        return Err(StripeError::LengthMismatch {
            expected,
            actual: data.len() as u64,
        });
    }

    debug!(
        block = %located.block,
        index = located.index_in_group,
        node = %located.location.node_id,
        bytes = data.len(),
        "Fetched block"
    );
    Ok((located.index_in_group, data))
}

/// Fetch every group of a file, in file order
pub async fn fetch_file<R>(
    reader: &R,
    config: &StripingConfig,
    groups: &[LocatedBlockGroup],
) -> Result<Vec<GroupBuffers>>
where
    R: BlockReader + ?Sized,
{
    let mut out = Vec::with_capacity(groups.len());
    for (index, group) in groups.iter().enumerate() {
        let index = index as u64;
        let expected_start = index * config.group_data_capacity();
        if group.start_offset != expected_start {
            return Err(StripeError::LayoutViolation(format!(
                "group {} starts at {}, expected {}",
                index, group.start_offset, expected_start
            )));
        }

        let blocks = split_block_group(group, config)?;
        out.push(fetch_group(reader, config, index, &blocks).await?);
    }
    Ok(out)
}

/// Read a file back as one contiguous byte stream
pub async fn read_file<R>(
    reader: &R,
    config: &StripingConfig,
    file_len: u64,
    groups: &[LocatedBlockGroup],
) -> Result<Bytes>
where
    R: BlockReader + ?Sized,
{
    let buffers = fetch_file(reader, config, groups).await?;
    let mut out = BytesMut::with_capacity(file_len as usize);
    for buffers in &buffers {
        let group_len = config.group_data_length(file_len, buffers.group_index);
        out.extend_from_slice(&assemble_group(config, buffers, group_len)?);
    }

    if out.len() as u64 != file_len {
        return Err(StripeError::LengthMismatch {
            expected: file_len,
            actual: out.len() as u64,
        });
    }
    Ok(out.freeze())
}
