//! Stripe placement and reassembly
//!
//! Placement scatters one group's logical bytes into its data blocks, cell by
//! cell. Reassembly gathers them back in file order. Parity blocks are carried
//! through untouched; computing them is out of scope here.

use crate::config::StripingConfig;
use crate::error::{Result, StripeError};
use crate::layout::logical_offset_to_physical;
use bytes::{Bytes, BytesMut};

/// Block buffers retrieved for one group
#[derive(Debug, Clone, Default)]
pub struct GroupBuffers {
    /// Group index within the file
    pub group_index: u64,
    /// Data block content by index; `None` if the block was not retrieved
    pub data: Vec<Option<Bytes>>,
    /// Parity block content by index (offset by D)
    pub parity: Vec<Option<Bytes>>,
}

impl GroupBuffers {
    /// Empty buffer set sized for `config`
    pub fn new(group_index: u64, config: &StripingConfig) -> Self {
        Self {
            group_index,
            data: vec![None; config.data_blocks()],
            parity: vec![None; config.parity_blocks()],
        }
    }

    /// Build from data buffers only
    pub fn from_data(group_index: u64, data: Vec<Bytes>) -> Self {
        Self {
            group_index,
            data: data.into_iter().map(Some).collect(),
            parity: Vec::new(),
        }
    }

    /// Store the buffer for the block at `index` in group order
    pub fn insert(&mut self, index: usize, buf: Bytes) -> Result<()> {
        let data_blocks = self.data.len();
        let slot = if index < data_blocks {
            self.data.get_mut(index)
        } else {
            self.parity.get_mut(index - data_blocks)
        };
        match slot {
            Some(slot) => {
                *slot = Some(buf);
                Ok(())
            }
            None => Err(StripeError::BlockIndexOutOfRange {
                index,
                limit: data_blocks + self.parity.len(),
            }),
        }
    }

    /// Total bytes across present data buffers
    pub fn data_len(&self) -> u64 {
        self.data.iter().flatten().map(|b| b.len() as u64).sum()
    }
}

/// Scatter one group's logical bytes into `D` data block buffers.
///
/// Each buffer has exactly the internal block length for the group.
pub fn stripe_group(config: &StripingConfig, group_data: &[u8]) -> Result<Vec<Bytes>> {
    let group_len = group_data.len() as u64;
    let mut blocks = (0..config.data_blocks())
        .map(|i| {
            config
                .internal_block_length(group_len, i)
                .map(|len| BytesMut::zeroed(len as usize))
        })
        .collect::<Result<Vec<_>>>()?;

    // copy whole cell runs rather than single bytes
    let cell = config.cell_size() as usize;
    for (cell_no, chunk) in group_data.chunks(cell).enumerate() {
        let pos = cell_no as u64 * config.cell_size();
        let (block, offset) = logical_offset_to_physical(pos, config.cell_size(), config.data_blocks());
        let offset = offset as usize;
        blocks[block][offset..offset + chunk.len()].copy_from_slice(chunk);
    }

    Ok(blocks.into_iter().map(BytesMut::freeze).collect())
}

/// Stripe a whole file, returning the data block buffers of each group
pub fn stripe_file(config: &StripingConfig, data: &[u8]) -> Result<Vec<Vec<Bytes>>> {
    data.chunks(config.group_data_capacity() as usize)
        .map(|group| stripe_group(config, group))
        .collect()
}

/// Gather the first `group_len` logical bytes of a group back in file order
pub fn assemble_group(config: &StripingConfig, buffers: &GroupBuffers, group_len: u64) -> Result<Bytes> {
    if group_len > config.group_data_capacity() {
        return Err(StripeError::LayoutViolation(format!(
            "group length {} exceeds group capacity {}",
            group_len,
            config.group_data_capacity()
        )));
    }

    let mut out = BytesMut::with_capacity(group_len as usize);
    let mut pos = 0u64;
    while pos < group_len {
        let (block, offset) = logical_offset_to_physical(pos, config.cell_size(), config.data_blocks());
        let run = (config.cell_size() - offset % config.cell_size()).min(group_len - pos);

        let buf = buffers
            .data
            .get(block)
            .and_then(|b| b.as_ref())
            .ok_or_else(|| {
                StripeError::LayoutViolation(format!(
                    "group {} is missing data block {}",
                    buffers.group_index, block
                ))
            })?;

        let start = offset as usize;
        let end = start + run as usize;
        if end > buf.len() {
            return Err(StripeError::LengthMismatch {
                expected: end as u64,
                actual: buf.len() as u64,
            });
        }
        out.extend_from_slice(&buf[start..end]);
        pos += run;
    }

    Ok(out.freeze())
}
