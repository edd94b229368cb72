//! Stripe reconstruction verifier
//!
//! Checks every byte of every retrieved data block against the oracle. A
//! byte whose logical position lies at or past `write_bytes` must be zero.
//! Parity buffers are not inspected.

use crate::config::StripingConfig;
use crate::error::{Mismatch, Result, StripeError};
use crate::layout::physical_to_logical_offset_in_group;
use crate::oracle::ByteOracle;
use crate::stripe::GroupBuffers;
use rayon::prelude::*;

/// Totals gathered by a successful verification run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationReport {
    /// Block groups verified
    pub groups: u64,
    /// Data blocks verified (missing and empty blocks excluded)
    pub blocks: u64,
    /// Bytes compared against the oracle
    pub bytes: u64,
}

impl VerificationReport {
    fn merge(mut self, other: VerificationReport) -> Self {
        self.groups += other.groups;
        self.blocks += other.blocks;
        self.bytes += other.bytes;
        self
    }
}

/// Compares retrieved block content against a [`ByteOracle`]
#[derive(Debug, Clone, Copy)]
pub struct StripeVerifier {
    config: StripingConfig,
    oracle: ByteOracle,
}

impl StripeVerifier {
    pub fn new(config: StripingConfig, oracle: ByteOracle) -> Self {
        Self { config, oracle }
    }

    pub fn config(&self) -> &StripingConfig {
        &self.config
    }

    pub fn oracle(&self) -> &ByteOracle {
        &self.oracle
    }

    /// Expected byte at an absolute file position
    #[inline]
    pub fn expected_byte(&self, pos_in_file: u64, write_bytes: u64) -> u8 {
        if pos_in_file >= write_bytes {
            0
        } else {
            self.oracle.byte_at(pos_in_file)
        }
    }

    /// Verify one group, failing on the first divergent byte
    pub fn verify_group(&self, buffers: &GroupBuffers, write_bytes: u64) -> Result<VerificationReport> {
        let mut first = None;
        let report = self.scan_group(buffers, write_bytes, |m| {
            first = Some(m);
            false
        })?;
        match first {
            Some(m) => Err(StripeError::VerificationMismatch(m)),
            None => Ok(report),
        }
    }

    /// Every divergent byte of one group, in block then offset order
    pub fn group_mismatches(&self, buffers: &GroupBuffers, write_bytes: u64) -> Result<Vec<Mismatch>> {
        let mut all = Vec::new();
        self.scan_group(buffers, write_bytes, |m| {
            all.push(m);
            true
        })?;
        Ok(all)
    }

    /// Verify a whole file.
    ///
    /// The reported file length is checked first. Groups are then verified in
    /// parallel; when several fail, the lowest group index is reported.
    pub fn verify_file(
        &self,
        reported_len: u64,
        write_bytes: u64,
        groups: &[GroupBuffers],
    ) -> Result<VerificationReport> {
        if reported_len != write_bytes {
            return Err(StripeError::LengthMismatch {
                expected: write_bytes,
                actual: reported_len,
            });
        }

        let results: Vec<Result<VerificationReport>> = groups
            .par_iter()
            .map(|g| self.verify_group(g, write_bytes))
            .collect();

        let mut failures: Vec<(u64, StripeError)> = Vec::new();
        let mut report = VerificationReport::default();
        for (group, result) in groups.iter().zip(results) {
            match result {
                Ok(r) => report = report.merge(r),
                Err(e) => failures.push((group.group_index, e)),
            }
        }

        match failures.into_iter().min_by_key(|(index, _)| *index) {
            Some((_, err)) => Err(err),
            None => Ok(report),
        }
    }

    /// Every divergent byte across a file, ordered by group
    pub fn file_mismatches(&self, write_bytes: u64, groups: &[GroupBuffers]) -> Result<Vec<Mismatch>> {
        let per_group = groups
            .par_iter()
            .map(|g| self.group_mismatches(g, write_bytes))
            .collect::<Result<Vec<_>>>()?;
        let mut all: Vec<Mismatch> = per_group.into_iter().flatten().collect();
        all.sort_by_key(|m| (m.group, m.block, m.offset_in_block));
        Ok(all)
    }

    /// Verify content read back as one contiguous stream
    pub fn verify_contiguous(&self, buf: &[u8], write_bytes: u64) -> Result<()> {
        if buf.len() as u64 != write_bytes {
            return Err(StripeError::LengthMismatch {
                expected: write_bytes,
                actual: buf.len() as u64,
            });
        }

        match buf
            .iter()
            .enumerate()
            .find(|(pos, b)| **b != self.oracle.byte_at(*pos as u64))
        {
            Some((pos, &actual)) => {
                let pos = pos as u64;
                let loc = self.config.locate(pos);
                Err(StripeError::VerificationMismatch(Mismatch {
                    group: loc.group,
                    stripe: loc.stripe,
                    block: loc.block,
                    byte_in_cell: loc.offset_in_cell,
                    offset_in_block: loc.offset_in_block,
                    pos_in_file: pos,
                    expected: self.oracle.byte_at(pos),
                    actual,
                }))
            }
            None => Ok(()),
        }
    }

    /// Walk every data byte of a group. `on_mismatch` returns whether to
    /// keep scanning.
    fn scan_group<F>(&self, buffers: &GroupBuffers, write_bytes: u64, mut on_mismatch: F) -> Result<VerificationReport>
    where
        F: FnMut(Mismatch) -> bool,
    {
        let cell_size = self.config.cell_size();
        let data_blocks = self.config.data_blocks();
        if buffers.data.len() > data_blocks {
            return Err(StripeError::BlockIndexOutOfRange {
                index: buffers.data.len() - 1,
                limit: data_blocks,
            });
        }

        let group_base = buffers
            .group_index
            .checked_mul(self.config.group_data_capacity())
            .ok_or_else(|| {
                StripeError::LayoutViolation(format!(
                    "group {} is beyond addressable range",
                    buffers.group_index
                ))
            })?;

        let mut report = VerificationReport {
            groups: 1,
            ..Default::default()
        };

        for (block, buf) in buffers.data.iter().enumerate() {
            let Some(buf) = buf else { continue };
            if buf.len() as u64 > self.config.block_capacity() {
                return Err(StripeError::OffsetOutOfRange {
                    offset: buf.len() as u64 - 1,
                    capacity: self.config.block_capacity(),
                });
            }
            if buf.is_empty() {
                continue;
            }
            report.blocks += 1;

            for (offset, &actual) in buf.iter().enumerate() {
                let offset = offset as u64;
                let pos_in_file = group_base
                    .checked_add(physical_to_logical_offset_in_group(
                        offset,
                        block,
                        cell_size,
                        data_blocks,
                    ))
                    .ok_or_else(|| {
                        StripeError::LayoutViolation(format!(
                            "group {} is beyond addressable range",
                            buffers.group_index
                        ))
                    })?;
                let expected = self.expected_byte(pos_in_file, write_bytes);
                report.bytes += 1;

                if expected != actual {
                    let keep_going = on_mismatch(Mismatch {
                        group: buffers.group_index,
                        stripe: offset / cell_size,
                        block,
                        byte_in_cell: offset % cell_size,
                        offset_in_block: offset,
                        pos_in_file,
                        expected,
                        actual,
                    });
                    if !keep_going {
                        return Ok(report);
                    }
                }
            }
        }

        Ok(report)
    }
}
