//! Error types for stripelayout
//!
//! Provides a unified error type for layout, verification and retrieval.
//! Every variant is deterministic: the same input reproduces the same error.

use std::fmt;
use thiserror::Error;

/// Result type alias for stripelayout operations
pub type Result<T> = std::result::Result<T, StripeError>;

/// A single byte that read back differently from what the oracle expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Block group index within the file
    pub group: u64,
    /// Stripe index within the block (`offset_in_block / cell_size`)
    pub stripe: u64,
    /// Data block index within the group
    pub block: usize,
    /// Byte index within the cell (`offset_in_block % cell_size`)
    pub byte_in_cell: u64,
    /// Offset of the byte inside its block
    pub offset_in_block: u64,
    /// Absolute logical file position of the byte
    pub pos_in_file: u64,
    /// Expected byte value
    pub expected: u8,
    /// Byte value actually read
    pub actual: u8,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unexpected byte {}, expect {}. Block group index is {}, stripe index is {}, \
             cell index is {}, byte index is {} (file offset {})",
            self.actual,
            self.expected,
            self.group,
            self.stripe,
            self.block,
            self.byte_in_cell,
            self.pos_in_file
        )
    }
}

/// Unified error type for stripelayout
#[derive(Error, Debug)]
pub enum StripeError {
    // ===== Layout Errors =====
    #[error("Layout violation: block index {index} outside [0, {limit})")]
    BlockIndexOutOfRange { index: usize, limit: usize },

    #[error("Layout violation: offset {offset} outside block capacity {capacity}")]
    OffsetOutOfRange { offset: u64, capacity: u64 },

    #[error("Layout violation: {0}")]
    LayoutViolation(String),

    // ===== Verification Errors =====
    #[error("Verification mismatch: {0}")]
    VerificationMismatch(Mismatch),

    #[error("Length mismatch: expected {expected}, actual {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    // ===== Storage Errors =====
    #[error("Block not found: {0}")]
    BlockNotFound(u64),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // ===== Configuration Errors =====
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StripeError {
    /// Whether this error signals a caller logic error in layout arithmetic
    pub fn is_layout_violation(&self) -> bool {
        matches!(
            self,
            StripeError::BlockIndexOutOfRange { .. }
                | StripeError::OffsetOutOfRange { .. }
                | StripeError::LayoutViolation(_)
        )
    }

    /// The mismatch carried by a verification failure, if any
    pub fn mismatch(&self) -> Option<&Mismatch> {
        match self {
            StripeError::VerificationMismatch(m) => Some(m),
            _ => None,
        }
    }
}
