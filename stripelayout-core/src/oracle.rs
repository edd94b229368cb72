//! Deterministic byte pattern
//!
//! `byte_at(pos) = pos % modulus + 1`. Values are never zero, so file
//! content is always distinguishable from the zero padding past end of file.

use crate::error::{Result, StripeError};
use crate::DEFAULT_ORACLE_MODULUS;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Environment variable holding the CLI's default modulus
pub const MODULUS_ENV: &str = "STRIPE_ORACLE_MODULUS";

/// Seed-free repeating byte pattern keyed by absolute file position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawByteOracle")]
pub struct ByteOracle {
    modulus: u64,
}

#[derive(Deserialize)]
struct RawByteOracle {
    modulus: u64,
}

impl TryFrom<RawByteOracle> for ByteOracle {
    type Error = StripeError;

    fn try_from(raw: RawByteOracle) -> Result<Self> {
        Self::new(raw.modulus)
    }
}

impl Default for ByteOracle {
    fn default() -> Self {
        Self {
            modulus: DEFAULT_ORACLE_MODULUS,
        }
    }
}

impl ByteOracle {
    /// Create an oracle with the given modulus (1..=255)
    pub fn new(modulus: u64) -> Result<Self> {
        if modulus == 0 || modulus > u8::MAX as u64 {
            return Err(StripeError::Configuration(format!(
                "oracle modulus must be in 1..=255, got {}",
                modulus
            )));
        }
        Ok(Self { modulus })
    }

    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    /// Expected byte at absolute file position `pos`
    #[inline]
    pub fn byte_at(&self, pos: u64) -> u8 {
        (pos % self.modulus + 1) as u8
    }

    /// Content of a file of `len` bytes
    pub fn generate(&self, len: usize) -> Bytes {
        self.generate_range(0, len)
    }

    /// `len` bytes of content starting at file position `start`
    pub fn generate_range(&self, start: u64, len: usize) -> Bytes {
        (0..len as u64)
            .map(|i| self.byte_at(start + i))
            .collect::<Vec<u8>>()
            .into()
    }
}
