//! Quantization-related types shared across the codec and the tensor driver.

use crate::error::{KernelError, KernelResult};

/// Sub-byte bit widths supported by the blockwise codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantBits {
    Int3,
    Int4,
    Int5,
    Int6,
    Int7,
}

impl QuantBits {
    #[inline(always)]
    pub const fn bits(self) -> usize {
        match self {
            QuantBits::Int3 => 3,
            QuantBits::Int4 => 4,
            QuantBits::Int5 => 5,
            QuantBits::Int6 => 6,
            QuantBits::Int7 => 7,
        }
    }

    /// Largest representable quantized value, `2^bits - 1`.
    #[inline(always)]
    pub const fn max_value(self) -> u8 {
        ((1u16 << self.bits()) - 1) as u8
    }

    /// Midpoint of the quantized range, `2^(bits-1)`. Doubles as the implicit
    /// zero-point of the symmetric scheme.
    #[inline(always)]
    pub const fn midpoint(self) -> u8 {
        1u8 << (self.bits() - 1)
    }

    pub fn from_bits(bits: u8) -> KernelResult<Self> {
        match bits {
            3 => Ok(QuantBits::Int3),
            4 => Ok(QuantBits::Int4),
            5 => Ok(QuantBits::Int5),
            6 => Ok(QuantBits::Int6),
            7 => Ok(QuantBits::Int7),
            other => Err(KernelError::UnsupportedBits(other)),
        }
    }
}

/// Whether a block carries an explicit data-derived zero-point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantScheme {
    /// Range mirrored around zero; the midpoint offset is baked into the scale
    /// sign, so decode needs no stored zero-point.
    Symmetric,
    /// Explicit per-block `u8` zero-point.
    Asymmetric,
}

/// Blockwise codec configuration. A quantized tensor is bound to exactly one
/// `(bits, block_size)` pair for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockConfig {
    pub bits: QuantBits,
    pub block_size: usize,
}

impl BlockConfig {
    pub const fn new(bits: QuantBits, block_size: usize) -> Self {
        Self { bits, block_size }
    }

    /// Fail-fast validation, run before any block is processed. Bit-plane
    /// boundaries (quarter-byte, half-byte) must land on whole bytes, so only
    /// block sizes divisible by 8 are legal.
    pub fn validate(&self) -> KernelResult<()> {
        if self.block_size == 0 || self.block_size % 8 != 0 {
            return Err(KernelError::InvalidConfig(format!(
                "block size {} must be a non-zero multiple of 8",
                self.block_size
            )));
        }
        Ok(())
    }

    /// Packed bytes per block, `block_size * bits / 8`.
    #[inline(always)]
    pub const fn block_bytes(&self) -> usize {
        self.block_size * self.bits.bits() / 8
    }

    /// Number of blocks covering a column of `rows` values.
    #[inline(always)]
    pub const fn blocks_per_col(&self, rows: usize) -> usize {
        rows.div_ceil(self.block_size)
    }
}

/// Trait for codec-compatible floating point types.
/// Implemented for f32 and half::f16. Zero-cost via monomorphization.
///
/// All codec arithmetic runs in f32 regardless of the storage type, so f16 and
/// f32 tensors produce bit-identical packed blocks; only the per-block scale is
/// narrowed back to the storage type.
pub trait KernelFloat: Copy + Default + Send + Sync + 'static {
    fn to_f32(self) -> f32;
    fn from_f32(v: f32) -> Self;
    fn zero() -> Self;
}

impl KernelFloat for f32 {
    #[inline(always)]
    fn to_f32(self) -> f32 { self }
    #[inline(always)]
    fn from_f32(v: f32) -> Self { v }
    #[inline(always)]
    fn zero() -> Self { 0.0 }
}

impl KernelFloat for half::f16 {
    #[inline(always)]
    fn to_f32(self) -> f32 { half::f16::to_f32(self) }
    #[inline(always)]
    fn from_f32(v: f32) -> Self { half::f16::from_f32(v) }
    #[inline(always)]
    fn zero() -> Self { half::f16::ZERO }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_roundtrip_and_bounds() {
        for bits in 3..=7u8 {
            let qb = QuantBits::from_bits(bits).unwrap();
            assert_eq!(qb.bits(), bits as usize);
            assert_eq!(qb.max_value(), ((1u16 << bits) - 1) as u8);
            assert_eq!(qb.midpoint(), 1 << (bits - 1));
        }
        assert!(QuantBits::from_bits(2).is_err());
        assert!(QuantBits::from_bits(8).is_err());
    }

    #[test]
    fn config_rejects_unaligned_block_size() {
        assert!(BlockConfig::new(QuantBits::Int4, 0).validate().is_err());
        assert!(BlockConfig::new(QuantBits::Int4, 12).validate().is_err());
        assert!(BlockConfig::new(QuantBits::Int4, 32).validate().is_ok());
    }

    #[test]
    fn block_bytes_per_width() {
        let bs = 32;
        assert_eq!(BlockConfig::new(QuantBits::Int3, bs).block_bytes(), 12);
        assert_eq!(BlockConfig::new(QuantBits::Int4, bs).block_bytes(), 16);
        assert_eq!(BlockConfig::new(QuantBits::Int5, bs).block_bytes(), 20);
        assert_eq!(BlockConfig::new(QuantBits::Int6, bs).block_bytes(), 24);
        assert_eq!(BlockConfig::new(QuantBits::Int7, bs).block_bytes(), 28);
    }
}
