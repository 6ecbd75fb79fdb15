//! Float-range quantization parameter derivation.
//!
//! The shared scale/zero-point protocol used by fixed-point backends for 8-bit
//! and wider paths outside the block abstraction. Semantics are pinned to the
//! reference backend definition: the effective float range is widened to
//! include 0.0 and to span at least 0.0001, the zero-point is rounded
//! half-to-even and then negated, and `quantize_value` subtracts the stored
//! (already negated) zero-point so round-trips stay exact.

use crate::error::{KernelError, KernelResult};

/// Representable bounds of the fixed-point targets the derivation supports.
/// An unsupported width is a reported error at `from_bits`, never a silently
/// guessed bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixedPointType {
    SFixed8,
    UFixed8,
    SFixed16,
    UFixed16,
    SFixed32,
    UFixed32,
}

impl FixedPointType {
    pub fn from_bits(bits: u32, signed: bool) -> KernelResult<Self> {
        match (bits, signed) {
            (8, true) => Ok(Self::SFixed8),
            (8, false) => Ok(Self::UFixed8),
            (16, true) => Ok(Self::SFixed16),
            (16, false) => Ok(Self::UFixed16),
            (32, true) => Ok(Self::SFixed32),
            (32, false) => Ok(Self::UFixed32),
            _ => Err(KernelError::UnsupportedFixedPoint { bits, signed }),
        }
    }

    /// `(qmin, qmax)` of the target integer type.
    pub const fn qmin_qmax(self) -> (f64, f64) {
        match self {
            Self::SFixed8 => (i8::MIN as f64, i8::MAX as f64),
            Self::UFixed8 => (u8::MIN as f64, u8::MAX as f64),
            Self::SFixed16 => (i16::MIN as f64, i16::MAX as f64),
            Self::UFixed16 => (u16::MIN as f64, u16::MAX as f64),
            Self::SFixed32 => (i32::MIN as f64, i32::MAX as f64),
            Self::UFixed32 => (u32::MIN as f64, u32::MAX as f64),
        }
    }
}

/// Scale and zero-point derived from a float range.
///
/// `zero_point` carries the reference backend's negated sign convention; it is
/// wide enough to hold every supported fixed-point range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantParams {
    pub scale: f32,
    pub zero_point: i64,
}

/// Widen `[rmin, rmax]` so it spans at least 0.0001 and includes 0.0.
///
/// Zero must be exactly representable in the quantized domain so zero-padding
/// elsewhere in the pipeline stays lossless.
pub fn check_min_max(rmin: f32, rmax: f32) -> (f32, f32) {
    let rmax = rmax.max(rmin + 0.0001);
    (rmin.min(0.0), rmax.max(0.0))
}

#[inline(always)]
fn saturate(qmin: f64, qmax: f64, value: f64) -> f64 {
    value.clamp(qmin, qmax)
}

/// Derive scale and zero-point for quantizing `[rmin, rmax]` into `target`.
pub fn get_quant_params(
    rmin: f32,
    rmax: f32,
    target: FixedPointType,
    symmetric: bool,
) -> QuantParams {
    let (mut rmin, mut rmax) = check_min_max(rmin, rmax);
    if symmetric {
        let abs_max = rmin.abs().max(rmax.abs());
        rmin = -abs_max;
        rmax = abs_max;
    }

    let (qmin, qmax) = target.qmin_qmax();
    let scale = (rmax as f64 - rmin as f64) / (qmax - qmin);
    let initial_zero_point = if symmetric {
        (rmin as f64 + rmax as f64).round() / 2.0
    } else {
        qmin - rmin as f64 / scale
    };
    let zero_point = saturate(qmin, qmax, initial_zero_point).round_ties_even() as i64;
    QuantParams {
        scale: scale as f32,
        // Negated to match the consuming backend's quantization definition.
        zero_point: -zero_point,
    }
}

/// `round(value / scale - zero_point)`, saturated into the target's range.
///
/// The subtraction mirrors the negation applied when the zero-point was
/// derived; both sides must agree or round-trips silently corrupt.
pub fn quantize_value(
    value: f64,
    scale: f32,
    zero_point: i64,
    target: FixedPointType,
) -> i64 {
    let (qmin, qmax) = target.qmin_qmax();
    saturate(qmin, qmax, (value / scale as f64 - zero_point as f64).round()) as i64
}

/// `(quant_value + offset) * scale`, in double precision for stability
/// regardless of the storage width.
pub fn dequantize_value(offset: i64, scale: f32, quant_value: f64) -> f64 {
    (quant_value + offset as f64) * scale as f64
}
