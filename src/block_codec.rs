//! Per-block quantize/dequantize, the scalar core shared by every backend.
//!
//! Semantics match the reference hardware quantization exactly: all arithmetic
//! is f32-internal regardless of the element type, degenerate (constant-zero)
//! blocks take the guarded-reciprocal path instead of dividing, and rows past
//! the tensor's K bound are masked out rather than zero-filled.

use std::marker::PhantomData;

use crate::bit_plane::BitPlaneLayout;
use crate::error::{KernelError, KernelResult};
use crate::kernel_types::KernelFloat;

/// Blockwise codec for one `(T, block_size, bits)` triple.
///
/// Construction is the fail-fast configuration gate: an unaligned block size is
/// rejected here, before any block is processed. After that every operation is
/// pure, bounded and branch-free on the bit width (monomorphized over `B`).
#[derive(Debug, Clone, Copy)]
pub struct BlockCodec<T, B> {
    block_size: usize,
    block_bytes: usize,
    _marker: PhantomData<fn() -> (T, B)>,
}

impl<T: KernelFloat, B: BitPlaneLayout> BlockCodec<T, B> {
    /// Bit-plane boundaries must land on whole bytes: `block_size % 8 == 0`.
    pub fn new(block_size: usize) -> KernelResult<Self> {
        if block_size == 0 || block_size % 8 != 0 {
            return Err(KernelError::InvalidConfig(format!(
                "block size {block_size} must be a non-zero multiple of 8"
            )));
        }
        Ok(Self {
            block_size,
            block_bytes: B::packed_bytes(block_size),
            _marker: PhantomData,
        })
    }

    #[inline(always)]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    #[inline(always)]
    pub fn block_bytes(&self) -> usize {
        self.block_bytes
    }

    /// Valid element count of the block starting at row `k_idx` of a column
    /// with `k_rows` rows.
    #[inline(always)]
    fn klen(&self, k_idx: usize, k_rows: usize) -> KernelResult<usize> {
        if k_idx >= k_rows {
            return Err(KernelError::InvalidShape(format!(
                "block start {k_idx} is past the tensor's {k_rows} rows"
            )));
        }
        Ok(self.block_size.min(k_rows - k_idx))
    }

    fn check_blob(&self, len: usize) -> KernelResult<()> {
        if len != self.block_bytes {
            return Err(KernelError::InvalidShape(format!(
                "block blob is {len} bytes, codec needs {}",
                self.block_bytes
            )));
        }
        Ok(())
    }

    fn check_src(&self, len: usize, stride: usize, klen: usize) -> KernelResult<()> {
        if stride == 0 || len < (klen - 1) * stride + 1 {
            return Err(KernelError::InvalidShape(format!(
                "source of {len} elements cannot cover {klen} values at stride {stride}"
            )));
        }
        Ok(())
    }

    /// Symmetric quantization of one block. Reads `min(block_size, K - k_idx)`
    /// values from `src` at `stride`, packs the full block into `blob` and
    /// returns the scale.
    ///
    /// The scale is `max / -2^(bits-1)` where `max` is the signed value of
    /// largest magnitude, so the midpoint offset is baked into the scale sign
    /// and decode needs no zero-point.
    pub fn quant(
        &self,
        src: &[T],
        stride: usize,
        k_idx: usize,
        k_rows: usize,
        blob: &mut [u8],
    ) -> KernelResult<T> {
        self.check_blob(blob.len())?;
        let klen = self.klen(k_idx, k_rows)?;
        self.check_src(src.len(), stride, klen)?;

        let mut amax = 0.0f32;
        let mut max = 0.0f32;
        for kk in 0..klen {
            let v = src[kk * stride].to_f32();
            if v.abs() > amax {
                amax = v.abs();
                max = v;
            }
        }

        let midpoint = (1i32 << (B::BITS - 1)) as f32;
        let q_max = ((1u32 << B::BITS) - 1) as f32;
        let scale = max / -midpoint;
        let reciprocal_scale = if scale != 0.0 { 1.0 / scale } else { 0.0 };

        for kk in 0..self.block_size {
            // Padding past klen packs as source value 0.0; the format has no
            // hole representation.
            let v = if kk < klen {
                src[kk * stride].to_f32() * reciprocal_scale
            } else {
                0.0
            };
            let q = (v + midpoint + 0.5).clamp(0.0, q_max) as u8;
            B::pack(blob, self.block_size, kk, q);
        }
        Ok(T::from_f32(scale))
    }

    /// Asymmetric quantization of one block: data-derived scale and zero-point.
    /// The observed range is widened to include 0.0 so zero stays exactly
    /// representable.
    pub fn quant_with_zero_point(
        &self,
        src: &[T],
        stride: usize,
        k_idx: usize,
        k_rows: usize,
        blob: &mut [u8],
    ) -> KernelResult<(T, u8)> {
        self.check_blob(blob.len())?;
        let klen = self.klen(k_idx, k_rows)?;
        self.check_src(src.len(), stride, klen)?;

        let mut min = src[0].to_f32();
        let mut max = min;
        for kk in 1..klen {
            let v = src[kk * stride].to_f32();
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
        min = min.min(0.0);
        max = max.max(0.0);

        let q_max = ((1u32 << B::BITS) - 1) as f32;
        let scale = (max - min) / q_max;
        let reciprocal_scale = if scale != 0.0 { 1.0 / scale } else { 0.0 };
        let zero_point_fp = if scale != 0.0 { -min / scale } else { min };
        let zp = zero_point_fp.clamp(0.0, q_max).round() as u8;

        for kk in 0..self.block_size {
            let v = if kk < klen { src[kk * stride].to_f32() } else { 0.0 };
            let q = (v * reciprocal_scale + zp as f32).round().clamp(0.0, q_max) as u8;
            B::pack(blob, self.block_size, kk, q);
        }
        Ok((T::from_f32(scale), zp))
    }

    /// Dequantize one block with the symmetric scheme's implicit midpoint
    /// zero-point (`2^(bits-1)`, i.e. 8 for 4-bit).
    pub fn dequant(
        &self,
        blob: &[u8],
        scale: T,
        k_idx: usize,
        k_rows: usize,
        dst: &mut [T],
        stride: usize,
    ) -> KernelResult<()> {
        let zp = 1u8 << (B::BITS - 1);
        self.dequant_with_zero_point(blob, scale, zp, k_idx, k_rows, dst, stride)
    }

    /// Dequantize one block: `dst[i * stride] = scale * (q_i - zp)` for exactly
    /// those `i` with `k_idx + i < k_rows`. Rows past the K bound are left
    /// untouched, not zero-filled.
    pub fn dequant_with_zero_point(
        &self,
        blob: &[u8],
        scale: T,
        zp: u8,
        k_idx: usize,
        k_rows: usize,
        dst: &mut [T],
        stride: usize,
    ) -> KernelResult<()> {
        self.check_blob(blob.len())?;
        let valid = self.klen(k_idx, k_rows)?;
        if stride == 0 || dst.len() < (valid - 1) * stride + 1 {
            return Err(KernelError::InvalidShape(format!(
                "destination of {} elements cannot hold {valid} values at stride {stride}",
                dst.len()
            )));
        }

        let scale = scale.to_f32();
        let zp = zp as f32;
        for i in 0..valid {
            let q = B::unpack(blob, self.block_size, i) as f32;
            dst[i * stride] = T::from_f32(scale * (q - zp));
        }
        Ok(())
    }
}
