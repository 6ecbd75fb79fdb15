//! Bit-plane packing for sub-byte quantized blocks.
//!
//! A block of `block_size` values at `bits` width occupies exactly
//! `block_size * bits / 8` bytes. For the power-of-two width (4) the blob is a
//! single nibble plane; for the odd widths (3, 5, 6, 7) it is split into fixed
//! bit-planes, grouping the low bits of every element together so bulk
//! extraction stays SIMD-friendly:
//!
//! | bits | planes (byte offsets for block size `bs`)                        |
//! |------|------------------------------------------------------------------|
//! | 3    | low 2 bits at `0`, high 1 bit at `bs/4`                          |
//! | 4    | nibbles at `0`                                                   |
//! | 5    | low 4 bits at `0`, high 1 bit at `bs/2`                          |
//! | 6    | low 4 bits at `0`, high 2 bits at `bs/2`                         |
//! | 7    | low 4 bits at `0`, middle 2 bits at `bs/2`, high 1 bit at `bs*6/8` |
//!
//! Within a `w`-bit plane, element `i` occupies bits `w * (i % (8/w))` of byte
//! `i / (8/w)`. Plane boundaries only land on whole bytes when `block_size` is
//! a multiple of 8, which the codec enforces at construction.
//!
//! Pure bit arithmetic; no floating point anywhere in this module.

/// Monomorphized per-width pack/unpack. Selected once at configuration time so
/// the per-element hot loop carries no width branching.
pub trait BitPlaneLayout: Copy + Default + Send + Sync + 'static {
    const BITS: usize;

    /// Packed bytes for a block of `block_size` values.
    #[inline(always)]
    fn packed_bytes(block_size: usize) -> usize {
        block_size * Self::BITS / 8
    }

    /// Write value `v` (low `BITS` bits significant) at element index `idx`.
    fn pack(blob: &mut [u8], block_size: usize, idx: usize, v: u8);

    /// Read the element at index `idx` as an unsigned `BITS`-wide integer.
    fn unpack(blob: &[u8], block_size: usize, idx: usize) -> u8;
}

#[inline(always)]
fn plane_set(plane: &mut [u8], width: usize, idx: usize, v: u8) {
    let per_byte = 8 / width;
    let shift = (idx % per_byte) * width;
    let mask = ((1u16 << width) - 1) as u8;
    let byte = &mut plane[idx / per_byte];
    *byte = (*byte & !(mask << shift)) | ((v & mask) << shift);
}

#[inline(always)]
fn plane_get(plane: &[u8], width: usize, idx: usize) -> u8 {
    let per_byte = 8 / width;
    let shift = (idx % per_byte) * width;
    let mask = ((1u16 << width) - 1) as u8;
    (plane[idx / per_byte] >> shift) & mask
}

/// 3-bit: low 2-bit plane + high 1-bit plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct Int3Layout;

/// 4-bit: two values per byte, even index in the low nibble.
#[derive(Debug, Clone, Copy, Default)]
pub struct Int4Layout;

/// 5-bit: low 4-bit plane + high 1-bit plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct Int5Layout;

/// 6-bit: low 4-bit plane + high 2-bit plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct Int6Layout;

/// 7-bit: low 4-bit plane + middle 2-bit plane + high 1-bit plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct Int7Layout;

impl BitPlaneLayout for Int3Layout {
    const BITS: usize = 3;

    #[inline(always)]
    fn pack(blob: &mut [u8], block_size: usize, idx: usize, v: u8) {
        let (low, high) = blob.split_at_mut(block_size / 4);
        plane_set(low, 2, idx, v & 0x3);
        plane_set(high, 1, idx, v >> 2);
    }

    #[inline(always)]
    fn unpack(blob: &[u8], block_size: usize, idx: usize) -> u8 {
        let (low, high) = blob.split_at(block_size / 4);
        plane_get(low, 2, idx) | (plane_get(high, 1, idx) << 2)
    }
}

impl BitPlaneLayout for Int4Layout {
    const BITS: usize = 4;

    #[inline(always)]
    fn pack(blob: &mut [u8], _block_size: usize, idx: usize, v: u8) {
        plane_set(blob, 4, idx, v);
    }

    #[inline(always)]
    fn unpack(blob: &[u8], _block_size: usize, idx: usize) -> u8 {
        plane_get(blob, 4, idx)
    }
}

impl BitPlaneLayout for Int5Layout {
    const BITS: usize = 5;

    #[inline(always)]
    fn pack(blob: &mut [u8], block_size: usize, idx: usize, v: u8) {
        let (low, high) = blob.split_at_mut(block_size / 2);
        plane_set(low, 4, idx, v & 0xF);
        plane_set(high, 1, idx, v >> 4);
    }

    #[inline(always)]
    fn unpack(blob: &[u8], block_size: usize, idx: usize) -> u8 {
        let (low, high) = blob.split_at(block_size / 2);
        plane_get(low, 4, idx) | (plane_get(high, 1, idx) << 4)
    }
}

impl BitPlaneLayout for Int6Layout {
    const BITS: usize = 6;

    #[inline(always)]
    fn pack(blob: &mut [u8], block_size: usize, idx: usize, v: u8) {
        let (low, high) = blob.split_at_mut(block_size / 2);
        plane_set(low, 4, idx, v & 0xF);
        plane_set(high, 2, idx, v >> 4);
    }

    #[inline(always)]
    fn unpack(blob: &[u8], block_size: usize, idx: usize) -> u8 {
        let (low, high) = blob.split_at(block_size / 2);
        plane_get(low, 4, idx) | (plane_get(high, 2, idx) << 4)
    }
}

impl BitPlaneLayout for Int7Layout {
    const BITS: usize = 7;

    #[inline(always)]
    fn pack(blob: &mut [u8], block_size: usize, idx: usize, v: u8) {
        let (low, rest) = blob.split_at_mut(block_size / 2);
        let (middle, high) = rest.split_at_mut(block_size / 4);
        plane_set(low, 4, idx, v & 0xF);
        plane_set(middle, 2, idx, (v >> 4) & 0x3);
        plane_set(high, 1, idx, v >> 6);
    }

    #[inline(always)]
    fn unpack(blob: &[u8], block_size: usize, idx: usize) -> u8 {
        let (low, rest) = blob.split_at(block_size / 2);
        let (middle, high) = rest.split_at(block_size / 4);
        plane_get(low, 4, idx)
            | (plane_get(middle, 2, idx) << 4)
            | (plane_get(high, 1, idx) << 6)
    }
}
