//! Whole-tensor blockwise quantization driver.
//!
//! A (K, N) row-major weight matrix is quantized column-major: each column is
//! cut into `ceil(K / block_size)` blocks along K, every block owning one scale
//! (and one zero-point under the asymmetric scheme) in side arrays aligned with
//! the flat block buffer. Block `b` of column `n` lives at flat index
//! `n * blocks_per_col + b`.
//!
//! The bit width is dispatched once per call; the per-element loops are
//! monomorphized over the plane layout. Quantization parallelizes across
//! columns because each column owns a disjoint chunk of every output buffer;
//! dequantization writes the strided row-major output serially.

use rayon::prelude::*;

use crate::bit_plane::{
    BitPlaneLayout, Int3Layout, Int4Layout, Int5Layout, Int6Layout, Int7Layout,
};
use crate::block_codec::BlockCodec;
use crate::error::{KernelError, KernelResult};
use crate::kernel_types::{BlockConfig, KernelFloat, QuantBits, QuantScheme};

/// A blockwise-quantized (K, N) matrix: flat column-major block buffer plus
/// caller-visible side arrays of per-block scales and optional zero-points.
///
/// `data` is sized once at construction from `(rows, cols, config)` and never
/// resized; blocks are addressed by computed byte offsets into it.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedMatrix<T> {
    pub data: Vec<u8>,
    pub scales: Vec<T>,
    pub zero_points: Option<Vec<u8>>,
    pub rows: usize,
    pub cols: usize,
    pub config: BlockConfig,
}

impl<T> QuantizedMatrix<T> {
    pub fn blocks_per_col(&self) -> usize {
        self.config.blocks_per_col(self.rows)
    }

    pub fn total_blocks(&self) -> usize {
        self.cols * self.blocks_per_col()
    }

    pub fn scheme(&self) -> QuantScheme {
        if self.zero_points.is_some() {
            QuantScheme::Asymmetric
        } else {
            QuantScheme::Symmetric
        }
    }
}

fn check_matrix_shape(len: usize, rows: usize, cols: usize) -> KernelResult<()> {
    if rows == 0 || cols == 0 {
        return Err(KernelError::InvalidShape(format!(
            "matrix dims ({rows}, {cols}) must be non-zero"
        )));
    }
    let total = rows
        .checked_mul(cols)
        .ok_or_else(|| KernelError::InvalidShape("matrix element count overflow".into()))?;
    if len < total {
        return Err(KernelError::InvalidShape(format!(
            "buffer of {len} elements is smaller than the ({rows}, {cols}) tensor"
        )));
    }
    Ok(())
}

/// Quantize a row-major (rows, cols) matrix into blockwise form.
pub fn quantize_blockwise<T: KernelFloat>(
    input: &[T],
    rows: usize,
    cols: usize,
    config: BlockConfig,
    scheme: QuantScheme,
) -> KernelResult<QuantizedMatrix<T>> {
    config.validate()?;
    check_matrix_shape(input.len(), rows, cols)?;
    log::trace!(
        "blockwise quantize: shape ({rows}, {cols}), {} bits, block size {}, {scheme:?}",
        config.bits.bits(),
        config.block_size
    );
    match config.bits {
        QuantBits::Int3 => quantize_typed::<T, Int3Layout>(input, rows, cols, config, scheme),
        QuantBits::Int4 => quantize_typed::<T, Int4Layout>(input, rows, cols, config, scheme),
        QuantBits::Int5 => quantize_typed::<T, Int5Layout>(input, rows, cols, config, scheme),
        QuantBits::Int6 => quantize_typed::<T, Int6Layout>(input, rows, cols, config, scheme),
        QuantBits::Int7 => quantize_typed::<T, Int7Layout>(input, rows, cols, config, scheme),
    }
}

fn quantize_typed<T: KernelFloat, B: BitPlaneLayout>(
    input: &[T],
    rows: usize,
    cols: usize,
    config: BlockConfig,
    scheme: QuantScheme,
) -> KernelResult<QuantizedMatrix<T>> {
    let codec = BlockCodec::<T, B>::new(config.block_size)?;
    let block_size = config.block_size;
    let block_bytes = codec.block_bytes();
    let blocks_per_col = config.blocks_per_col(rows);
    let col_bytes = blocks_per_col * block_bytes;
    let total_blocks = cols * blocks_per_col;

    let mut data = vec![0u8; total_blocks * block_bytes];
    let mut scales = vec![T::zero(); total_blocks];

    let zero_points = match scheme {
        QuantScheme::Symmetric => {
            data.par_chunks_mut(col_bytes)
                .zip(scales.par_chunks_mut(blocks_per_col))
                .enumerate()
                .try_for_each(|(n, (col_data, col_scales))| -> KernelResult<()> {
                    for b in 0..blocks_per_col {
                        let k_idx = b * block_size;
                        let blob = &mut col_data[b * block_bytes..(b + 1) * block_bytes];
                        col_scales[b] =
                            codec.quant(&input[k_idx * cols + n..], cols, k_idx, rows, blob)?;
                    }
                    Ok(())
                })?;
            None
        }
        QuantScheme::Asymmetric => {
            let mut zps = vec![0u8; total_blocks];
            data.par_chunks_mut(col_bytes)
                .zip(scales.par_chunks_mut(blocks_per_col))
                .zip(zps.par_chunks_mut(blocks_per_col))
                .enumerate()
                .try_for_each(
                    |(n, ((col_data, col_scales), col_zps))| -> KernelResult<()> {
                        for b in 0..blocks_per_col {
                            let k_idx = b * block_size;
                            let blob = &mut col_data[b * block_bytes..(b + 1) * block_bytes];
                            let (scale, zp) = codec.quant_with_zero_point(
                                &input[k_idx * cols + n..],
                                cols,
                                k_idx,
                                rows,
                                blob,
                            )?;
                            col_scales[b] = scale;
                            col_zps[b] = zp;
                        }
                        Ok(())
                    },
                )?;
            Some(zps)
        }
    };

    Ok(QuantizedMatrix {
        data,
        scales,
        zero_points,
        rows,
        cols,
        config,
    })
}

/// Expand a blockwise-quantized matrix back into row-major floats.
///
/// Only rows below the matrix's K bound are written; when `rows` is not a
/// multiple of the block size, output positions past the final partial block's
/// valid range are left untouched.
pub fn dequantize_blockwise<T: KernelFloat>(
    matrix: &QuantizedMatrix<T>,
    output: &mut [T],
) -> KernelResult<()> {
    matrix.config.validate()?;
    check_matrix_shape(output.len(), matrix.rows, matrix.cols)?;

    let total_blocks = matrix.total_blocks();
    if matrix.data.len() != total_blocks * matrix.config.block_bytes() {
        return Err(KernelError::InvalidShape(format!(
            "block buffer is {} bytes, metadata implies {}",
            matrix.data.len(),
            total_blocks * matrix.config.block_bytes()
        )));
    }
    if matrix.scales.len() != total_blocks {
        return Err(KernelError::InvalidShape(format!(
            "{} scales for {total_blocks} blocks",
            matrix.scales.len()
        )));
    }
    if let Some(zps) = &matrix.zero_points {
        if zps.len() != total_blocks {
            return Err(KernelError::InvalidShape(format!(
                "{} zero-points for {total_blocks} blocks",
                zps.len()
            )));
        }
    }

    match matrix.config.bits {
        QuantBits::Int3 => dequantize_typed::<T, Int3Layout>(matrix, output),
        QuantBits::Int4 => dequantize_typed::<T, Int4Layout>(matrix, output),
        QuantBits::Int5 => dequantize_typed::<T, Int5Layout>(matrix, output),
        QuantBits::Int6 => dequantize_typed::<T, Int6Layout>(matrix, output),
        QuantBits::Int7 => dequantize_typed::<T, Int7Layout>(matrix, output),
    }
}

fn dequantize_typed<T: KernelFloat, B: BitPlaneLayout>(
    matrix: &QuantizedMatrix<T>,
    output: &mut [T],
) -> KernelResult<()> {
    let codec = BlockCodec::<T, B>::new(matrix.config.block_size)?;
    let block_size = matrix.config.block_size;
    let block_bytes = codec.block_bytes();
    let blocks_per_col = matrix.blocks_per_col();

    for n in 0..matrix.cols {
        for b in 0..blocks_per_col {
            let block_idx = n * blocks_per_col + b;
            let blob = &matrix.data[block_idx * block_bytes..(block_idx + 1) * block_bytes];
            let scale = matrix.scales[block_idx];
            let k_idx = b * block_size;
            let dst = &mut output[k_idx * matrix.cols + n..];
            match &matrix.zero_points {
                Some(zps) => codec.dequant_with_zero_point(
                    blob,
                    scale,
                    zps[block_idx],
                    k_idx,
                    matrix.rows,
                    dst,
                    matrix.cols,
                )?,
                None => codec.dequant(blob, scale, k_idx, matrix.rows, dst, matrix.cols)?,
            }
        }
    }
    Ok(())
}
