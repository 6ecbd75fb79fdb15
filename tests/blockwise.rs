//! Integration tests for the blockwise sub-byte codec.
//!
//! Covers the properties the codec guarantees to every backend:
//! - quant/dequant round-trip within one quantization step, all widths
//! - final partial block masks rows past K instead of zero-filling
//! - fixed 4-bit scenarios with known scales and zero-points
//! - fail-fast configuration errors

use proptest::prelude::*;

use blockq_kernels::{
    dequantize_blockwise, quantize_blockwise, BitPlaneLayout, BlockCodec, BlockConfig, Int4Layout,
    QuantBits, QuantScheme,
};

const ALL_BITS: [QuantBits; 5] = [
    QuantBits::Int3,
    QuantBits::Int4,
    QuantBits::Int5,
    QuantBits::Int6,
    QuantBits::Int7,
];

fn max_step(matrix: &blockq_kernels::QuantizedMatrix<f32>) -> f32 {
    matrix
        .scales
        .iter()
        .fold(0.0f32, |acc, s| acc.max(s.abs()))
}

#[test]
fn roundtrip_all_widths_and_block_sizes() {
    for bits in ALL_BITS {
        for block_size in [8, 16, 32, 64, 128] {
            for scheme in [QuantScheme::Symmetric, QuantScheme::Asymmetric] {
                let rows = block_size + block_size / 2;
                let cols = 3;
                let input: Vec<f32> = (0..rows * cols)
                    .map(|i| ((i * 29 % 23) as f32 - 11.0) * 0.09)
                    .collect();

                let config = BlockConfig::new(bits, block_size);
                let matrix = quantize_blockwise(&input, rows, cols, config, scheme).unwrap();
                let mut output = vec![0f32; rows * cols];
                dequantize_blockwise(&matrix, &mut output).unwrap();

                let step = max_step(&matrix);
                for (orig, deq) in input.iter().zip(output.iter()) {
                    assert!(
                        (orig - deq).abs() <= step + 1e-5,
                        "bits={bits:?} bs={block_size} scheme={scheme:?}: {orig} vs {deq}"
                    );
                }
            }
        }
    }
}

#[test]
fn boundary_block_k11() {
    // block_size = 8, K = 11: elements at rows 8, 9, 10 are written and
    // nothing past row 10 is touched.
    let rows = 11;
    let cols = 1;
    let input: Vec<f32> = (0..rows).map(|i| i as f32 * 0.2 - 1.0).collect();
    let config = BlockConfig::new(QuantBits::Int4, 8);
    let matrix = quantize_blockwise(&input, rows, cols, config, QuantScheme::Asymmetric).unwrap();

    let sentinel = f32::MIN;
    let mut output = vec![sentinel; 16];
    dequantize_blockwise(&matrix, &mut output).unwrap();

    let step = max_step(&matrix);
    for k in 0..rows {
        assert!((output[k] - input[k]).abs() <= step + 1e-6, "row {k}");
    }
    for k in rows..16 {
        assert_eq!(output[k], sentinel, "row {k} must stay untouched");
    }
}

#[test]
fn symmetric_4bit_sign_convention() {
    // Quantizing [-1, 1] symmetric at 4 bits: |scale| = 1/8 and 0.0 maps to
    // the implicit zero-point 8.
    let codec = BlockCodec::<f32, Int4Layout>::new(8).unwrap();
    let src = [1.0f32, -1.0, 0.0, 0.5, -0.5, 0.125, -0.125, 0.75];
    let mut blob = [0u8; 4];
    let scale = codec.quant(&src, 1, 0, 8, &mut blob).unwrap();
    assert!((scale.abs() - 0.125).abs() < 1e-6);
    assert_eq!(Int4Layout::unpack(&blob, 8, 2), 8);

    let mut out = [0f32; 8];
    codec.dequant(&blob, scale, 0, 8, &mut out, 1).unwrap();
    assert_eq!(out[2], 0.0);
    for (orig, deq) in src.iter().zip(out.iter()) {
        assert!((orig - deq).abs() <= scale.abs() + 1e-6);
    }
}

#[test]
fn asymmetric_4bit_known_scale() {
    // min = -1, max = 1 (zero already included): scale = 2/15.
    let codec = BlockCodec::<f32, Int4Layout>::new(8).unwrap();
    let src = [0.0f32, 0.5, 1.0, -1.0, 0.2, -0.4, 0.8, -0.6];
    let mut blob = [0u8; 4];
    let (scale, zp) = codec.quant_with_zero_point(&src, 1, 0, 8, &mut blob).unwrap();
    assert!((scale - 2.0 / 15.0).abs() < 1e-6);

    let mut out = [0f32; 8];
    codec
        .dequant_with_zero_point(&blob, scale, zp, 0, 8, &mut out, 1)
        .unwrap();
    for (orig, deq) in src.iter().zip(out.iter()) {
        assert!((orig - deq).abs() <= scale + 1e-6, "{orig} vs {deq}");
    }
}

#[test]
fn config_errors_fail_fast() {
    let input = vec![0f32; 64];
    // Block size not a multiple of 8.
    let config = BlockConfig::new(QuantBits::Int4, 12);
    assert!(quantize_blockwise(&input, 8, 8, config, QuantScheme::Symmetric).is_err());
    // Raw bit widths outside 3..=7 never reach the codec.
    assert!(QuantBits::from_bits(2).is_err());
    assert!(QuantBits::from_bits(8).is_err());
}

#[test]
fn scheme_recorded_in_matrix() {
    let input = vec![0.5f32; 32];
    let config = BlockConfig::new(QuantBits::Int6, 8);
    let sym = quantize_blockwise(&input, 16, 2, config, QuantScheme::Symmetric).unwrap();
    assert_eq!(sym.scheme(), QuantScheme::Symmetric);
    assert!(sym.zero_points.is_none());

    let asym = quantize_blockwise(&input, 16, 2, config, QuantScheme::Asymmetric).unwrap();
    assert_eq!(asym.scheme(), QuantScheme::Asymmetric);
    assert_eq!(asym.zero_points.as_ref().unwrap().len(), asym.total_blocks());
}

proptest! {
    /// Round-trip error never exceeds one quantization step, for any input
    /// block, any width, any supported block size.
    #[test]
    fn prop_roundtrip_within_one_step(
        values in prop::collection::vec(-4.0f32..4.0, 1..96),
        bits_sel in 0usize..5,
        bs_sel in 0usize..4,
        symmetric in any::<bool>(),
    ) {
        let bits = ALL_BITS[bits_sel];
        let block_size = [8usize, 16, 32, 64][bs_sel];
        let rows = values.len();
        let scheme = if symmetric { QuantScheme::Symmetric } else { QuantScheme::Asymmetric };

        let config = BlockConfig::new(bits, block_size);
        let matrix = quantize_blockwise(&values, rows, 1, config, scheme).unwrap();
        let mut output = vec![0f32; rows];
        dequantize_blockwise(&matrix, &mut output).unwrap();

        let blocks_per_col = matrix.blocks_per_col();
        prop_assert_eq!(blocks_per_col, rows.div_ceil(block_size));
        for k in 0..rows {
            let step = matrix.scales[k / block_size].abs();
            prop_assert!(
                (values[k] - output[k]).abs() <= step + 1e-4,
                "bits={:?} bs={} row {}: {} vs {} (step {})",
                bits, block_size, k, values[k], output[k], step
            );
        }
    }

    /// The packed buffer size is a pure function of (block_size, bits).
    #[test]
    fn prop_blob_size_is_configuration_determined(
        rows in 1usize..200,
        cols in 1usize..8,
        bits_sel in 0usize..5,
        bs_sel in 0usize..4,
    ) {
        let bits = ALL_BITS[bits_sel];
        let block_size = [8usize, 16, 32, 64][bs_sel];
        let input = vec![0.25f32; rows * cols];
        let config = BlockConfig::new(bits, block_size);
        let matrix = quantize_blockwise(&input, rows, cols, config, QuantScheme::Symmetric).unwrap();
        let expected = cols * rows.div_ceil(block_size) * (block_size * bits.bits() / 8);
        prop_assert_eq!(matrix.data.len(), expected);
    }
}
