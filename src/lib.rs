//! blockq-kernels: blockwise sub-byte weight quantization for LLM inference.
//!
//! This crate provides the numerically delicate core shared by inference
//! back-ends:
//! - **Bit-plane packing**: 3/4/5/6/7-bit values packed into byte-aligned
//!   blobs with bit-exact layouts, monomorphized per width
//! - **Blockwise codec**: per-block scale (and optional zero-point) derivation
//!   with f32-internal arithmetic for cross-backend bit-parity
//! - **Tensor driver**: column-major (K, N) blocking with rayon-parallel
//!   quantization and edge-masked dequantization
//! - **Float-range parameters**: the shared `get_quant_params` /
//!   `quantize_value` / `dequantize_value` fixed-point protocol
//!
//! # Quick Start
//!
//! ```
//! use blockq_kernels::{
//!     dequantize_blockwise, quantize_blockwise, BlockConfig, QuantBits, QuantScheme,
//! };
//!
//! let weights: Vec<f32> = (0..64).map(|i| (i as f32 - 32.0) * 0.05).collect();
//! let config = BlockConfig::new(QuantBits::Int4, 16);
//! let matrix = quantize_blockwise(&weights, 16, 4, config, QuantScheme::Asymmetric).unwrap();
//!
//! let mut restored = vec![0f32; 64];
//! dequantize_blockwise(&matrix, &mut restored).unwrap();
//! ```

pub mod bit_plane;
pub mod block_codec;
pub mod error;
pub mod kernel_types;
pub mod qparams;
pub mod quantization;

pub use bit_plane::{BitPlaneLayout, Int3Layout, Int4Layout, Int5Layout, Int6Layout, Int7Layout};
pub use block_codec::BlockCodec;
pub use error::{KernelError, KernelResult};
pub use kernel_types::{BlockConfig, KernelFloat, QuantBits, QuantScheme};
pub use qparams::{
    check_min_max, dequantize_value, get_quant_params, quantize_value, FixedPointType, QuantParams,
};
pub use quantization::{dequantize_blockwise, quantize_blockwise, QuantizedMatrix};
