use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    #[error("unsupported quant bits: {0}")]
    UnsupportedBits(u8),
    #[error("unsupported fixed-point target: {bits}-bit (signed: {signed})")]
    UnsupportedFixedPoint { bits: u32, signed: bool },
}

pub type KernelResult<T> = Result<T, KernelError>;
