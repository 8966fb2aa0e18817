//! Error taxonomy for the codec bridge and the block orchestrator.

use thiserror::Error;

/// Failures raised by a codec session or the bridge around it.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid codec configuration: {0}")]
    InvalidConfig(String),

    #[error("encoder could not be opened: {0}")]
    EncoderInit(String),

    #[error("decoder could not be opened: {0}")]
    DecoderInit(String),

    #[error("encoded buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("decode buffer too small: need {needed} samples, have {available}")]
    OutputTooSmall { needed: usize, available: usize },

    #[error("malformed frame at byte {offset}")]
    MalformedFrame { offset: usize },

    #[error("truncated frame: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("transform failed: {0}")]
    Transform(#[from] realfft::FftError),

    #[error("codec session is not open")]
    NotOpen,
}

/// Failures raised while configuring or initializing the engine.
#[derive(Debug, Error)]
pub enum FishError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("downsample ratio must be between 1 and 16, got {0}")]
    InvalidRatio(u32),

    #[error("maximum block size must be non-zero")]
    ZeroBlockSize,

    #[error("invalid parameter {name}: {value}")]
    InvalidParam { name: &'static str, value: f64 },

    #[error("failed to parse parameters: {0}")]
    Params(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
