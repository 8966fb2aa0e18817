//! Codec round-trip distortion engine.
//!
//! Audio is band-limited, decimated, pushed through a lossy codec's
//! encode→decode round trip and interpolated back, so the codec's
//! quantization artifacts become the effect. One control, the "fish"
//! amount in [0, 1], lowers the codec bitrate and the pre-filter cutoff.
//!
//! Entry point: [`FishProcessor::process`], driven once per host block.

pub mod bridge;
pub mod codec;
pub mod control;
pub mod error;
pub mod filters;
pub mod params;
pub mod processor;
pub mod resample;

pub use bridge::{CodecBridge, CodecSession};
pub use codec::{Codec, SpectralCodec};
pub use control::ControlParameter;
pub use error::{CodecError, FishError};
pub use params::FishParams;
pub use processor::{BlockStatus, EngineState, FishProcessor, ProcessStats};
