//! Codec service contract.
//!
//! The bridge drives any perceptual codec through these traits: an encoder
//! that turns planar float PCM into opaque frames and a decoder that turns
//! those frames back into 16-bit PCM. Opening is fallible; closing is `Drop`.

pub mod spectral;

pub use spectral::SpectralCodec;

use crate::error::CodecError;

/// Samples per channel in one codec frame.
pub const FRAME_SAMPLES: usize = 1152;

/// Sample rates a session can be opened at.
pub const SUPPORTED_SAMPLE_RATES: [u32; 9] =
    [8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000];

/// Rate used when the host rate is not on the allow-list.
pub const FALLBACK_SAMPLE_RATE: u32 = 44100;

/// Constant bitrate every session starts at. Mid-stream changes only lower it.
pub const INITIAL_BITRATE_KBPS: u32 = 96;

/// Lowest bitrate a mid-stream change can reach.
pub const MIN_BITRATE_KBPS: u32 = 8;

/// Exact match against `supported`, otherwise the fallback rate.
pub fn snap_sample_rate(rate: u32, supported: &[u32]) -> u32 {
    if supported.contains(&rate) {
        rate
    } else {
        FALLBACK_SAMPLE_RATE
    }
}

/// Empirical worst case for encoded bytes produced from `samples` input samples.
pub fn default_max_encoded_len(samples: usize) -> usize {
    (samples as f64 * 1.25).ceil() as usize + 7200
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    /// Only the left input is coded; decoders emit it on both channels.
    Mono,
}

impl ChannelMode {
    pub fn channels(self) -> usize {
        match self {
            ChannelMode::Stereo => 2,
            ChannelMode::Mono => 1,
        }
    }
}

/// Settings shared by the encoder and decoder of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    pub sample_rate: u32,
    pub bitrate_kbps: u32,
    pub mode: ChannelMode,
    pub disable_reservoir: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: FALLBACK_SAMPLE_RATE,
            bitrate_kbps: INITIAL_BITRATE_KBPS,
            mode: ChannelMode::Stereo,
            disable_reservoir: true,
        }
    }
}

impl EncoderConfig {
    /// Reject rates off the allow-list and bitrates outside 8..=320 kbps.
    pub fn validate(&self, supported: &[u32]) -> Result<(), CodecError> {
        if !supported.contains(&self.sample_rate) {
            return Err(CodecError::InvalidConfig(format!(
                "unsupported sample rate {} Hz",
                self.sample_rate
            )));
        }
        if !(MIN_BITRATE_KBPS..=320).contains(&self.bitrate_kbps) {
            return Err(CodecError::InvalidConfig(format!(
                "bitrate {} kbps out of range",
                self.bitrate_kbps
            )));
        }
        Ok(())
    }
}

pub trait CodecEncoder: Send {
    /// Consume `min(left.len(), right.len())` samples and write any completed
    /// frames to `out`, returning the number of bytes written (possibly 0).
    fn encode(&mut self, left: &[f32], right: &[f32], out: &mut [u8]) -> Result<usize, CodecError>;

    /// Lower the target bitrate in place. `amount` in [0, 1] maps from the
    /// initial bitrate down to the minimum; `lowpass_hz` is a band-limit hint.
    fn change_bitrate_midstream(&mut self, lowpass_hz: u32, amount: f32);

    fn bitrate_kbps(&self) -> u32;
}

pub trait CodecDecoder: Send {
    /// Decode every frame in `data`, returning samples written per channel.
    fn decode(&mut self, data: &[u8], left: &mut [i16], right: &mut [i16]) -> Result<usize, CodecError>;
}

/// Factory for encoder/decoder pairs.
pub trait Codec {
    type Encoder: CodecEncoder;
    type Decoder: CodecDecoder;

    fn frame_samples(&self) -> usize {
        FRAME_SAMPLES
    }

    fn supported_sample_rates(&self) -> &[u32] {
        &SUPPORTED_SAMPLE_RATES
    }

    /// Bytes that always fit the frames produced from `samples` input samples.
    fn max_encoded_len(&self, samples: usize) -> usize {
        default_max_encoded_len(samples)
    }

    fn open_encoder(&self, config: &EncoderConfig) -> Result<Self::Encoder, CodecError>;

    fn open_decoder(&self, config: &EncoderConfig) -> Result<Self::Decoder, CodecError>;
}
