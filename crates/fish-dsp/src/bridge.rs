//! Codec bridge: pushes arbitrary-length blocks through an encode→decode
//! round trip and buffers the decoded audio until the host asks for it.
//!
//! The codec only emits audio in whole frames, so a push may enqueue zero,
//! one or several frames' worth of samples. The two elastic queues absorb
//! that burstiness; `pull_block` hands out exactly one host block at a time
//! or reports an underrun.

use log::{debug, info, warn};
use shared_dsp::QueueBuffer;

use crate::codec::{
    snap_sample_rate, ChannelMode, Codec, CodecDecoder, CodecEncoder, EncoderConfig,
    INITIAL_BITRATE_KBPS,
};
use crate::error::CodecError;

/// Frames of silence pushed through a fresh session before real audio.
pub const PRIMING_FRAMES: usize = 3;

/// Band-limit hint handed to the encoder for a distortion amount.
pub fn lowpass_hint_hz(amount: f32) -> u32 {
    if amount < 0.25 {
        10000
    } else if amount < 0.5 {
        7000
    } else if amount < 0.75 {
        3900
    } else {
        2000
    }
}

/// Paired encoder and decoder opened with the same configuration.
///
/// Both halves exist or neither does: a failed decoder open drops the
/// already-open encoder before the error is returned.
pub struct CodecSession<C: Codec> {
    pub encoder: C::Encoder,
    pub decoder: C::Decoder,
    pub config: EncoderConfig,
}

impl<C: Codec> CodecSession<C> {
    pub fn open(codec: &C, config: EncoderConfig) -> Result<Self, CodecError> {
        let encoder = codec.open_encoder(&config)?;
        let decoder = codec.open_decoder(&config)?;
        Ok(Self {
            encoder,
            decoder,
            config,
        })
    }
}

pub struct CodecBridge<C: Codec> {
    codec: C,
    session: Option<CodecSession<C>>,
    encoded: Vec<u8>,
    decoded_l: Vec<i16>,
    decoded_r: Vec<i16>,
    queue_l: QueueBuffer<f32>,
    queue_r: QueueBuffer<f32>,
    silence: Vec<f32>,
    sample_rate: u32,
}

impl<C: Codec> CodecBridge<C> {
    /// Create an uninitialized bridge. Nothing is allocated until `initialize`.
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            session: None,
            encoded: Vec::new(),
            decoded_l: Vec::new(),
            decoded_r: Vec::new(),
            queue_l: QueueBuffer::new(0, 0.0),
            queue_r: QueueBuffer::new(0, 0.0),
            silence: Vec::new(),
            sample_rate: 0,
        }
    }

    /// Open a session for `sample_rate` (snapped to the codec allow-list) and
    /// size every buffer for pushes of up to `max_block` samples.
    pub fn initialize(&mut self, sample_rate: u32, max_block: usize) -> Result<(), CodecError> {
        self.deinitialize();

        if max_block == 0 {
            return Err(CodecError::InvalidConfig(
                "maximum block size must be non-zero".into(),
            ));
        }

        let frame = self.codec.frame_samples();
        let rate = snap_sample_rate(sample_rate, self.codec.supported_sample_rates());
        let config = EncoderConfig {
            sample_rate: rate,
            bitrate_kbps: INITIAL_BITRATE_KBPS,
            mode: ChannelMode::Stereo,
            disable_reservoir: true,
        };
        let session = CodecSession::open(&self.codec, config)?;

        let largest_push = max_block.max(PRIMING_FRAMES * frame);
        self.encoded = vec![0; self.codec.max_encoded_len(largest_push)];
        let decoded_len = (largest_push / frame + 2) * frame;
        self.decoded_l = vec![0; decoded_len];
        self.decoded_r = vec![0; decoded_len];
        self.queue_l = QueueBuffer::new(frame + max_block, 0.0);
        self.queue_r = QueueBuffer::new(frame + max_block, 0.0);
        self.silence = vec![0.0; PRIMING_FRAMES * frame];
        self.sample_rate = rate;
        self.session = Some(session);

        info!(
            "codec bridge ready: {} Hz (host {} Hz), {} kbps, max block {}",
            rate, sample_rate, INITIAL_BITRATE_KBPS, max_block
        );
        Ok(())
    }

    /// Close the session. Buffers are kept for reuse.
    pub fn deinitialize(&mut self) {
        self.session = None;
        self.queue_l.clear();
        self.queue_r.clear();
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Snapped sample rate the session runs at, 0 before `initialize`.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_samples(&self) -> usize {
        self.codec.frame_samples()
    }

    /// Encode and decode a few frames of silence, discarding the result.
    pub fn prime_silence(&mut self) -> Result<(), CodecError> {
        let session = self.session.as_mut().ok_or(CodecError::NotOpen)?;
        let bytes = session
            .encoder
            .encode(&self.silence, &self.silence, &mut self.encoded)?;
        session
            .decoder
            .decode(&self.encoded[..bytes], &mut self.decoded_l, &mut self.decoded_r)?;
        Ok(())
    }

    /// Round-trip one block and enqueue whatever the decoder produced.
    ///
    /// Returns the number of samples enqueued per channel. On failure nothing
    /// is enqueued and the queues keep their previous contents.
    pub fn push_block(&mut self, left: &[f32], right: &[f32]) -> Result<usize, CodecError> {
        let Some(session) = self.session.as_mut() else {
            warn!("push_block called without an open codec session");
            return Err(CodecError::NotOpen);
        };

        let bytes = match session.encoder.encode(left, right, &mut self.encoded) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("encode failed: {e}");
                return Err(e);
            }
        };
        let decoded = match session.decoder.decode(
            &self.encoded[..bytes],
            &mut self.decoded_l,
            &mut self.decoded_r,
        ) {
            Ok(n) => n,
            Err(e) => {
                warn!("decode failed: {e}");
                return Err(e);
            }
        };

        let scale = 1.0 / i16::MAX as f32;
        for &s in &self.decoded_l[..decoded] {
            self.queue_l.enqueue(s as f32 * scale);
        }
        for &s in &self.decoded_r[..decoded] {
            self.queue_r.enqueue(s as f32 * scale);
        }
        Ok(decoded)
    }

    /// Dequeue exactly `min(left.len(), right.len())` samples per channel.
    ///
    /// Returns `false` and leaves the outputs untouched when fewer are queued.
    pub fn pull_block(&mut self, left: &mut [f32], right: &mut [f32]) -> bool {
        let n = left.len().min(right.len());
        if self.queue_l.len() < n || self.queue_r.len() < n {
            return false;
        }
        for s in &mut left[..n] {
            *s = self.queue_l.dequeue();
        }
        for s in &mut right[..n] {
            *s = self.queue_r.dequeue();
        }
        true
    }

    pub fn queued_sample_count(&self) -> usize {
        self.queue_l.len()
    }

    /// Move the encoder to the bitrate and band limit for `amount`.
    ///
    /// Takes effect on the next encoded frame; buffers are untouched.
    pub fn retarget(&mut self, amount: f32) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let lowpass = lowpass_hint_hz(amount);
        session.encoder.change_bitrate_midstream(lowpass, amount);
        debug!(
            "codec retarget: amount {amount:.3}, lowpass {lowpass} Hz, {} kbps",
            session.encoder.bitrate_kbps()
        );
    }

    /// Current encoder bitrate, if a session is open.
    pub fn bitrate_kbps(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.encoder.bitrate_kbps())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::spectral::{SpectralDecoder, SpectralEncoder};
    use crate::codec::{SpectralCodec, FRAME_SAMPLES};

    const N: usize = FRAME_SAMPLES;

    fn ready(sample_rate: u32, max_block: usize) -> CodecBridge<SpectralCodec> {
        let mut bridge = CodecBridge::new(SpectralCodec::new());
        bridge.initialize(sample_rate, max_block).unwrap();
        bridge.prime_silence().unwrap();
        bridge
    }

    #[test]
    fn test_push_silence_then_pull() {
        let mut bridge = ready(44100, 512);
        let zeros = vec![0.0_f32; 128];
        for _ in 0..10 {
            bridge.push_block(&zeros, &zeros).unwrap();
        }
        let mut l = vec![1.0_f32; 128];
        let mut r = vec![1.0_f32; 128];
        assert!(bridge.pull_block(&mut l, &mut r));
        assert!(l.iter().chain(&r).all(|&s| s == 0.0));
    }

    #[test]
    fn test_priming_leaves_queue_empty() {
        let bridge = ready(44100, 512);
        assert_eq!(bridge.queued_sample_count(), 0);
    }

    #[test]
    fn test_push_enqueues_whole_frames() {
        let mut bridge = ready(48000, 512);
        let block = vec![0.25_f32; 512];
        let mut total = 0;
        for _ in 0..9 {
            let n = bridge.push_block(&block, &block).unwrap();
            assert!(n == 0 || n == N);
            total += n;
        }
        assert_eq!(total, (9 * 512) / N * N);
        // Older samples were evicted once the backlog exceeded capacity.
        assert_eq!(bridge.queued_sample_count(), total.min(N + 512));
    }

    #[test]
    fn test_underrun_leaves_outputs_untouched() {
        let mut bridge = ready(44100, 256);
        let mut l = vec![0.5_f32; 256];
        let mut r = vec![-0.5_f32; 256];
        assert!(!bridge.pull_block(&mut l, &mut r));
        assert!(l.iter().all(|&s| s == 0.5));
        assert!(r.iter().all(|&s| s == -0.5));
    }

    #[test]
    fn test_queue_capacity_bounds_backlog() {
        let mut bridge = ready(44100, 64);
        let block = vec![0.1_f32; 64];
        for _ in 0..200 {
            bridge.push_block(&block, &block).unwrap();
        }
        assert!(bridge.queued_sample_count() <= N + 64);
    }

    #[test]
    fn test_unsupported_rate_snaps_to_fallback() {
        let bridge = ready(96000, 512);
        assert_eq!(bridge.sample_rate(), 44100);
        let bridge = ready(22050, 512);
        assert_eq!(bridge.sample_rate(), 22050);
    }

    #[test]
    fn test_not_open_before_initialize() {
        let mut bridge = CodecBridge::new(SpectralCodec::new());
        let x = [0.0_f32; 8];
        assert!(matches!(bridge.push_block(&x, &x), Err(CodecError::NotOpen)));
        assert!(matches!(bridge.prime_silence(), Err(CodecError::NotOpen)));
        assert!(!bridge.is_initialized());
        bridge.retarget(0.5);
        assert_eq!(bridge.bitrate_kbps(), None);
    }

    #[test]
    fn test_retarget_lowers_bitrate() {
        let mut bridge = ready(44100, 512);
        assert_eq!(bridge.bitrate_kbps(), Some(96));
        bridge.retarget(1.0);
        assert_eq!(bridge.bitrate_kbps(), Some(8));
        bridge.retarget(0.0);
        assert_eq!(bridge.bitrate_kbps(), Some(96));
    }

    #[test]
    fn test_lowpass_hint_table() {
        assert_eq!(lowpass_hint_hz(0.0), 10000);
        assert_eq!(lowpass_hint_hz(0.24), 10000);
        assert_eq!(lowpass_hint_hz(0.25), 7000);
        assert_eq!(lowpass_hint_hz(0.5), 3900);
        assert_eq!(lowpass_hint_hz(0.75), 2000);
        assert_eq!(lowpass_hint_hz(1.0), 2000);
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let mut bridge = CodecBridge::new(SpectralCodec::new());
        assert!(matches!(
            bridge.initialize(44100, 0),
            Err(CodecError::InvalidConfig(_))
        ));
        assert!(!bridge.is_initialized());
    }

    /// Encoder that always fails, decoder borrowed from the spectral codec.
    struct BrokenEncoder;

    impl CodecEncoder for BrokenEncoder {
        fn encode(&mut self, _: &[f32], _: &[f32], _: &mut [u8]) -> Result<usize, CodecError> {
            Err(CodecError::MalformedFrame { offset: 0 })
        }
        fn change_bitrate_midstream(&mut self, _: u32, _: f32) {}
        fn bitrate_kbps(&self) -> u32 {
            96
        }
    }

    struct BrokenCodec;

    impl Codec for BrokenCodec {
        type Encoder = BrokenEncoder;
        type Decoder = SpectralDecoder;

        fn open_encoder(&self, _: &EncoderConfig) -> Result<BrokenEncoder, CodecError> {
            Ok(BrokenEncoder)
        }
        fn open_decoder(&self, config: &EncoderConfig) -> Result<SpectralDecoder, CodecError> {
            SpectralCodec::new().open_decoder(config)
        }
        fn frame_samples(&self) -> usize {
            SpectralCodec::new().frame_samples()
        }
        fn max_encoded_len(&self, samples: usize) -> usize {
            SpectralCodec::new().max_encoded_len(samples)
        }
    }

    #[test]
    fn test_encode_failure_is_non_fatal() {
        let mut bridge = CodecBridge::new(BrokenCodec);
        bridge.initialize(44100, 256).unwrap();
        assert!(bridge.prime_silence().is_err());
        let x = vec![0.3_f32; 256];
        assert!(bridge.push_block(&x, &x).is_err());
        assert_eq!(bridge.queued_sample_count(), 0);
        assert!(bridge.is_initialized());
    }

    struct NoDecoderCodec;

    impl Codec for NoDecoderCodec {
        type Encoder = SpectralEncoder;
        type Decoder = SpectralDecoder;

        fn open_encoder(&self, config: &EncoderConfig) -> Result<SpectralEncoder, CodecError> {
            SpectralCodec::new().open_encoder(config)
        }
        fn open_decoder(&self, _: &EncoderConfig) -> Result<SpectralDecoder, CodecError> {
            Err(CodecError::DecoderInit("no decoder".into()))
        }
    }

    #[test]
    fn test_partial_open_leaves_bridge_closed() {
        let mut bridge = CodecBridge::new(NoDecoderCodec);
        assert!(matches!(
            bridge.initialize(44100, 256),
            Err(CodecError::DecoderInit(_))
        ));
        assert!(!bridge.is_initialized());
    }

    #[test]
    fn test_reinitialize_discards_backlog() {
        let mut bridge = ready(44100, 512);
        let block = vec![0.2_f32; 512];
        for _ in 0..4 {
            bridge.push_block(&block, &block).unwrap();
        }
        assert!(bridge.queued_sample_count() > 0);
        bridge.initialize(44100, 512).unwrap();
        assert_eq!(bridge.queued_sample_count(), 0);
    }
}
