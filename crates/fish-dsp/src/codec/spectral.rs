//! Transform-domain lossy codec used as the round-trip stage.
//!
//! Each frame covers `2 * frame` samples under a sine window with 50%
//! overlap, so analysis and synthesis windows together reconstruct the input
//! exactly when nothing is quantized. Loss comes from two knobs:
//!
//!   Bitrate  -- sets the quantizer resolution of every coded coefficient
//!   Lowpass  -- coefficients above the band-limit hint are not coded at all
//!
//! Frame layout (little endian):
//!
//! ```text
//! "FS" | channels: u8 | bits: u8 | bins: u16 | per channel: scale f32, bins x (re i16, im i16)
//! ```
//!
//! The decoder lags the encoder by exactly one frame: decoding frame `k`
//! yields the `frame` samples that preceded the newest input in that frame.

use num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::f64::consts::PI;
use std::sync::Arc;

use super::{
    default_max_encoded_len, Codec, CodecDecoder, CodecEncoder, EncoderConfig, FRAME_SAMPLES,
    INITIAL_BITRATE_KBPS, MIN_BITRATE_KBPS,
};
use crate::error::CodecError;

const SYNC: [u8; 2] = *b"FS";
const HEADER_LEN: usize = 6;
const MAX_QUANT_BITS: u32 = 14;
const MIN_QUANT_BITS: u32 = 2;
const MIN_FRAME_SAMPLES: usize = 16;

/// Quantizer resolution for a bitrate, 14 bits at the initial bitrate.
pub fn quant_bits_for_bitrate(kbps: u32) -> u32 {
    let bits = (kbps as f64 / INITIAL_BITRATE_KBPS as f64 * MAX_QUANT_BITS as f64).round() as u32;
    bits.clamp(MIN_QUANT_BITS, MAX_QUANT_BITS)
}

/// Map a distortion amount in [0, 1] linearly onto the initial..minimum bitrate.
pub fn bitrate_for_amount(amount: f32) -> u32 {
    let a = if amount.is_nan() { 0.0 } else { amount.clamp(0.0, 1.0) as f64 };
    let span = (INITIAL_BITRATE_KBPS - MIN_BITRATE_KBPS) as f64;
    (INITIAL_BITRATE_KBPS as f64 - a * span).round() as u32
}

/// Encoded size of one frame.
pub fn frame_len(channels: usize, bins: usize) -> usize {
    HEADER_LEN + channels * (4 + 4 * bins)
}

fn sine_window(len: usize) -> Vec<f64> {
    (0..len)
        .map(|j| (PI * (j as f64 + 0.5) / len as f64).sin())
        .collect()
}

#[inline]
fn to_pcm(v: f64) -> i16 {
    (v * i16::MAX as f64).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

#[inline]
fn quant_max(bits: u32) -> f64 {
    ((1_u32 << (bits - 1)) - 1) as f64
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Factory for spectral encoder/decoder pairs.
#[derive(Debug, Clone, Copy)]
pub struct SpectralCodec {
    frame: usize,
}

impl SpectralCodec {
    pub fn new() -> Self {
        Self {
            frame: FRAME_SAMPLES,
        }
    }

    /// Use a different hop size. Values below 16 are raised to 16.
    pub fn with_frame_samples(frame: usize) -> Self {
        Self {
            frame: frame.max(MIN_FRAME_SAMPLES),
        }
    }
}

impl Default for SpectralCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for SpectralCodec {
    type Encoder = SpectralEncoder;
    type Decoder = SpectralDecoder;

    fn frame_samples(&self) -> usize {
        self.frame
    }

    fn max_encoded_len(&self, samples: usize) -> usize {
        let frames = samples / self.frame + 1;
        default_max_encoded_len(samples).max(frames * frame_len(2, self.frame + 1))
    }

    fn open_encoder(&self, config: &EncoderConfig) -> Result<SpectralEncoder, CodecError> {
        config.validate(self.supported_sample_rates())?;
        Ok(SpectralEncoder::new(self.frame, config))
    }

    fn open_decoder(&self, config: &EncoderConfig) -> Result<SpectralDecoder, CodecError> {
        config.validate(self.supported_sample_rates())?;
        Ok(SpectralDecoder::new(self.frame))
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

pub struct SpectralEncoder {
    frame: usize,
    channels: usize,
    sample_rate: u32,
    bitrate_kbps: u32,
    coded_bins: usize,
    window: Vec<f64>,
    history: [Vec<f32>; 2],
    pending: [Vec<f32>; 2],
    fill: usize,
    fft: Arc<dyn RealToComplex<f64>>,
    fft_in: Vec<f64>,
    spectrum: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl SpectralEncoder {
    fn new(frame: usize, config: &EncoderConfig) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(2 * frame);
        let fft_in = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();
        Self {
            frame,
            channels: config.mode.channels(),
            sample_rate: config.sample_rate,
            bitrate_kbps: config.bitrate_kbps,
            coded_bins: frame + 1,
            window: sine_window(2 * frame),
            history: [vec![0.0; frame], vec![0.0; frame]],
            pending: [vec![0.0; frame], vec![0.0; frame]],
            fill: 0,
            fft,
            fft_in,
            spectrum,
            scratch,
        }
    }

    /// Number of spectral bins currently coded per channel.
    pub fn coded_bins(&self) -> usize {
        self.coded_bins
    }

    fn current_frame_len(&self) -> usize {
        frame_len(self.channels, self.coded_bins)
    }

    fn bins_below(&self, lowpass_hz: u32) -> usize {
        let bin_hz = self.sample_rate as f64 / (2 * self.frame) as f64;
        ((lowpass_hz as f64 / bin_hz).floor() as usize + 1).min(self.frame + 1)
    }

    fn write_frame(&mut self, out: &mut [u8]) -> Result<usize, CodecError> {
        let n = self.frame;
        let bins = self.coded_bins;
        let bits = quant_bits_for_bitrate(self.bitrate_kbps);
        let qmax = quant_max(bits);

        out[0..2].copy_from_slice(&SYNC);
        out[2] = self.channels as u8;
        out[3] = bits as u8;
        out[4..6].copy_from_slice(&(bins as u16).to_le_bytes());
        let mut pos = HEADER_LEN;

        for ch in 0..self.channels {
            let (hist, pend) = (&self.history[ch], &self.pending[ch]);
            for j in 0..n {
                self.fft_in[j] = hist[j] as f64 * self.window[j];
                self.fft_in[n + j] = pend[j] as f64 * self.window[n + j];
            }
            self.fft
                .process_with_scratch(&mut self.fft_in, &mut self.spectrum, &mut self.scratch)?;

            let peak = self.spectrum[..bins]
                .iter()
                .fold(0.0_f64, |m, c| m.max(c.re.abs()).max(c.im.abs()));
            let scale = if peak.is_finite() { peak as f32 } else { 0.0 };
            out[pos..pos + 4].copy_from_slice(&scale.to_le_bytes());
            pos += 4;

            let gain = if scale > 0.0 { qmax / scale as f64 } else { 0.0 };
            for c in &self.spectrum[..bins] {
                let re = (c.re * gain).round().clamp(-qmax, qmax) as i16;
                let im = (c.im * gain).round().clamp(-qmax, qmax) as i16;
                out[pos..pos + 2].copy_from_slice(&re.to_le_bytes());
                out[pos + 2..pos + 4].copy_from_slice(&im.to_le_bytes());
                pos += 4;
            }
        }
        Ok(pos)
    }
}

impl CodecEncoder for SpectralEncoder {
    fn encode(&mut self, left: &[f32], right: &[f32], out: &mut [u8]) -> Result<usize, CodecError> {
        let n = left.len().min(right.len());
        let frames = (self.fill + n) / self.frame;
        let needed = frames * self.current_frame_len();
        if needed > out.len() {
            return Err(CodecError::BufferTooSmall {
                needed,
                available: out.len(),
            });
        }

        let mut written = 0;
        let mut consumed = 0;
        while consumed < n {
            let take = (self.frame - self.fill).min(n - consumed);
            let dst = self.fill..self.fill + take;
            self.pending[0][dst.clone()].copy_from_slice(&left[consumed..consumed + take]);
            if self.channels == 2 {
                self.pending[1][dst].copy_from_slice(&right[consumed..consumed + take]);
            }
            self.fill += take;
            consumed += take;

            if self.fill == self.frame {
                written += self.write_frame(&mut out[written..])?;
                for ch in 0..self.channels {
                    let (history, pending) = (&mut self.history[ch], &mut self.pending[ch]);
                    std::mem::swap(history, pending);
                }
                self.fill = 0;
            }
        }
        Ok(written)
    }

    fn change_bitrate_midstream(&mut self, lowpass_hz: u32, amount: f32) {
        self.bitrate_kbps = bitrate_for_amount(amount);
        self.coded_bins = self.bins_below(lowpass_hz);
    }

    fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct FrameHeader {
    channels: usize,
    bits: u32,
    bins: usize,
}

fn parse_header(bytes: &[u8], offset: usize, frame: usize) -> Result<FrameHeader, CodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::Truncated {
            expected: HEADER_LEN,
            found: bytes.len(),
        });
    }
    if bytes[0..2] != SYNC {
        return Err(CodecError::MalformedFrame { offset });
    }
    let channels = bytes[2] as usize;
    if !(1..=2).contains(&channels) {
        return Err(CodecError::MalformedFrame { offset: offset + 2 });
    }
    let bits = bytes[3] as u32;
    if !(MIN_QUANT_BITS..=MAX_QUANT_BITS).contains(&bits) {
        return Err(CodecError::MalformedFrame { offset: offset + 3 });
    }
    let bins = u16::from_le_bytes([bytes[4], bytes[5]]) as usize;
    if bins == 0 || bins > frame + 1 {
        return Err(CodecError::MalformedFrame { offset: offset + 4 });
    }
    Ok(FrameHeader {
        channels,
        bits,
        bins,
    })
}

#[inline]
fn read_f32(bytes: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

pub struct SpectralDecoder {
    frame: usize,
    window: Vec<f64>,
    overlap: [Vec<f64>; 2],
    ifft: Arc<dyn ComplexToReal<f64>>,
    spectrum: Vec<Complex<f64>>,
    time: Vec<f64>,
    scratch: Vec<Complex<f64>>,
}

impl SpectralDecoder {
    fn new(frame: usize) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let ifft = planner.plan_fft_inverse(2 * frame);
        let spectrum = ifft.make_input_vec();
        let time = ifft.make_output_vec();
        let scratch = ifft.make_scratch_vec();
        Self {
            frame,
            window: sine_window(2 * frame),
            overlap: [vec![0.0; frame], vec![0.0; frame]],
            ifft,
            spectrum,
            time,
            scratch,
        }
    }

    /// Walk every frame in `data` without decoding, returning the frame count.
    fn validate(&self, data: &[u8]) -> Result<usize, CodecError> {
        let mut offset = 0;
        let mut frames = 0;
        while offset < data.len() {
            let header = parse_header(&data[offset..], offset, self.frame)?;
            let len = frame_len(header.channels, header.bins);
            let found = data.len() - offset;
            if found < len {
                return Err(CodecError::Truncated { expected: len, found });
            }
            for ch in 0..header.channels {
                let at = offset + HEADER_LEN + ch * (4 + 4 * header.bins);
                let scale = read_f32(data, at);
                if !scale.is_finite() || scale < 0.0 {
                    return Err(CodecError::MalformedFrame { offset: at });
                }
            }
            offset += len;
            frames += 1;
        }
        Ok(frames)
    }

    /// Inverse-transform one channel payload and overlap-add into `out`.
    fn synthesize(
        &mut self,
        ch: usize,
        payload: &[u8],
        header: FrameHeader,
        out: &mut [i16],
    ) -> Result<(), CodecError> {
        let n = self.frame;
        let step = read_f32(payload, 0) as f64 / quant_max(header.bits);

        self.spectrum.fill(Complex::new(0.0, 0.0));
        for (k, bin) in self.spectrum[..header.bins].iter_mut().enumerate() {
            let at = 4 + 4 * k;
            let re = i16::from_le_bytes([payload[at], payload[at + 1]]) as f64;
            let im = i16::from_le_bytes([payload[at + 2], payload[at + 3]]) as f64;
            *bin = Complex::new(re * step, im * step);
        }
        // A real signal has no imaginary part at DC or Nyquist.
        self.spectrum[0].im = 0.0;
        self.spectrum[n].im = 0.0;

        self.ifft
            .process_with_scratch(&mut self.spectrum, &mut self.time, &mut self.scratch)?;

        let norm = 1.0 / (2 * n) as f64;
        let overlap = &mut self.overlap[ch];
        for j in 0..n {
            let head = self.time[j] * norm * self.window[j];
            out[j] = to_pcm(overlap[j] + head);
            overlap[j] = self.time[n + j] * norm * self.window[n + j];
        }
        Ok(())
    }
}

impl CodecDecoder for SpectralDecoder {
    fn decode(&mut self, data: &[u8], left: &mut [i16], right: &mut [i16]) -> Result<usize, CodecError> {
        let frames = self.validate(data)?;
        let needed = frames * self.frame;
        let available = left.len().min(right.len());
        if needed > available {
            return Err(CodecError::OutputTooSmall { needed, available });
        }

        let n = self.frame;
        let mut offset = 0;
        let mut written = 0;
        while offset < data.len() {
            let header = parse_header(&data[offset..], offset, n)?;
            let stride = 4 + 4 * header.bins;
            let mut at = offset + HEADER_LEN;

            self.synthesize(0, &data[at..at + stride], header, &mut left[written..written + n])?;
            at += stride;
            if header.channels == 2 {
                self.synthesize(1, &data[at..at + stride], header, &mut right[written..written + n])?;
            } else {
                right[written..written + n].copy_from_slice(&left[written..written + n]);
            }

            offset += frame_len(header.channels, header.bins);
            written += n;
        }
        Ok(written)
    }
}
