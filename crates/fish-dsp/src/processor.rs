//! Block orchestrator: the per-callback policy around the codec bridge.
//!
//! Signal path for every host block:
//!
//! ```text
//! input gain -> pre-filter -> downsample -> codec round trip -> upsample
//!            -> post-filter -> output gain
//! ```
//!
//! With a downsample ratio of 1 the resampling stage and the post-filter are
//! skipped and full-rate audio goes straight through the codec.
//! Nothing here allocates after `initialize`.

use log::{info, warn};

use crate::bridge::CodecBridge;
use crate::codec::Codec;
use crate::error::FishError;
use crate::filters::{lowpass_coeffs, Biquad};
use crate::params::{pre_filter_cutoff, FishParams};
use crate::resample::{Downsampler, Upsampler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    /// Initialized and primed, no block processed yet.
    Ready,
    Processing,
}

/// Outcome of one `process` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Processed,
    /// Processed, but the codec had too little decoded audio for at least
    /// one chunk; those samples carry the uncoded signal instead.
    Underrun,
    /// Unsupported channel layout; the block was left untouched.
    Rejected,
    /// Not initialized; the block was left untouched.
    Bypassed,
}

/// Running counters since the last `initialize`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub blocks: u64,
    pub underruns: u64,
    pub codec_errors: u64,
    pub rejected_blocks: u64,
}

/// Filters and resamplers for one channel.
struct ChannelStrip {
    pre: Biquad,
    post: Biquad,
    down: Downsampler,
    up: Upsampler,
}

impl ChannelStrip {
    fn new(ratio: usize) -> Self {
        Self {
            pre: Biquad::default(),
            post: Biquad::default(),
            down: Downsampler::new(ratio),
            up: Upsampler::new(ratio),
        }
    }
}

pub struct FishProcessor<C: Codec> {
    bridge: CodecBridge<C>,
    params: FishParams,
    state: EngineState,
    amount: f32,
    sample_rate: f64,
    max_block: usize,
    ratio: usize,
    strips: [ChannelStrip; 2],
    decimated: [Vec<f32>; 2],
    mono_scratch: Vec<f32>,
    stats: ProcessStats,
}

impl<C: Codec> FishProcessor<C> {
    pub fn new(codec: C, params: FishParams) -> Self {
        let ratio = params.downsample_ratio.max(1) as usize;
        Self {
            bridge: CodecBridge::new(codec),
            amount: params.fish.clamp(0.0, 1.0) as f32,
            params,
            state: EngineState::Uninitialized,
            sample_rate: 0.0,
            max_block: 0,
            ratio,
            strips: [ChannelStrip::new(ratio), ChannelStrip::new(ratio)],
            decimated: [Vec::new(), Vec::new()],
            mono_scratch: Vec::new(),
            stats: ProcessStats::default(),
        }
    }

    /// Prepare for playback at `sample_rate` with host blocks of up to
    /// `max_block` samples. Any previous session is torn down first.
    ///
    /// On error the processor stays uninitialized and passes audio through.
    pub fn initialize(&mut self, sample_rate: u32, max_block: usize) -> Result<(), FishError> {
        self.teardown();

        if max_block == 0 {
            return Err(FishError::ZeroBlockSize);
        }
        self.params.validate()?;

        self.bridge.initialize(sample_rate, max_block)?;
        if let Err(e) = self.bridge.prime_silence() {
            self.bridge.deinitialize();
            return Err(e.into());
        }

        self.sample_rate = sample_rate as f64;
        self.max_block = max_block;
        self.ratio = self.params.downsample_ratio as usize;
        self.strips = [ChannelStrip::new(self.ratio), ChannelStrip::new(self.ratio)];

        let post = lowpass_coeffs(
            self.params.post_filter_freq,
            self.params.post_filter_q,
            self.sample_rate,
        );
        for strip in &mut self.strips {
            strip.post.set_coefficients(post);
        }
        self.apply_amount(self.amount);

        let decimated_len = self.strips[0].down.max_output_len(max_block);
        self.decimated = [vec![0.0; decimated_len], vec![0.0; decimated_len]];
        self.mono_scratch = vec![0.0; max_block];
        self.stats = ProcessStats::default();
        self.state = EngineState::Ready;

        info!(
            "fish engine ready: {} Hz, max block {}, ratio {}, latency {} samples",
            sample_rate,
            max_block,
            self.ratio,
            self.latency_samples()
        );
        Ok(())
    }

    /// Release the codec session. Audio passes through until re-initialized.
    pub fn teardown(&mut self) {
        self.bridge.deinitialize();
        self.state = EngineState::Uninitialized;
    }

    /// Process one host block in place.
    ///
    /// `change` carries a new distortion amount collected from the control
    /// thread; it is applied before any audio in this block is touched.
    pub fn process(&mut self, channels: &mut [&mut [f32]], change: Option<f32>) -> BlockStatus {
        if self.state == EngineState::Uninitialized {
            // Keep the value so the next `initialize` starts from it.
            if let Some(amount) = change {
                self.amount = sanitize_amount(amount);
            }
            return BlockStatus::Bypassed;
        }
        if let Some(amount) = change {
            self.apply_amount(amount);
        }

        let count = channels.len();
        let underrun = match channels {
            [mono] => self.process_channels(mono, None),
            [left, right] => self.process_channels(left, Some(&mut **right)),
            _ => {
                warn!("only mono or stereo is supported, got {count} channels; passing through");
                self.stats.rejected_blocks += 1;
                return BlockStatus::Rejected;
            }
        };

        self.state = EngineState::Processing;
        self.stats.blocks += 1;
        if underrun {
            BlockStatus::Underrun
        } else {
            BlockStatus::Processed
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Distortion amount currently in effect.
    pub fn amount(&self) -> f32 {
        self.amount
    }

    /// Pre-filter cutoff in Hz for the current amount.
    pub fn pre_filter_cutoff(&self) -> f64 {
        pre_filter_cutoff(self.amount as f64, self.params.downsample_ratio)
    }

    pub fn params(&self) -> &FishParams {
        &self.params
    }

    pub fn stats(&self) -> ProcessStats {
        self.stats
    }

    /// One codec frame expressed in host-rate samples.
    pub fn latency_samples(&self) -> usize {
        self.bridge.frame_samples() * self.ratio
    }

    /// Current encoder bitrate, if initialized.
    pub fn codec_bitrate_kbps(&self) -> Option<u32> {
        self.bridge.bitrate_kbps()
    }

    /// Number of decoded samples waiting in the bridge.
    pub fn queued_samples(&self) -> usize {
        self.bridge.queued_sample_count()
    }

    fn apply_amount(&mut self, amount: f32) {
        let amount = sanitize_amount(amount);
        self.amount = amount;
        let coeffs = lowpass_coeffs(
            self.pre_filter_cutoff(),
            self.params.pre_filter_q,
            self.sample_rate,
        );
        for strip in &mut self.strips {
            strip.pre.set_coefficients(coeffs);
        }
        self.bridge.retarget(amount);
    }

    /// Split the block into `max_block` chunks. Returns true on any underrun.
    fn process_channels(&mut self, left: &mut [f32], mut right: Option<&mut [f32]>) -> bool {
        let n = match right.as_deref() {
            Some(r) => left.len().min(r.len()),
            None => left.len(),
        };
        let mut underrun = false;
        for start in (0..n).step_by(self.max_block) {
            let end = (start + self.max_block).min(n);
            let chunk_r = right.as_deref_mut().map(|r| &mut r[start..end]);
            underrun |= self.process_chunk(&mut left[start..end], chunk_r);
        }
        underrun
    }

    fn process_chunk(&mut self, left: &mut [f32], mut right: Option<&mut [f32]>) -> bool {
        let in_gain = self.params.input_gain as f32;
        let out_gain = self.params.output_gain as f32;

        apply_gain(left, in_gain);
        self.strips[0].pre.process_in_place(left);
        if let Some(r) = right.as_deref_mut() {
            apply_gain(r, in_gain);
            self.strips[1].pre.process_in_place(r);
        }

        let underrun = if self.ratio > 1 {
            self.round_trip_decimated(left, right.as_deref_mut())
        } else {
            self.round_trip_full_rate(left, right.as_deref_mut())
        };

        apply_gain(left, out_gain);
        if let Some(r) = right {
            apply_gain(r, out_gain);
        }
        underrun
    }

    fn round_trip_decimated(&mut self, left: &mut [f32], right: Option<&mut [f32]>) -> bool {
        let n = left.len();
        let [dec_l, dec_r] = &mut self.decimated;
        let [strip_l, strip_r] = &mut self.strips;

        let count = strip_l.down.downsample(left, dec_l);
        // Mono feeds the left channel to both codec inputs.
        let source_r: &[f32] = match right.as_deref() {
            Some(r) => r,
            None => &*left,
        };
        let count = count.min(strip_r.down.downsample(source_r, dec_r));

        if self.bridge.push_block(&dec_l[..count], &dec_r[..count]).is_err() {
            self.stats.codec_errors += 1;
        }
        let pulled = self
            .bridge
            .pull_block(&mut dec_l[..count], &mut dec_r[..count]);
        if !pulled {
            self.stats.underruns += 1;
        }

        strip_l.up.upsample(&dec_l[..count], left);
        strip_l.post.process_in_place(left);
        match right {
            Some(r) => {
                strip_r.up.upsample(&dec_r[..count], r);
                strip_r.post.process_in_place(r);
            }
            None => {
                // Keep the unused right path in phase for a later stereo block.
                let scratch = &mut self.mono_scratch[..n];
                strip_r.up.upsample(&dec_r[..count], scratch);
                strip_r.post.process_in_place(scratch);
            }
        }
        !pulled
    }

    fn round_trip_full_rate(&mut self, left: &mut [f32], right: Option<&mut [f32]>) -> bool {
        let n = left.len();
        let pushed = match right.as_deref() {
            Some(r) => self.bridge.push_block(left, r),
            None => self.bridge.push_block(&*left, &*left),
        };
        if pushed.is_err() {
            self.stats.codec_errors += 1;
        }

        let pulled = match right {
            Some(r) => self.bridge.pull_block(left, r),
            None => self.bridge.pull_block(left, &mut self.mono_scratch[..n]),
        };
        if !pulled {
            self.stats.underruns += 1;
        }
        !pulled
    }
}

fn sanitize_amount(amount: f32) -> f32 {
    if amount.is_nan() {
        0.0
    } else {
        amount.clamp(0.0, 1.0)
    }
}

#[inline]
fn apply_gain(block: &mut [f32], gain: f32) {
    for s in block.iter_mut() {
        *s *= gain;
    }
}
