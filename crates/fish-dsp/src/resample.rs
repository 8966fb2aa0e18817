//! Integer-ratio decimation and linear-interpolation upsampling.
//!
//! No anti-alias filter is applied here; the orchestrator's pre-filter
//! and post-filter band-limit around this stage, and the remaining
//! aliasing is part of the sound. Phase persists across calls so block
//! boundaries are seamless.

/// Keeps every `ratio`-th sample.
#[derive(Debug, Clone)]
pub struct Downsampler {
    ratio: usize,
    step: usize,
}

impl Downsampler {
    /// A ratio of 0 is treated as 1.
    pub fn new(ratio: usize) -> Self {
        Self {
            ratio: ratio.max(1),
            step: 0,
        }
    }

    pub fn ratio(&self) -> usize {
        self.ratio
    }

    /// Output length that always fits one call with `input_len` samples.
    pub fn max_output_len(&self, input_len: usize) -> usize {
        input_len.div_ceil(self.ratio)
    }

    /// Decimate `input` into `output`, returning the number of samples written.
    ///
    /// If `output` is shorter than needed the surplus is dropped; the phase
    /// still advances over the whole input.
    pub fn downsample(&mut self, input: &[f32], output: &mut [f32]) -> usize {
        let mut written = 0;
        for &x in input {
            if self.step == 0 {
                if let Some(slot) = output.get_mut(written) {
                    *slot = x;
                    written += 1;
                }
            }
            self.step = (self.step + 1) % self.ratio;
        }
        written
    }

    pub fn clear(&mut self) {
        self.step = 0;
    }
}

/// Linear-interpolating upsampler, the inverse of `Downsampler`.
#[derive(Debug, Clone)]
pub struct Upsampler {
    ratio: usize,
    step: usize,
    prev: f32,
    curr: f32,
}

impl Upsampler {
    /// A ratio of 0 is treated as 1.
    pub fn new(ratio: usize) -> Self {
        Self {
            ratio: ratio.max(1),
            step: 0,
            prev: 0.0,
            curr: 0.0,
        }
    }

    /// Fill all of `output`, returning how many input samples were consumed.
    ///
    /// A new anchor is taken from `input` whenever the phase wraps to zero.
    /// If `input` runs out first, the last anchor is held.
    pub fn upsample(&mut self, input: &[f32], output: &mut [f32]) -> usize {
        let mut consumed = 0;
        let ratio = self.ratio as f32;
        for out in output.iter_mut() {
            if self.step == 0 {
                self.prev = self.curr;
                if let Some(&x) = input.get(consumed) {
                    self.curr = x;
                    consumed += 1;
                }
            }
            let t = self.step as f32 / ratio;
            *out = self.prev + (self.curr - self.prev) * t;
            self.step = (self.step + 1) % self.ratio;
        }
        consumed
    }

    /// Reset phase and both anchors to zero.
    pub fn clear(&mut self) {
        self.step = 0;
        self.prev = 0.0;
        self.curr = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32).collect()
    }

    #[test]
    fn test_downsample_keeps_every_nth() {
        let mut d = Downsampler::new(4);
        let mut out = vec![0.0; 4];
        let n = d.downsample(&ramp(16), &mut out);
        assert_eq!(n, 4);
        assert_eq!(out, vec![0.0, 4.0, 8.0, 12.0]);
    }

    #[test]
    fn test_downsample_phase_persists_across_blocks() {
        let input = ramp(22);
        let mut d = Downsampler::new(4);
        let mut collected = Vec::new();
        for chunk in input.chunks(3) {
            let mut out = vec![0.0; d.max_output_len(chunk.len())];
            let n = d.downsample(chunk, &mut out);
            collected.extend_from_slice(&out[..n]);
        }
        assert_eq!(collected, vec![0.0, 4.0, 8.0, 12.0, 16.0, 20.0]);
    }

    #[test]
    fn test_downsample_never_overruns_output() {
        let mut d = Downsampler::new(2);
        let mut out = vec![0.0; 2];
        assert_eq!(d.downsample(&ramp(10), &mut out), 2);
        assert_eq!(out, vec![0.0, 2.0]);
    }

    #[test]
    fn test_zero_ratio_passes_through_one_sample_late() {
        let mut d = Downsampler::new(0);
        let mut u = Upsampler::new(0);
        assert_eq!(d.ratio(), 1);
        let input = ramp(5);
        let mut mid = vec![0.0; 5];
        assert_eq!(d.downsample(&input, &mut mid), 5);
        let mut out = vec![0.0; 5];
        assert_eq!(u.upsample(&mid, &mut out), 5);
        // Step 0 emits the previous anchor.
        assert_eq!(out, vec![0.0, 0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_upsample_interpolates() {
        let mut u = Upsampler::new(4);
        let mut out = vec![0.0; 8];
        let consumed = u.upsample(&[4.0, 8.0], &mut out);
        assert_eq!(consumed, 2);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_constant_round_trip_after_warmup() {
        let ratio = 4;
        let mut d = Downsampler::new(ratio);
        let mut u = Upsampler::new(ratio);
        let input = vec![0.5_f32; 256];
        let mut mid = vec![0.0; d.max_output_len(input.len())];
        let n = d.downsample(&input, &mut mid);
        assert_eq!(n, 64);
        let mut out = vec![0.0; 256];
        assert_eq!(u.upsample(&mid[..n], &mut out), 64);
        for &y in &out[ratio..] {
            assert!((y - 0.5).abs() < 1e-7);
        }
    }

    #[test]
    fn test_upsample_holds_when_input_runs_out() {
        let mut u = Upsampler::new(2);
        let mut out = vec![0.0; 8];
        let consumed = u.upsample(&[2.0], &mut out);
        assert_eq!(consumed, 1);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_clear_resets_state() {
        let mut u = Upsampler::new(2);
        let mut out = vec![0.0; 3];
        u.upsample(&[1.0, 1.0], &mut out);
        u.clear();
        let mut out = vec![0.0; 2];
        u.upsample(&[2.0], &mut out);
        assert_eq!(out, vec![0.0, 1.0]);

        let mut d = Downsampler::new(3);
        let mut tmp = vec![0.0; 1];
        d.downsample(&[1.0], &mut tmp);
        d.clear();
        let mut tmp = vec![0.0; 1];
        d.downsample(&[7.0], &mut tmp);
        assert_eq!(tmp, vec![7.0]);
    }
}
