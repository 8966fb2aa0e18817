//! Level metrics over audio blocks.
//!
//! Used for render reports and for comparing a processed signal
//! against its source.

/// Root-mean-square level of a block. Empty blocks read as silence.
pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// Largest absolute sample value.
pub fn peak(samples: &[f32]) -> f64 {
    samples.iter().fold(0.0_f64, |acc, &s| acc.max((s as f64).abs()))
}

/// RMS of the difference between two aligned blocks.
///
/// Only the overlapping prefix is compared.
pub fn residual_rms(processed: &[f32], reference: &[f32]) -> f64 {
    let n = processed.len().min(reference.len());
    if n == 0 {
        return 0.0;
    }
    let sum_sq: f64 = processed[..n]
        .iter()
        .zip(&reference[..n])
        .map(|(&a, &b)| {
            let d = a as f64 - b as f64;
            d * d
        })
        .sum();
    (sum_sq / n as f64).sqrt()
}

/// Accumulating RMS and peak meter for a stream of blocks.
#[derive(Debug, Clone, Default)]
pub struct LevelMeter {
    sum_sq: f64,
    peak: f64,
    count: u64,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate one block.
    pub fn push_slice(&mut self, samples: &[f32]) {
        for &s in samples {
            let s = s as f64;
            self.sum_sq += s * s;
            self.peak = self.peak.max(s.abs());
        }
        self.count += samples.len() as u64;
    }

    /// RMS over everything pushed so far.
    pub fn rms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.sum_sq / self.count as f64).sqrt()
        }
    }

    pub fn peak(&self) -> f64 {
        self.peak
    }

    /// Snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rms: self.rms(),
            peak: self.peak,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Point-in-time metrics reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub rms: f64,
    pub peak: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_zero() {
        let m = LevelMeter::new();
        assert_eq!(m.rms(), 0.0);
        assert_eq!(m.peak(), 0.0);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn dc_signal_rms() {
        let mut m = LevelMeter::new();
        m.push_slice(&[0.5; 100]);
        assert!((m.rms() - 0.5).abs() < 1e-10);
        assert!((rms(&[0.5; 64]) - 0.5).abs() < 1e-10);
    }

    #[test]
    fn peak_tracks_max() {
        let mut m = LevelMeter::new();
        m.push_slice(&[0.3, -0.8, 0.2]);
        assert!((m.peak() - 0.8).abs() < 1e-7);
        assert!((peak(&[0.1, -0.4, 0.3]) - 0.4).abs() < 1e-7);
    }

    #[test]
    fn residual_of_identical_blocks_is_zero() {
        let a: Vec<f32> = (0..256).map(|i| (i as f32 * 0.1).sin()).collect();
        assert_eq!(residual_rms(&a, &a), 0.0);
        let b: Vec<f32> = a.iter().map(|x| x + 0.25).collect();
        assert!((residual_rms(&b, &a) - 0.25).abs() < 1e-6);
    }
}
