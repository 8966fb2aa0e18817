//! Filter coefficient engine and the stateful filters that consume it.
//!
//! Coefficients follow Zölzer, *DAFX*/*DASP* ch. 5: second-order sections
//! are bilinear-transformed analog prototypes with prewarped `K = tan(π fc / fs)`.
//! Every design clamps its cutoff to `[10 Hz, fs / 2]` before use.
//!
//! Sign convention for all sections:
//!
//! ```text
//! y[n] = b0 x[n] + b1 x[n-1] + b2 x[n-2] - a1 y[n-1] - a2 y[n-2]
//! ```

use std::f64::consts::{PI, SQRT_2};

/// Lowest cutoff any design will accept.
pub const MIN_CUTOFF_HZ: f64 = 10.0;

/// Clamp a cutoff to `[10 Hz, fs / 2]`.
#[inline]
pub fn clamp_cutoff(fc: f64, fs: f64) -> f64 {
    fc.max(MIN_CUTOFF_HZ).min(fs / 2.0)
}

// ---------------------------------------------------------------------------
// Coefficient sets
// ---------------------------------------------------------------------------

/// Second-order section, already normalized so that `a0 == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Pass-through section.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Magnitude response at `freq` Hz.
    pub fn magnitude(&self, freq: f64, fs: f64) -> f64 {
        let w = 2.0 * PI * freq / fs;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());
        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);
        (num_re.hypot(num_im)) / (den_re.hypot(den_im))
    }

    /// Both poles strictly inside the unit circle.
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// First-order low-pass section: `y[n] = b0 x[n] - a1 y[n-1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnePoleCoeffs {
    pub b0: f64,
    pub a1: f64,
}

impl Default for OnePoleCoeffs {
    fn default() -> Self {
        Self { b0: 1.0, a1: 0.0 }
    }
}

// ---------------------------------------------------------------------------
// Designs
// ---------------------------------------------------------------------------

/// One-pole low-pass with its -3 dB point at `fc`.
pub fn one_pole_lowpass_coeffs(fc: f64, fs: f64) -> OnePoleCoeffs {
    let fc = clamp_cutoff(fc, fs);
    let wc = 2.0 * PI * fc / fs;
    let b = 4.0 - 2.0 * wc.cos();
    let a1 = 0.5 * ((b * b - 4.0).sqrt() - b);
    OnePoleCoeffs { b0: 1.0 + a1, a1 }
}

/// Peaking EQ. Positive `gain_db` boosts around `fc`, negative cuts.
pub fn peak_coeffs(fc: f64, gain_db: f64, q: f64, fs: f64) -> BiquadCoeffs {
    let k = prewarp(fc, fs);
    let kk = k * k;
    let (b, a) = if gain_db >= 0.0 {
        let v = 10f64.powf(gain_db / 20.0);
        (
            [1.0 + v * k / q + kk, 2.0 * (kk - 1.0), 1.0 - v * k / q + kk],
            [1.0 + k / q + kk, 2.0 * (kk - 1.0), 1.0 - k / q + kk],
        )
    } else {
        let v = 10f64.powf(-gain_db / 20.0);
        (
            [1.0 + k / q + kk, 2.0 * (kk - 1.0), 1.0 - k / q + kk],
            [1.0 + v * k / q + kk, 2.0 * (kk - 1.0), 1.0 - v * k / q + kk],
        )
    };
    normalize(b, a)
}

/// Low shelf with a Butterworth-shaped transition at `fc`.
pub fn low_shelf_coeffs(fc: f64, gain_db: f64, fs: f64) -> BiquadCoeffs {
    let k = prewarp(fc, fs);
    let kk = k * k;
    let flat = [1.0 + SQRT_2 * k + kk, 2.0 * (kk - 1.0), 1.0 - SQRT_2 * k + kk];
    let v = 10f64.powf(gain_db.abs() / 20.0);
    let shelf = [
        1.0 + (2.0 * v).sqrt() * k + v * kk,
        2.0 * (v * kk - 1.0),
        1.0 - (2.0 * v).sqrt() * k + v * kk,
    ];
    if gain_db >= 0.0 {
        normalize(shelf, flat)
    } else {
        normalize(flat, shelf)
    }
}

/// High shelf with a Butterworth-shaped transition at `fc`.
///
/// The cut branch normalizes numerator and denominator separately, as in
/// the reciprocal Zölzer form.
pub fn high_shelf_coeffs(fc: f64, gain_db: f64, fs: f64) -> BiquadCoeffs {
    let k = prewarp(fc, fs);
    let kk = k * k;
    if gain_db >= 0.0 {
        let v = 10f64.powf(gain_db / 20.0);
        let b = [
            v + (2.0 * v).sqrt() * k + kk,
            2.0 * (kk - v),
            v - (2.0 * v).sqrt() * k + kk,
        ];
        let a = [1.0 + SQRT_2 * k + kk, 2.0 * (kk - 1.0), 1.0 - SQRT_2 * k + kk];
        normalize(b, a)
    } else {
        let v = 10f64.powf(-gain_db / 20.0);
        let d1 = v + (2.0 * v).sqrt() * k + kk;
        let d2 = 1.0 + (2.0 / v).sqrt() * k + kk / v;
        BiquadCoeffs {
            b0: (1.0 + SQRT_2 * k + kk) / d1,
            b1: 2.0 * (kk - 1.0) / d1,
            b2: (1.0 - SQRT_2 * k + kk) / d1,
            a1: 2.0 * (kk / v - 1.0) / d2,
            a2: (1.0 - (2.0 / v).sqrt() * k + kk / v) / d2,
        }
    }
}

/// Second-order low-pass.
pub fn lowpass_coeffs(fc: f64, q: f64, fs: f64) -> BiquadCoeffs {
    let (k, d, a1, a2) = shared_poles(fc, q, fs);
    let b0 = k * k * q / d;
    BiquadCoeffs { b0, b1: 2.0 * b0, b2: b0, a1, a2 }
}

/// Second-order high-pass.
pub fn highpass_coeffs(fc: f64, q: f64, fs: f64) -> BiquadCoeffs {
    let (_, d, a1, a2) = shared_poles(fc, q, fs);
    let b0 = q / d;
    BiquadCoeffs { b0, b1: -2.0 * b0, b2: b0, a1, a2 }
}

/// Second-order band-pass with unity gain at `fc`.
pub fn bandpass_coeffs(fc: f64, q: f64, fs: f64) -> BiquadCoeffs {
    let (k, d, a1, a2) = shared_poles(fc, q, fs);
    let b0 = k / d;
    BiquadCoeffs { b0, b1: 0.0, b2: -b0, a1, a2 }
}

#[inline]
fn prewarp(fc: f64, fs: f64) -> f64 {
    (PI * clamp_cutoff(fc, fs) / fs).tan()
}

/// `(K, D, a1, a2)` for the LPF/HPF/BPF family, `D = K²Q + K + Q`.
fn shared_poles(fc: f64, q: f64, fs: f64) -> (f64, f64, f64, f64) {
    let k = prewarp(fc, fs);
    let kk = k * k;
    let d = kk * q + k + q;
    (k, d, 2.0 * q * (kk - 1.0) / d, (kk * q - k + q) / d)
}

fn normalize(b: [f64; 3], a: [f64; 3]) -> BiquadCoeffs {
    let a0 = a[0];
    BiquadCoeffs {
        b0: b[0] / a0,
        b1: b[1] / a0,
        b2: b[2] / a0,
        a1: a[1] / a0,
        a2: a[2] / a0,
    }
}

// ---------------------------------------------------------------------------
// Stateful filters
// ---------------------------------------------------------------------------

/// Direct-form II biquad with its own delay line.
#[derive(Debug, Clone, Default)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    w1: f64,
    w2: f64,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self { coeffs, w1: 0.0, w2: 0.0 }
    }

    /// Swap coefficients. The delay line is kept so sweeps stay continuous.
    pub fn set_coefficients(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    pub fn coefficients(&self) -> BiquadCoeffs {
        self.coeffs
    }

    #[inline]
    pub fn tick(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let w0 = x as f64 - c.a1 * self.w1 - c.a2 * self.w2;
        let y = c.b0 * w0 + c.b1 * self.w1 + c.b2 * self.w2;
        self.w2 = self.w1;
        self.w1 = w0;
        y as f32
    }

    pub fn process_in_place(&mut self, block: &mut [f32]) {
        for s in block.iter_mut() {
            *s = self.tick(*s);
        }
    }

    /// Zero the delay line.
    pub fn reset(&mut self) {
        self.w1 = 0.0;
        self.w2 = 0.0;
    }
}

/// One-pole low-pass smoother.
#[derive(Debug, Clone, Default)]
pub struct OnePole {
    coeffs: OnePoleCoeffs,
    y1: f64,
}

impl OnePole {
    pub fn new(coeffs: OnePoleCoeffs) -> Self {
        Self { coeffs, y1: 0.0 }
    }

    pub fn set_coefficients(&mut self, coeffs: OnePoleCoeffs) {
        self.coeffs = coeffs;
    }

    #[inline]
    pub fn tick(&mut self, x: f32) -> f32 {
        self.y1 = self.coeffs.b0 * x as f64 - self.coeffs.a1 * self.y1;
        self.y1 as f32
    }

    pub fn process_in_place(&mut self, block: &mut [f32]) {
        for s in block.iter_mut() {
            *s = self.tick(*s);
        }
    }

    pub fn reset(&mut self) {
        self.y1 = 0.0;
    }
}
