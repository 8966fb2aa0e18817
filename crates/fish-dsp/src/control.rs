//! Lock-free hand-off of the distortion amount from a control thread.
//!
//! The control side stores the newest value and raises a dirty flag; the
//! audio side collects at most one change per block with `take_change`
//! and hands it to `FishProcessor::process`. Last write wins.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Shared normalized control value in [0, 1].
#[derive(Debug)]
pub struct ControlParameter {
    bits: AtomicU32,
    dirty: AtomicBool,
}

impl ControlParameter {
    pub fn new(initial: f32) -> Self {
        Self {
            bits: AtomicU32::new(clamp_unit(initial).to_bits()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Store a new value (clamped to [0, 1]) and mark it pending.
    pub fn set(&self, value: f32) {
        self.bits.store(clamp_unit(value).to_bits(), Ordering::Release);
        self.dirty.store(true, Ordering::Release);
    }

    /// Current value, whether or not it has been collected.
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Collect the pending value, if any. Clears the dirty flag.
    pub fn take_change(&self) -> Option<f32> {
        if self.dirty.swap(false, Ordering::AcqRel) {
            Some(self.get())
        } else {
            None
        }
    }
}

impl Default for ControlParameter {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// NaN reads as 0.
fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
