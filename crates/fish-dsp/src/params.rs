//! Parameter schema for the Fish engine.
//!
//! The CLI and any host wrapper share the same `FishParams` struct.
//! Presets are sparse JSON; missing keys take their defaults.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

use crate::error::FishError;

/// Decimation ratio used when no configuration says otherwise.
pub const DEFAULT_DOWNSAMPLE_RATIO: u32 = 4;

/// Largest decimation ratio accepted by `FishParams::validate`.
pub const MAX_DOWNSAMPLE_RATIO: u32 = 16;

/// Accept both `4` and `4.0` from JSON.
fn as_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let v: serde_json::Value = Deserialize::deserialize(d)?;
    match &v {
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(|i| i as u32)
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u32))
            .ok_or_else(|| serde::de::Error::custom(format!("cannot convert {n} to u32"))),
        _ => Err(serde::de::Error::custom(format!("expected number, got {v}"))),
    }
}

/// Parameter ranges for continuous parameters (min, max).
pub fn param_range(key: &str) -> Option<(f64, f64)> {
    match key {
        "fish" => Some((0.0, 1.0)),
        "downsample_ratio" => Some((1.0, MAX_DOWNSAMPLE_RATIO as f64)),
        "pre_filter_q" => Some((0.1, 10.0)),
        "post_filter_freq" => Some((10.0, 24000.0)),
        "post_filter_q" => Some((0.1, 10.0)),
        "input_gain" => Some((0.0, 1.0)),
        "output_gain" => Some((0.0, 8.0)),
        _ => None,
    }
}

/// Pre-filter cutoff in Hz for a distortion amount.
///
/// Sweeps 4 kHz..1 kHz while decimating, 10 kHz..1 kHz at full rate.
pub fn pre_filter_cutoff(amount: f64, downsample_ratio: u32) -> f64 {
    let base: f64 = if downsample_ratio > 1 { 4.0 } else { 10.0 };
    base.powf(1.0 - amount.clamp(0.0, 1.0)) * 1000.0
}

/// All engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FishParams {
    // --- Control ---
    pub fish: f64,

    // --- Resampling ---
    #[serde(deserialize_with = "as_u32")]
    pub downsample_ratio: u32,

    // --- Filters ---
    pub pre_filter_q: f64,
    pub post_filter_freq: f64,
    pub post_filter_q: f64,

    // --- Gain staging ---
    pub input_gain: f64,
    pub output_gain: f64,

    // --- Metadata (ignored for DSP, present in presets) ---
    #[serde(rename = "_meta", default, skip_serializing)]
    pub meta: Option<serde_json::Value>,
}

impl Default for FishParams {
    fn default() -> Self {
        Self {
            fish: 0.0,
            downsample_ratio: DEFAULT_DOWNSAMPLE_RATIO,
            pre_filter_q: 0.71,
            post_filter_freq: 5000.0,
            post_filter_q: 0.5,
            input_gain: 0.5,
            output_gain: 2.0,
            meta: None,
        }
    }
}

impl FishParams {
    /// Parse from JSON string. Missing fields get default values.
    pub fn from_json(json: &str) -> Result<Self, FishError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Read and parse a JSON preset file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FishError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check every value against its range.
    pub fn validate(&self) -> Result<(), FishError> {
        if !(1..=MAX_DOWNSAMPLE_RATIO).contains(&self.downsample_ratio) {
            return Err(FishError::InvalidRatio(self.downsample_ratio));
        }
        let continuous = [
            ("fish", self.fish),
            ("pre_filter_q", self.pre_filter_q),
            ("post_filter_freq", self.post_filter_freq),
            ("post_filter_q", self.post_filter_q),
            ("input_gain", self.input_gain),
            ("output_gain", self.output_gain),
        ];
        for (name, value) in continuous {
            if let Some((lo, hi)) = param_range(name) {
                if !(lo..=hi).contains(&value) {
                    return Err(FishError::InvalidParam { name, value });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let p = FishParams::default();
        assert_eq!(p.fish, 0.0);
        assert_eq!(p.downsample_ratio, 4);
        assert_eq!(p.pre_filter_q, 0.71);
        assert_eq!(p.post_filter_freq, 5000.0);
        assert_eq!(p.input_gain, 0.5);
        assert_eq!(p.output_gain, 2.0);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_sparse_json_load() {
        let p = FishParams::from_json(r#"{"fish": 0.8, "downsample_ratio": 2.0}"#).unwrap();
        assert_eq!(p.fish, 0.8);
        assert_eq!(p.downsample_ratio, 2);
        assert_eq!(p.post_filter_q, 0.5);
    }

    #[test]
    fn test_preset_with_meta() {
        let json = r#"{
            "fish": 0.4,
            "_meta": {"category": "Underwater", "description": "test"}
        }"#;
        let p = FishParams::from_json(json).unwrap();
        assert_eq!(p.fish, 0.4);
        assert!(p.meta.is_some());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            FishParams::from_json(r#"{"loss": 0.5}"#),
            Err(FishError::Params(_))
        ));
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            FishParams::from_json(r#"{"downsample_ratio": 0}"#),
            Err(FishError::InvalidRatio(0))
        ));
        assert!(matches!(
            FishParams::from_json(r#"{"fish": 1.5}"#),
            Err(FishError::InvalidParam { name: "fish", .. })
        ));
    }

    #[test]
    fn test_param_ranges() {
        assert_eq!(param_range("fish"), Some((0.0, 1.0)));
        assert_eq!(param_range("post_filter_freq"), Some((10.0, 24000.0)));
        assert_eq!(param_range("nonexistent"), None);
    }

    #[test]
    fn test_pre_filter_cutoff_sweep() {
        assert!((pre_filter_cutoff(0.0, 4) - 4000.0).abs() < 1e-9);
        assert!((pre_filter_cutoff(1.0, 4) - 1000.0).abs() < 1e-9);
        assert!((pre_filter_cutoff(0.0, 1) - 10000.0).abs() < 1e-9);
        assert!((pre_filter_cutoff(1.0, 1) - 1000.0).abs() < 1e-9);
        assert!((pre_filter_cutoff(0.5, 4) - 2000.0).abs() < 1e-9);
    }
}
