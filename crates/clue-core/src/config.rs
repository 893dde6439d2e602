//! Tuning parameters for proximity, discovery and feedback shaping.
//!
//! Passed by reference to whatever needs it; nothing in the engine reads
//! ambient state. Every field has a serde default so a partial config file
//! overrides only what it names.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    ALERT_THRESHOLD, BANNER_MS, CUE_BASE_MS, CUE_FLOOR_MS, CUE_GAIN_BASE, CUE_GAIN_RANGE,
    CUE_MIN_PROXIMITY, CUE_PITCH_BASE, CUE_PITCH_RANGE, CUE_RANGE_MS, DISCOVERY_FACTOR,
    ENHANCE_THRESHOLD, FALLOFF_DISTANCE, JITTER_MS, NEAR_MISS_THRESHOLD, PROXIMITY_EXPONENT,
};
use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub discovery_factor: f64,
    pub falloff_distance: f64,
    pub proximity_exponent: f64,
    pub near_miss_threshold: f64,
    pub enhance_threshold: f64,
    pub alert_threshold: f64,
    pub cue: CueConfig,
    pub jitter_ms: u64,
    pub banner_ms: u64,
}

/// Hot/cold cue cadence and colouring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    pub base_ms: u64,
    pub range_ms: u64,
    pub floor_ms: u64,
    pub min_proximity: f64,
    pub pitch_base: f64,
    pub pitch_range: f64,
    pub gain_base: f64,
    pub gain_range: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            discovery_factor: DISCOVERY_FACTOR,
            falloff_distance: FALLOFF_DISTANCE,
            proximity_exponent: PROXIMITY_EXPONENT,
            near_miss_threshold: NEAR_MISS_THRESHOLD,
            enhance_threshold: ENHANCE_THRESHOLD,
            alert_threshold: ALERT_THRESHOLD,
            cue: CueConfig::default(),
            jitter_ms: JITTER_MS,
            banner_ms: BANNER_MS,
        }
    }
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            base_ms: CUE_BASE_MS,
            range_ms: CUE_RANGE_MS,
            floor_ms: CUE_FLOOR_MS,
            min_proximity: CUE_MIN_PROXIMITY,
            pitch_base: CUE_PITCH_BASE,
            pitch_range: CUE_PITCH_RANGE,
            gain_base: CUE_GAIN_BASE,
            gain_range: CUE_GAIN_RANGE,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.falloff_distance.is_finite() || self.falloff_distance <= 0.0 {
            return Err(ConfigError::new(
                "falloff_distance",
                format!("must be a positive number, got {}", self.falloff_distance),
            ));
        }
        if !(self.discovery_factor > 0.0 && self.discovery_factor <= 1.0) {
            return Err(ConfigError::new(
                "discovery_factor",
                format!("must be in (0, 1], got {}", self.discovery_factor),
            ));
        }
        if !self.proximity_exponent.is_finite() || self.proximity_exponent <= 1.0 {
            return Err(ConfigError::new(
                "proximity_exponent",
                format!("must be > 1, got {}", self.proximity_exponent),
            ));
        }
        for (field, v) in [
            ("near_miss_threshold", self.near_miss_threshold),
            ("enhance_threshold", self.enhance_threshold),
            ("alert_threshold", self.alert_threshold),
            ("cue.min_proximity", self.cue.min_proximity),
        ] {
            if !(v > 0.0 && v < 1.0) {
                return Err(ConfigError::new(field, format!("must be in (0, 1), got {v}")));
            }
        }
        if self.cue.floor_ms == 0 || self.cue.floor_ms > self.cue.base_ms {
            return Err(ConfigError::new(
                "cue.floor_ms",
                format!(
                    "must be in [1, base_ms={}], got {}",
                    self.cue.base_ms, self.cue.floor_ms
                ),
            ));
        }
        Ok(())
    }

    /// Largest clue radius this config can accept while keeping the
    /// discovery zone strictly inside the proximity falloff.
    pub fn max_radius(&self) -> f64 {
        self.falloff_distance / self.discovery_factor
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }

    pub fn banner(&self) -> Duration {
        Duration::from_millis(self.banner_ms)
    }
}
