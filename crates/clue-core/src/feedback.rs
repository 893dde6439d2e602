//! Shapes proximity and discovery into presentation-agnostic intensities.
//!
//! Nothing here owns a device, a timer or a frame. The host decides whether
//! an intensity becomes a sound, a vibration, a screen shake, or nothing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::discovery::DiscoveryEvent;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackIntensity {
    pub proximity: f64,
    /// Interval between hot/cold cues. `None` means "no cue".
    #[serde(with = "duration_ms")]
    pub cue_interval: Option<Duration>,
    /// Cue playback rate multiplier.
    pub cue_pitch: f64,
    /// Cue gain, relative to the host's effect volume.
    pub cue_gain: f64,
    /// Discrete near-miss escalation: request a brief jitter/alert.
    pub near_miss: bool,
    /// Image enhancement should be applied.
    pub enhance: bool,
    /// Reticle should switch to its alert colour.
    pub alert: bool,
    /// One-shot success signal. Supersedes all searching feedback.
    pub success: Option<DiscoveryEvent>,
}

impl FeedbackIntensity {
    pub fn silent() -> Self {
        Self {
            proximity: 0.0,
            cue_interval: None,
            cue_pitch: 0.0,
            cue_gain: 0.0,
            near_miss: false,
            enhance: false,
            alert: false,
            success: None,
        }
    }
}

/// `interval = max(floor, base - p * range)`, or no cue at all when
/// proximity is at or below the cue threshold.
pub fn cue_interval(proximity: f64, config: &AnalysisConfig) -> Option<Duration> {
    let cue = &config.cue;
    if proximity.is_nan() || proximity <= cue.min_proximity {
        return None;
    }
    let p = proximity.min(1.0);
    let ms = (cue.base_ms as f64 - p * cue.range_ms as f64).max(cue.floor_ms as f64);
    Some(Duration::from_millis(ms.round() as u64))
}

/// Map one evaluation result to feedback.
pub fn signal(
    proximity: f64,
    discovery: Option<&DiscoveryEvent>,
    config: &AnalysisConfig,
) -> FeedbackIntensity {
    if let Some(event) = discovery {
        return FeedbackIntensity {
            success: Some(event.clone()),
            ..FeedbackIntensity::silent()
        };
    }

    let p = if proximity.is_finite() {
        proximity.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cue_interval = cue_interval(p, config);
    let (cue_pitch, cue_gain) = if cue_interval.is_some() {
        (
            config.cue.pitch_base + p * config.cue.pitch_range,
            config.cue.gain_base + p * config.cue.gain_range,
        )
    } else {
        (0.0, 0.0)
    };

    FeedbackIntensity {
        proximity: p,
        cue_interval,
        cue_pitch,
        cue_gain,
        near_miss: p > config.near_miss_threshold,
        enhance: p > config.enhance_threshold,
        alert: p > config.alert_threshold,
        success: None,
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
