/// Lower bound of the normalized coordinate space (percent of image extent).
pub const COORD_MIN: f64 = 0.0;

/// Upper bound of the normalized coordinate space (percent of image extent).
pub const COORD_MAX: f64 = 100.0;

/// Discovery fires when distance < radius * DISCOVERY_FACTOR.
pub const DISCOVERY_FACTOR: f64 = 0.85;

/// Distance (percentage units) at which proximity feedback falls to zero.
/// Independent of any clue's own radius.
pub const FALLOFF_DISTANCE: f64 = 28.0;

/// Response curve exponent: p' = p^k. Must be > 1 so feedback accelerates near a clue.
pub const PROXIMITY_EXPONENT: f64 = 1.4;

/// Proximity above which a jitter/alert pulse is requested.
pub const NEAR_MISS_THRESHOLD: f64 = 0.9;

/// Proximity at or below which no hot/cold cue is scheduled.
pub const CUE_MIN_PROXIMITY: f64 = 0.1;

/// Cue interval at zero proximity (ms).
pub const CUE_BASE_MS: u64 = 700;

/// Interval reduction across the full proximity range (ms).
pub const CUE_RANGE_MS: u64 = 650;

/// Fastest permitted cue interval (ms).
pub const CUE_FLOOR_MS: u64 = 50;

/// Cue playback rate: PITCH_BASE + p * PITCH_RANGE.
pub const CUE_PITCH_BASE: f64 = 0.8;
pub const CUE_PITCH_RANGE: f64 = 1.6;

/// Cue gain relative to the host's effect volume: GAIN_BASE + p * GAIN_RANGE.
pub const CUE_GAIN_BASE: f64 = 0.1;
pub const CUE_GAIN_RANGE: f64 = 0.5;

/// Duration of the near-miss jitter pulse (ms).
pub const JITTER_MS: u64 = 30;

/// How long the discovery banner stays up (ms).
pub const BANNER_MS: u64 = 2500;

/// Proximity above which the image is enhanced (brightness/contrast boost).
pub const ENHANCE_THRESHOLD: f64 = 0.35;

/// Proximity above which the reticle switches to its alert colour.
pub const ALERT_THRESHOLD: f64 = 0.82;

