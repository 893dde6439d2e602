//! Normalized-space geometry and the hot/cold proximity curve.
//!
//! All coordinates live in percentage space `[0, 100] x [0, 100]` so clue
//! placement is independent of the rendered image size. Everything here is
//! pure and cheap enough to run on every pointer sample.

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::constants::{COORD_MAX, COORD_MIN};

/// A point in normalized percentage space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp into `[0, 100]` on both axes. NaN collapses to the lower bound
    /// so a garbage sample still yields a defined position.
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_coord(self.x),
            y: clamp_coord(self.y),
        }
    }

    /// True when both coordinates are finite and inside `[0, 100]`.
    pub fn in_bounds(self) -> bool {
        in_range(self.x) && in_range(self.y)
    }

    /// Euclidean distance.
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Map a raw device position inside a viewport rectangle to percentage
    /// space. Positions outside the viewport are clamped.
    pub fn from_viewport(px: f64, py: f64, viewport: Viewport) -> Self {
        let x = if viewport.width > 0.0 {
            (px - viewport.left) / viewport.width * COORD_MAX
        } else {
            COORD_MIN
        };
        let y = if viewport.height > 0.0 {
            (py - viewport.top) / viewport.height * COORD_MAX
        } else {
            COORD_MIN
        };
        Self::new(x, y).clamped()
    }
}

/// Rendered rectangle of the evidence image, in device units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

fn clamp_coord(v: f64) -> f64 {
    if v.is_nan() {
        COORD_MIN
    } else {
        v.clamp(COORD_MIN, COORD_MAX)
    }
}

pub(crate) fn in_range(v: f64) -> bool {
    v.is_finite() && (COORD_MIN..=COORD_MAX).contains(&v)
}

/// Proximity of `pointer` to a clue centred at `clue`, in `[0, 1]`.
///
/// `p = max(0, 1 - d / falloff)`, then `p^k`. The clue radius plays no part:
/// the falloff zone is deliberately wider than any discovery radius.
pub fn proximity(pointer: Point, clue: Point, config: &AnalysisConfig) -> f64 {
    let d = pointer.distance(clue);
    let p = (1.0 - d / config.falloff_distance).max(0.0);
    p.powf(config.proximity_exponent).clamp(0.0, 1.0)
}

/// Maximum proximity across candidate clue positions; 0 when there are none.
pub fn max_proximity<I>(pointer: Point, candidates: I, config: &AnalysisConfig) -> f64
where
    I: IntoIterator<Item = Point>,
{
    candidates
        .into_iter()
        .map(|c| proximity(pointer, c, config))
        .fold(0.0, f64::max)
}
