//! Explicit timed state owned by an analysis session.
//!
//! Time is always passed in; nothing here reads a clock. The host polls
//! with its own `Instant` (frame time, tokio interval, test fixture).

use std::time::{Duration, Instant};

use crate::evidence::ClueId;

/// Re-schedulable periodic timer for the hot/cold cue.
///
/// The period follows the current proximity. Re-tuning keeps the phase
/// anchored at the last fire, so a steadily moving pointer still hears the
/// cue instead of restarting the countdown on every sample.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CueTimer {
    armed: Option<Armed>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Armed {
    anchor: Instant,
    period: Duration,
}

impl CueTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a new period, or cancel with `None`.
    pub fn reschedule(&mut self, now: Instant, period: Option<Duration>) {
        match (period, self.armed.as_mut()) {
            (None, _) => self.armed = None,
            (Some(period), Some(armed)) => armed.period = period,
            (Some(period), None) => {
                self.armed = Some(Armed {
                    anchor: now,
                    period,
                })
            }
        }
    }

    pub fn cancel(&mut self) {
        self.armed = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn period(&self) -> Option<Duration> {
        self.armed.map(|a| a.period)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|a| a.anchor + a.period)
    }

    /// Fires at most once per call. Missed periods are not replayed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.armed.as_mut() {
            Some(armed) if now >= armed.anchor + armed.period => {
                armed.anchor = now;
                true
            }
            _ => false,
        }
    }
}

/// Discovery banner: `Idle -> Displaying -> (timeout) -> Idle`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BannerState {
    #[default]
    Idle,
    Displaying { clue_id: ClueId, until: Instant },
}

impl BannerState {
    /// A newer discovery replaces whatever is on screen and restarts the clock.
    pub fn show(&mut self, clue_id: &str, now: Instant, hold: Duration) {
        *self = BannerState::Displaying {
            clue_id: clue_id.to_string(),
            until: now + hold,
        };
    }

    /// Advance; returns the clue whose banner just expired.
    pub fn tick(&mut self, now: Instant) -> Option<ClueId> {
        let expired = matches!(self, BannerState::Displaying { until, .. } if now >= *until);
        if !expired {
            return None;
        }
        match std::mem::take(self) {
            BannerState::Displaying { clue_id, .. } => Some(clue_id),
            BannerState::Idle => None,
        }
    }

    pub fn is_displaying(&self) -> bool {
        matches!(self, BannerState::Displaying { .. })
    }

    pub fn clue_id(&self) -> Option<&str> {
        match self {
            BannerState::Displaying { clue_id, .. } => Some(clue_id),
            BannerState::Idle => None,
        }
    }
}

/// One-shot near-miss jitter flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JitterPulse {
    until: Option<Instant>,
}

impl JitterPulse {
    pub fn trigger(&mut self, now: Instant, hold: Duration) {
        self.until = Some(now + hold);
    }

    /// True while the pulse is active; clears itself once expired.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.until {
            Some(until) if now < until => true,
            Some(_) => {
                self.until = None;
                false
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.until = None;
    }
}
