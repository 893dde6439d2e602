//! One open analysis of one evidence item.
//!
//! The session owns everything transient: the tool gate, the session
//! discovery set, last proximity, and the cue/banner/jitter timers. It does
//! not own the evidence item; every sample is evaluated against the
//! caller's canonical item and discoveries are merged into it before
//! `submit` returns, so an abrupt close never loses a find.

use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::discovery::{DiscoveryEngine, DiscoveryEvent, PointerSample};
use crate::evidence::{Clue, EvidenceItem};
use crate::feedback::{FeedbackIntensity, signal};
use crate::geometry::Point;
use crate::reconcile::{self, SessionDiscoverySet};
use crate::timer::{BannerState, CueTimer, JitterPulse};
use crate::tool::{Tool, ToolGate};

/// Result of one pointer sample.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleOutcome {
    pub proximity: f64,
    pub discovery: Option<DiscoveryEvent>,
    pub feedback: FeedbackIntensity,
}

/// What became due when the host advanced the clock.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionTick {
    pub cue: bool,
    pub jitter: bool,
    pub banner_expired: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AnalysisSession {
    id: Uuid,
    evidence_id: String,
    gate: ToolGate,
    found: SessionDiscoverySet,
    proximity: f64,
    samples: u64,
    cue: CueTimer,
    banner: BannerState,
    jitter: JitterPulse,
}

impl AnalysisSession {
    /// Start a fresh session: empty session set, default tool, cold feedback.
    pub fn open(evidence: &EvidenceItem) -> Self {
        Self {
            id: Uuid::new_v4(),
            evidence_id: evidence.id.clone(),
            gate: ToolGate::default(),
            found: SessionDiscoverySet::new(),
            proximity: 0.0,
            samples: 0,
            cue: CueTimer::new(),
            banner: BannerState::default(),
            jitter: JitterPulse::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn evidence_id(&self) -> &str {
        &self.evidence_id
    }

    pub fn active_tool(&self) -> Tool {
        self.gate.active()
    }

    pub fn proximity(&self) -> f64 {
        self.proximity
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn found_this_session(&self) -> &SessionDiscoverySet {
        &self.found
    }

    pub fn banner(&self) -> &BannerState {
        &self.banner
    }

    pub fn cue(&self) -> &CueTimer {
        &self.cue
    }

    /// Switch tools. Any change drops hot feedback from the previous target.
    pub fn set_tool(&mut self, tool: Tool) -> bool {
        let changed = self.gate.set_tool(tool);
        if changed {
            self.proximity = 0.0;
            self.cue.cancel();
            self.jitter.clear();
        }
        changed
    }

    /// Evaluate one sample against `evidence` and fold any discovery into it.
    pub fn submit(
        &mut self,
        config: &AnalysisConfig,
        evidence: &mut EvidenceItem,
        position: Point,
        now: Instant,
    ) -> SampleOutcome {
        debug_assert_eq!(evidence.id, self.evidence_id);
        self.samples += 1;

        let sample = PointerSample::new(position, self.gate.active());
        let result = DiscoveryEngine::evaluate(config, sample, evidence, &mut self.found);

        if let Some(event) = &result.discovery {
            reconcile::merge_into(evidence, &self.found);
            self.banner.show(&event.clue_id, now, config.banner());
            self.jitter.clear();
        }

        let feedback = signal(result.proximity, result.discovery.as_ref(), config);
        self.proximity = feedback.proximity;

        if feedback.near_miss {
            self.jitter.trigger(now, config.jitter());
        }
        if self.banner.is_displaying() {
            // the banner mutes the hot/cold cue until it clears
            self.cue.cancel();
        } else {
            self.cue.reschedule(now, feedback.cue_interval);
        }

        SampleOutcome {
            proximity: result.proximity,
            discovery: result.discovery,
            feedback,
        }
    }

    /// Advance timers to `now`.
    pub fn tick(&mut self, now: Instant) -> SessionTick {
        let banner_expired = self.banner.tick(now);
        SessionTick {
            cue: !self.banner.is_displaying() && self.cue.poll(now),
            jitter: self.jitter.tick(now),
            banner_expired,
        }
    }

    /// Revealed clues (persisted ∪ this session), catalog order.
    pub fn revealed<'a>(&self, evidence: &'a EvidenceItem) -> Vec<&'a Clue> {
        reconcile::revealed_clues(evidence, &self.found)
    }

    /// End the session. Discoveries were merged as they happened, so this
    /// only re-applies the (idempotent) merge and hands back the item.
    pub fn close(self, evidence: &EvidenceItem) -> EvidenceItem {
        reconcile::merge(evidence, &self.found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn cfg() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    fn item() -> EvidenceItem {
        EvidenceItem::new("ev-1-1", "img")
            .with_clue(Clue::new("c1", Tool::Magnifier, Point::new(50.0, 50.0), 8.0))
            .with_clue(Clue::new("c2", Tool::UvLight, Point::new(10.0, 10.0), 15.0))
    }

    #[test]
    fn test_discovery_merges_immediately() {
        let mut ev = item();
        let mut s = AnalysisSession::open(&ev);
        let now = Instant::now();

        let out = s.submit(&cfg(), &mut ev, Point::new(50.0, 50.0), now);
        assert_eq!(out.discovery.as_ref().unwrap().clue_id, "c1");
        assert!(ev.is_discovered("c1"));
        assert!(out.feedback.success.is_some());
        assert_eq!(s.proximity(), 0.0);
        assert_eq!(s.banner().clue_id(), Some("c1"));
    }

    #[test]
    fn test_tool_switch_resets_proximity() {
        let mut ev = item();
        let mut s = AnalysisSession::open(&ev);
        let now = Instant::now();

        s.submit(&cfg(), &mut ev, Point::new(50.0, 58.0), now);
        assert!(s.proximity() > 0.5);
        assert!(s.cue().is_armed());

        assert!(s.set_tool(Tool::UvLight));
        assert_eq!(s.proximity(), 0.0);
        assert!(!s.cue().is_armed());
        assert!(!s.set_tool(Tool::UvLight));
    }

    #[test]
    fn test_banner_mutes_cue_then_expires() {
        let mut ev = item();
        let mut s = AnalysisSession::open(&ev);
        let t0 = Instant::now();

        s.submit(&cfg(), &mut ev, Point::new(50.0, 50.0), t0);
        s.set_tool(Tool::UvLight);
        // warm for c2 while the banner is still up
        s.submit(&cfg(), &mut ev, Point::new(10.0, 25.0), t0 + Duration::from_millis(100));
        assert!(!s.cue().is_armed());

        let tick = s.tick(t0 + Duration::from_millis(2500));
        assert_eq!(tick.banner_expired.as_deref(), Some("c1"));

        s.submit(&cfg(), &mut ev, Point::new(10.0, 25.0), t0 + Duration::from_millis(2600));
        assert!(s.cue().is_armed());
    }

    #[test]
    fn test_cue_tick_follows_proximity() {
        let mut ev = item();
        let mut s = AnalysisSession::open(&ev);
        let t0 = Instant::now();

        let out = s.submit(&cfg(), &mut ev, Point::new(50.0, 60.0), t0);
        let period = out.feedback.cue_interval.unwrap();
        assert!(!s.tick(t0 + period - Duration::from_millis(1)).cue);
        assert!(s.tick(t0 + period).cue);
    }

    #[test]
    fn test_near_miss_jitter() {
        let mut ev = item();
        let mut s = AnalysisSession::open(&ev);
        let t0 = Instant::now();

        // just outside the hit zone, with a wide falloff so proximity > 0.9
        let mut config = cfg();
        config.falloff_distance = 200.0;
        let out = s.submit(&config, &mut ev, Point::new(50.0, 57.0), t0);
        assert!(out.discovery.is_none());
        assert!(out.feedback.near_miss);
        assert!(s.tick(t0 + Duration::from_millis(10)).jitter);
        assert!(!s.tick(t0 + Duration::from_millis(40)).jitter);
    }

    #[test]
    fn test_close_returns_merged_item() {
        let mut ev = item();
        let mut s = AnalysisSession::open(&ev);
        s.submit(&cfg(), &mut ev, Point::new(50.0, 50.0), Instant::now());
        let revealed: Vec<&str> = s.revealed(&ev).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(revealed, ["c1"]);

        let closed = s.close(&ev);
        assert_eq!(closed, ev);
    }
}
