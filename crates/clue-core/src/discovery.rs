//! Discrete discovery: turns a pointer sample into at most one discovery event.
//!
//! Eligibility is a hard gate (tool match, not yet persisted, not yet found
//! this session); geometry only decides among eligible clues. The hit zone
//! is `radius * discovery_factor`, strictly inside the proximity falloff,
//! so a player always hears "hot" before a clue is confirmed.

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::evidence::{Clue, ClueId, EvidenceItem};
use crate::geometry::{Point, max_proximity, proximity};
use crate::reconcile::SessionDiscoverySet;
use crate::tool::Tool;

/// One pointer reading, already mapped to percentage space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerSample {
    pub position: Point,
    pub active_tool: Tool,
}

impl PointerSample {
    pub fn new(position: Point, active_tool: Tool) -> Self {
        Self {
            position,
            active_tool,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryEvent {
    pub evidence_id: String,
    pub clue_id: ClueId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DiscoveryResult {
    /// Proximity to the nearest eligible clue. Zero after a discovery.
    pub proximity: f64,
    pub discovery: Option<DiscoveryEvent>,
}

pub struct DiscoveryEngine;

impl DiscoveryEngine {
    /// Clues that can still be found with the sample's tool.
    pub fn eligible<'a>(
        evidence: &'a EvidenceItem,
        session: &'a SessionDiscoverySet,
        tool: Tool,
    ) -> impl Iterator<Item = &'a Clue> + 'a {
        evidence.hidden_clues.iter().filter(move |c| {
            c.tool == tool && !evidence.is_discovered(&c.id) && !session.contains(&c.id)
        })
    }

    /// Evaluate one sample.
    ///
    /// Out-of-range positions are clamped. When several eligible clues are
    /// inside their hit zones the nearest one fires (catalog order breaks
    /// ties); the others remain eligible and fire on a later sample. A clue
    /// already in `session` can never fire again.
    pub fn evaluate(
        config: &AnalysisConfig,
        sample: PointerSample,
        evidence: &EvidenceItem,
        session: &mut SessionDiscoverySet,
    ) -> DiscoveryResult {
        let position = sample.position.clamped();

        let mut best_proximity = 0.0f64;
        let mut hit: Option<(&Clue, f64)> = None;
        for clue in Self::eligible(evidence, session, sample.active_tool) {
            let d = position.distance(clue.position);
            best_proximity = best_proximity.max(proximity(position, clue.position, config));
            if d < clue.effective_radius(config) && hit.is_none_or(|(_, best)| d < best) {
                hit = Some((clue, d));
            }
        }

        let Some((clue, _)) = hit else {
            return DiscoveryResult {
                proximity: best_proximity,
                discovery: None,
            };
        };

        let clue_id = clue.id.clone();
        session.insert(&clue_id);
        DiscoveryResult {
            proximity: 0.0,
            discovery: Some(DiscoveryEvent {
                evidence_id: evidence.id.clone(),
                clue_id,
            }),
        }
    }

    /// Proximity only, without touching discovery state.
    pub fn proximity(
        config: &AnalysisConfig,
        sample: PointerSample,
        evidence: &EvidenceItem,
        session: &SessionDiscoverySet,
    ) -> f64 {
        let position = sample.position.clamped();
        max_proximity(
            position,
            Self::eligible(evidence, session, sample.active_tool).map(|c| c.position),
            config,
        )
    }
}
