use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::error::CatalogError;
use crate::geometry::Point;
use crate::tool::Tool;

/// Clue identifier. Unique within its evidence item, not globally.
pub type ClueId = String;

static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]{0,63}$").unwrap());

/// Ids end up as store keys and JSON map keys, so keep them boring.
pub fn is_valid_id(id: &str) -> bool {
    ID_RE.is_match(id)
}

/// A hidden point of interest on an evidence image.
///
/// Immutable once loaded. Whether it has been found is tracked by the owning
/// [`EvidenceItem`] and the session set, never on the clue itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clue {
    pub id: ClueId,
    pub tool: Tool,
    #[serde(flatten)]
    pub position: Point,
    pub radius: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub revealed_text: String,
}

impl Clue {
    pub fn new(id: &str, tool: Tool, position: Point, radius: f64) -> Self {
        Self {
            id: id.to_string(),
            tool,
            position,
            radius,
            description: String::new(),
            revealed_text: String::new(),
        }
    }

    pub fn with_text(mut self, description: &str, revealed_text: &str) -> Self {
        self.description = description.to_string();
        self.revealed_text = revealed_text.to_string();
        self
    }

    /// Radius of the hit zone actually used for discovery.
    pub fn effective_radius(&self, config: &AnalysisConfig) -> f64 {
        self.radius * config.discovery_factor
    }

    fn validate(&self, evidence_id: &str, config: &AnalysisConfig) -> Result<(), CatalogError> {
        if !is_valid_id(&self.id) {
            return Err(CatalogError::InvalidId {
                kind: "clue",
                id: self.id.clone(),
            });
        }
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(CatalogError::InvalidRadius {
                evidence_id: evidence_id.to_string(),
                clue_id: self.id.clone(),
                radius: self.radius,
            });
        }
        if !self.position.in_bounds() {
            return Err(CatalogError::OutOfBounds {
                evidence_id: evidence_id.to_string(),
                clue_id: self.id.clone(),
                x: self.position.x,
                y: self.position.y,
            });
        }
        let effective = self.effective_radius(config);
        if effective >= config.falloff_distance {
            return Err(CatalogError::ThresholdOrder {
                evidence_id: evidence_id.to_string(),
                clue_id: self.id.clone(),
                effective_radius: effective,
                falloff: config.falloff_distance,
            });
        }
        Ok(())
    }
}

/// An item of evidence under analysis.
///
/// `discovered_clue_ids` is the persisted discovery state and only ever
/// grows during play; see [`crate::reconcile`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Opaque handle to the image asset; never interpreted here.
    #[serde(default, alias = "imageUrl")]
    pub image_reference: String,
    #[serde(default)]
    pub hidden_clues: Vec<Clue>,
    #[serde(default)]
    pub discovered_clue_ids: BTreeSet<ClueId>,
}

impl EvidenceItem {
    pub fn new(id: &str, image_reference: &str) -> Self {
        Self {
            id: id.to_string(),
            title: String::new(),
            content: String::new(),
            image_reference: image_reference.to_string(),
            hidden_clues: Vec::new(),
            discovered_clue_ids: BTreeSet::new(),
        }
    }

    pub fn with_clue(mut self, clue: Clue) -> Self {
        self.hidden_clues.push(clue);
        self
    }

    pub fn clue(&self, id: &str) -> Option<&Clue> {
        self.hidden_clues.iter().find(|c| c.id == id)
    }

    pub fn has_clue(&self, id: &str) -> bool {
        self.clue(id).is_some()
    }

    pub fn is_discovered(&self, id: &str) -> bool {
        self.discovered_clue_ids.contains(id)
    }

    /// Clues analysed with `tool`, in catalog order.
    pub fn clues_for(&self, tool: Tool) -> impl Iterator<Item = &Clue> {
        self.hidden_clues.iter().filter(move |c| c.tool == tool)
    }

    pub fn is_complete(&self) -> bool {
        self.hidden_clues
            .iter()
            .all(|c| self.discovered_clue_ids.contains(&c.id))
    }

    /// Check clue geometry, id uniqueness and the discovered-subset invariant.
    pub fn validate(&self, config: &AnalysisConfig) -> Result<(), CatalogError> {
        if !is_valid_id(&self.id) {
            return Err(CatalogError::InvalidId {
                kind: "evidence",
                id: self.id.clone(),
            });
        }
        let mut seen = HashSet::new();
        for clue in &self.hidden_clues {
            clue.validate(&self.id, config)?;
            if !seen.insert(clue.id.as_str()) {
                return Err(CatalogError::DuplicateClue {
                    evidence_id: self.id.clone(),
                    clue_id: clue.id.clone(),
                });
            }
        }
        if let Some(stray) = self
            .discovered_clue_ids
            .iter()
            .find(|id| !seen.contains(id.as_str()))
        {
            return Err(CatalogError::UnknownDiscovered {
                evidence_id: self.id.clone(),
                clue_id: stray.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    fn item() -> EvidenceItem {
        EvidenceItem::new("ev-1", "img://coffee")
            .with_clue(Clue::new("c1", Tool::Magnifier, Point::new(45.0, 55.0), 8.0))
            .with_clue(Clue::new("c2", Tool::Scanner, Point::new(80.0, 20.0), 10.0))
    }

    #[test]
    fn test_valid_item() {
        item().validate(&cfg()).unwrap();
    }

    #[test]
    fn test_id_rules() {
        assert!(is_valid_id("ev-1-2"));
        assert!(is_valid_id("c2_1.b"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("-lead"));
        assert!(!is_valid_id("has space"));
    }

    #[test]
    fn test_zero_radius_names_clue() {
        let ev = EvidenceItem::new("ev-9", "")
            .with_clue(Clue::new("bad", Tool::Magnifier, Point::new(1.0, 1.0), 0.0));
        let err = ev.validate(&cfg()).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidRadius { ref clue_id, .. } if clue_id == "bad"));
        assert!(err.to_string().contains("bad"));
        assert!(err.to_string().contains("ev-9"));
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let ev = EvidenceItem::new("ev-9", "")
            .with_clue(Clue::new("far", Tool::Magnifier, Point::new(101.0, 1.0), 5.0));
        assert!(matches!(
            ev.validate(&cfg()),
            Err(CatalogError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_radius_too_wide_for_falloff() {
        let ev = EvidenceItem::new("ev-9", "")
            .with_clue(Clue::new("huge", Tool::Magnifier, Point::new(50.0, 50.0), 40.0));
        assert!(matches!(
            ev.validate(&cfg()),
            Err(CatalogError::ThresholdOrder { .. })
        ));
    }

    #[test]
    fn test_duplicate_clue() {
        let ev = item().with_clue(Clue::new("c1", Tool::UvLight, Point::new(1.0, 1.0), 3.0));
        assert!(matches!(
            ev.validate(&cfg()),
            Err(CatalogError::DuplicateClue { .. })
        ));
    }

    #[test]
    fn test_discovered_must_be_subset() {
        let mut ev = item();
        ev.discovered_clue_ids.insert("c1".into());
        ev.validate(&cfg()).unwrap();
        ev.discovered_clue_ids.insert("ghost".into());
        assert!(matches!(
            ev.validate(&cfg()),
            Err(CatalogError::UnknownDiscovered { .. })
        ));
    }

    #[test]
    fn test_complete() {
        let mut ev = item();
        assert!(!ev.is_complete());
        ev.discovered_clue_ids.insert("c1".into());
        ev.discovered_clue_ids.insert("c2".into());
        assert!(ev.is_complete());
        assert!(EvidenceItem::new("empty", "").is_complete());
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "id": "ev-1-4",
            "title": "Broken watch",
            "imageUrl": "https://example.invalid/watch.jpg",
            "hiddenClues": [
                {"id": "c4", "tool": "MAGNIFIER", "x": 50, "y": 50, "radius": 10,
                 "description": "EM damage", "revealedText": "Gears magnetised"}
            ],
            "discoveredClueIds": []
        }"#;
        let ev: EvidenceItem = serde_json::from_str(json).unwrap();
        assert_eq!(ev.image_reference, "https://example.invalid/watch.jpg");
        assert_eq!(ev.hidden_clues[0].position, Point::new(50.0, 50.0));
        assert_eq!(ev.hidden_clues[0].revealed_text, "Gears magnetised");
        assert_eq!(ev.clues_for(Tool::Magnifier).count(), 1);
        assert_eq!(ev.clues_for(Tool::UvLight).count(), 0);
    }
}
