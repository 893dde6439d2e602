//! JSON progress format.
//!
//! Discovery state only: a map from evidence id to the sorted clue ids found
//! on it. Clue content is never exported; it comes back from the catalog.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::WireError;
use crate::evidence::{ClueId, EvidenceItem};
use crate::persist::EvidenceKey;

pub const CURRENT_VERSION: &str = "1";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressExport {
    pub version: String,
    #[serde(rename = "caseId")]
    pub case_id: String,
    #[serde(default)]
    pub discovered: BTreeMap<String, BTreeSet<ClueId>>,
}

impl ProgressExport {
    pub fn new(case_id: &str) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            case_id: case_id.to_string(),
            discovered: BTreeMap::new(),
        }
    }

    /// Snapshot the discovered ids of `items`. Items with nothing found are
    /// left out.
    pub fn from_items<'a, I>(case_id: &str, items: I) -> Self
    where
        I: IntoIterator<Item = &'a EvidenceItem>,
    {
        let mut export = Self::new(case_id);
        for item in items {
            if !item.discovered_clue_ids.is_empty() {
                export
                    .discovered
                    .insert(item.id.clone(), item.discovered_clue_ids.clone());
            }
        }
        export
    }

    pub fn clue_count(&self) -> usize {
        self.discovered.values().map(BTreeSet::len).sum()
    }

    pub fn entries(&self) -> impl Iterator<Item = (EvidenceKey, &BTreeSet<ClueId>)> {
        self.discovered
            .iter()
            .map(|(evidence_id, ids)| (EvidenceKey::new(&self.case_id, evidence_id), ids))
    }
}

pub fn export_json(export: &ProgressExport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(export)
}

pub fn import_json(json: &str) -> Result<ProgressExport, WireError> {
    let export: ProgressExport = serde_json::from_str(json)?;
    if export.version != CURRENT_VERSION {
        return Err(WireError::UnsupportedVersion(export.version));
    }
    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::Clue;
    use crate::geometry::Point;
    use crate::tool::Tool;

    fn items() -> Vec<EvidenceItem> {
        let mut a = EvidenceItem::new("ev-1-1", "")
            .with_clue(Clue::new("c1", Tool::Magnifier, Point::new(45.0, 55.0), 8.0));
        a.discovered_clue_ids.insert("c1".into());
        let b = EvidenceItem::new("ev-1-2", "")
            .with_clue(Clue::new("c2", Tool::Scanner, Point::new(80.0, 20.0), 10.0));
        vec![a, b]
    }

    #[test]
    fn test_shape() {
        let export = ProgressExport::from_items("case-001", &items());
        let json = export_json(&export).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["version"], CURRENT_VERSION);
        assert_eq!(v["caseId"], "case-001");
        assert_eq!(v["discovered"]["ev-1-1"], serde_json::json!(["c1"]));
        assert!(v["discovered"].get("ev-1-2").is_none());
    }

    #[test]
    fn test_import_reads_back() {
        let export = ProgressExport::from_items("case-001", &items());
        let back = import_json(&export_json(&export).unwrap()).unwrap();
        assert_eq!(back, export);
        assert_eq!(back.clue_count(), 1);
        let (key, ids) = back.entries().next().unwrap();
        assert_eq!(key, EvidenceKey::new("case-001", "ev-1-1"));
        assert!(ids.contains("c1"));
    }

    #[test]
    fn test_ids_sorted() {
        let json = r#"{"version": "1", "caseId": "k", "discovered": {"e": ["z", "a", "m", "a"]}}"#;
        let export = import_json(json).unwrap();
        let ids: Vec<&str> = export.discovered["e"].iter().map(String::as_str).collect();
        assert_eq!(ids, ["a", "m", "z"]);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let json = r#"{"version": "99", "caseId": "k", "discovered": {}}"#;
        assert!(matches!(
            import_json(json),
            Err(WireError::UnsupportedVersion(v)) if v == "99"
        ));
        assert!(matches!(import_json("not json"), Err(WireError::Json(_))));
    }
}
