//! Static case content: cases, their evidence, and the hidden clues.
//!
//! Loaded once and validated up front. Malformed geometry is a content bug
//! and fails the load with an error naming the clue; nothing is clamped
//! during play.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::error::CatalogError;
use crate::evidence::{EvidenceItem, is_valid_id};

const BUILTIN_JSON: &str = include_str!("../catalog/builtin.json");

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub brief: String,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
}

impl Case {
    pub fn evidence(&self, id: &str) -> Option<&EvidenceItem> {
        self.evidence.iter().find(|e| e.id == id)
    }

    pub fn clue_count(&self) -> usize {
        self.evidence.iter().map(|e| e.hidden_clues.len()).sum()
    }

    fn validate(&self, config: &AnalysisConfig) -> Result<(), CatalogError> {
        if !is_valid_id(&self.id) {
            return Err(CatalogError::InvalidId {
                kind: "case",
                id: self.id.clone(),
            });
        }
        let mut seen = HashSet::new();
        for item in &self.evidence {
            item.validate(config)?;
            if !seen.insert(item.id.as_str()) {
                return Err(CatalogError::DuplicateEvidence {
                    case_id: self.id.clone(),
                    evidence_id: item.id.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub cases: Vec<Case>,
}

impl Catalog {
    /// Parse and validate a catalog.
    pub fn from_json(json: &str, config: &AnalysisConfig) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(json)?;
        catalog.validate(config)?;
        Ok(catalog)
    }

    /// The content shipped with the game.
    pub fn builtin(config: &AnalysisConfig) -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_JSON, config)
    }

    pub fn validate(&self, config: &AnalysisConfig) -> Result<(), CatalogError> {
        config.validate()?;
        let mut seen = HashSet::new();
        for case in &self.cases {
            case.validate(config)?;
            if !seen.insert(case.id.as_str()) {
                return Err(CatalogError::DuplicateCase(case.id.clone()));
            }
        }
        Ok(())
    }

    pub fn case(&self, id: &str) -> Option<&Case> {
        self.cases.iter().find(|c| c.id == id)
    }

    pub fn evidence(&self, case_id: &str, evidence_id: &str) -> Option<&EvidenceItem> {
        self.case(case_id)?.evidence(evidence_id)
    }

    pub fn clue_count(&self) -> usize {
        self.cases.iter().map(Case::clue_count).sum()
    }
}
