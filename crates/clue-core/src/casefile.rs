//! One loaded case: canonical evidence items, at most one open analysis
//! session, and the set of items whose merged state is not yet durable.
//!
//! Discoveries are merged into the canonical item inside
//! [`CaseFile::submit_pointer_sample`]. Opening another item simply drops
//! the old session; nothing is lost because nothing was pending in it.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::catalog::Case;
use crate::config::AnalysisConfig;
use crate::error::SessionError;
use crate::evidence::{Clue, EvidenceItem};
use crate::geometry::Point;
use crate::persist::{EvidenceKey, EvidenceStore, restore};
use crate::reconcile::{self, SessionDiscoverySet};
use crate::session::{AnalysisSession, SampleOutcome, SessionTick};
use crate::tool::Tool;
use crate::wire::ProgressExport;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabStatus {
    Complete,
    PendingLab,
}

impl LabStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "COMPLETE",
            Self::PendingLab => "PENDING_LAB",
        }
    }
}

impl fmt::Display for LabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Read-side summary for one evidence item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceProgress {
    pub evidence_id: String,
    pub title: String,
    pub found: usize,
    pub total: usize,
    pub status: LabStatus,
}

#[derive(Debug)]
pub struct CaseFile {
    case_id: String,
    config: AnalysisConfig,
    items: Vec<EvidenceItem>,
    session: Option<AnalysisSession>,
    dirty: BTreeSet<String>,
    dropped_on_load: usize,
}

impl CaseFile {
    /// Fresh case with only the catalog's own discovery state.
    pub fn new(case: &Case, config: AnalysisConfig) -> Self {
        Self {
            case_id: case.id.clone(),
            config,
            items: case.evidence.clone(),
            session: None,
            dirty: BTreeSet::new(),
            dropped_on_load: 0,
        }
    }

    /// Restore every item of `case` from `store`.
    pub fn load<S: EvidenceStore>(
        case: &Case,
        config: AnalysisConfig,
        store: &S,
    ) -> Result<Self, S::Error> {
        let mut file = Self::new(case, config);
        for item in &mut file.items {
            let key = EvidenceKey::new(&case.id, &item.id);
            if let Some(persisted) = store.load(&key)? {
                let (restored, dropped) = restore(item, &persisted);
                *item = restored;
                file.dropped_on_load += dropped;
            }
        }
        Ok(file)
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn items(&self) -> &[EvidenceItem] {
        &self.items
    }

    pub fn item(&self, evidence_id: &str) -> Option<&EvidenceItem> {
        self.items.iter().find(|i| i.id == evidence_id)
    }

    pub fn session(&self) -> Option<&AnalysisSession> {
        self.session.as_ref()
    }

    /// Persisted ids that no longer named a clue when the case was loaded.
    pub fn dropped_on_load(&self) -> usize {
        self.dropped_on_load
    }

    pub fn open_evidence(&mut self, evidence_id: &str) -> Result<&AnalysisSession, SessionError> {
        let item = self
            .item(evidence_id)
            .ok_or_else(|| self.unknown(evidence_id))?;
        let session = AnalysisSession::open(item);
        Ok(self.session.insert(session))
    }

    /// Returns whether the tool actually changed.
    pub fn set_active_tool(&mut self, tool: Tool) -> Result<bool, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        Ok(session.set_tool(tool))
    }

    pub fn submit_pointer_sample(
        &mut self,
        position: Point,
        now: Instant,
    ) -> Result<SampleOutcome, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == session.evidence_id())
            .ok_or_else(|| SessionError::UnknownEvidence {
                case_id: self.case_id.clone(),
                evidence_id: session.evidence_id().to_string(),
            })?;
        let outcome = session.submit(&self.config, item, position, now);
        if outcome.discovery.is_some() {
            self.dirty.insert(item.id.clone());
        }
        Ok(outcome)
    }

    pub fn tick(&mut self, now: Instant) -> Result<SessionTick, SessionError> {
        let session = self.session.as_mut().ok_or(SessionError::NoActiveSession)?;
        Ok(session.tick(now))
    }

    /// Close the open session and hand back the merged item. The caller
    /// persists it, usually through [`CaseFile::persist`].
    pub fn close_evidence(&mut self) -> Result<EvidenceItem, SessionError> {
        let session = self.session.take().ok_or(SessionError::NoActiveSession)?;
        let evidence_id = session.evidence_id().to_string();
        let idx = self
            .items
            .iter()
            .position(|i| i.id == evidence_id)
            .ok_or_else(|| self.unknown(&evidence_id))?;
        let merged = session.close(&self.items[idx]);
        self.items[idx] = merged.clone();
        Ok(merged)
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Save every item with unsaved discoveries. Items that fail stay dirty,
    /// so calling this again retries them. Returns how many were saved.
    pub fn persist<S: EvidenceStore>(&mut self, store: &S) -> Result<usize, S::Error> {
        let pending: Vec<String> = self.dirty.iter().cloned().collect();
        let mut saved = 0;
        for evidence_id in pending {
            if let Some(item) = self.items.iter().find(|i| i.id == evidence_id) {
                store.save(&EvidenceKey::new(&self.case_id, &evidence_id), item)?;
                saved += 1;
            }
            self.dirty.remove(&evidence_id);
        }
        Ok(saved)
    }

    pub fn progress(&self) -> Vec<EvidenceProgress> {
        self.items
            .iter()
            .map(|item| {
                let found = item.discovered_clue_ids.len();
                let total = item.hidden_clues.len();
                EvidenceProgress {
                    evidence_id: item.id.clone(),
                    title: item.title.clone(),
                    found,
                    total,
                    status: if item.is_complete() {
                        LabStatus::Complete
                    } else {
                        LabStatus::PendingLab
                    },
                }
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.items.iter().all(EvidenceItem::is_complete)
    }

    /// Revealed clues of one item in catalog order, including anything
    /// found by the open session.
    pub fn revealed_clues(&self, evidence_id: &str) -> Result<Vec<&Clue>, SessionError> {
        let item = self
            .item(evidence_id)
            .ok_or_else(|| self.unknown(evidence_id))?;
        Ok(match &self.session {
            Some(s) if s.evidence_id() == evidence_id => s.revealed(item),
            _ => reconcile::revealed_clues(item, &SessionDiscoverySet::new()),
        })
    }

    pub fn export(&self) -> ProgressExport {
        ProgressExport::from_items(&self.case_id, &self.items)
    }

    fn unknown(&self, evidence_id: &str) -> SessionError {
        SessionError::UnknownEvidence {
            case_id: self.case_id.clone(),
            evidence_id: evidence_id.to_string(),
        }
    }
}
