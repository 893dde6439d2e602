//! The persistence seam.
//!
//! A store only keeps discovery ids keyed by (case, evidence); clue content
//! always comes from the catalog. [`restore`] stitches the two together.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::convert::Infallible;
use std::fmt;

use crate::evidence::{ClueId, EvidenceItem};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EvidenceKey {
    pub case_id: String,
    pub evidence_id: String,
}

impl EvidenceKey {
    pub fn new(case_id: &str, evidence_id: &str) -> Self {
        Self {
            case_id: case_id.to_string(),
            evidence_id: evidence_id.to_string(),
        }
    }
}

impl fmt::Display for EvidenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.case_id, self.evidence_id)
    }
}

/// Durable key-value surface for discovery state.
pub trait EvidenceStore {
    type Error;

    /// Persisted discovered ids, or `None` if nothing was ever saved.
    fn load(&self, key: &EvidenceKey) -> Result<Option<BTreeSet<ClueId>>, Self::Error>;

    /// Persist the item's discovered ids. Must never forget ids that were
    /// saved before.
    fn save(&self, key: &EvidenceKey, item: &EvidenceItem) -> Result<(), Self::Error>;
}

/// Catalog content plus persisted ids. Ids that no longer name a clue of the
/// item are dropped; the count of dropped ids is returned alongside.
pub fn restore(template: &EvidenceItem, persisted: &BTreeSet<ClueId>) -> (EvidenceItem, usize) {
    let mut item = template.clone();
    let mut dropped = 0;
    for id in persisted {
        if item.has_clue(id) {
            item.discovered_clue_ids.insert(id.clone());
        } else {
            dropped += 1;
        }
    }
    (item, dropped)
}

/// In-process store for tests and embedders that do not want SQLite.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<EvidenceKey, BTreeSet<ClueId>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl EvidenceStore for MemoryStore {
    type Error = Infallible;

    fn load(&self, key: &EvidenceKey) -> Result<Option<BTreeSet<ClueId>>, Infallible> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn save(&self, key: &EvidenceKey, item: &EvidenceItem) -> Result<(), Infallible> {
        self.entries
            .borrow_mut()
            .entry(key.clone())
            .or_default()
            .extend(item.discovered_clue_ids.iter().cloned());
        Ok(())
    }
}
