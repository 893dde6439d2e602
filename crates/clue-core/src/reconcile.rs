//! Session vs persisted discovery state.
//!
//! A clue counts as revealed when it is in the evidence item's persisted
//! `discovered_clue_ids` OR in the current session set. Read-side views
//! must always ask through [`is_revealed`] / [`revealed_clues`] so they
//! never see one half of the union in isolation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::evidence::{Clue, ClueId, EvidenceItem};

/// Clues discovered during the current analysis session.
///
/// Lives for one open instance of one evidence item. Its only job is to
/// tell "just found, celebrate once" apart from "found earlier, render as
/// solved".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDiscoverySet {
    ids: BTreeSet<ClueId>,
}

impl SessionDiscoverySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the id was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClueId> {
        self.ids.iter()
    }
}

/// `discovered' = discovered ∪ session`. Idempotent and order-independent;
/// ids that do not name a clue of the item are ignored so the subset
/// invariant holds whatever the session set contains.
pub fn merge(evidence: &EvidenceItem, session: &SessionDiscoverySet) -> EvidenceItem {
    let mut merged = evidence.clone();
    merge_into(&mut merged, session);
    merged
}

/// In-place [`merge`]. Returns how many ids were newly persisted.
pub fn merge_into(evidence: &mut EvidenceItem, session: &SessionDiscoverySet) -> usize {
    let mut added = 0;
    for id in session.iter() {
        if evidence.has_clue(id) && evidence.discovered_clue_ids.insert(id.clone()) {
            added += 1;
        }
    }
    added
}

pub fn is_revealed(evidence: &EvidenceItem, session: &SessionDiscoverySet, clue_id: &str) -> bool {
    evidence.is_discovered(clue_id) || session.contains(clue_id)
}

/// Revealed clues in catalog order (report view, detailed log).
pub fn revealed_clues<'a>(
    evidence: &'a EvidenceItem,
    session: &SessionDiscoverySet,
) -> Vec<&'a Clue> {
    evidence
        .hidden_clues
        .iter()
        .filter(|c| is_revealed(evidence, session, &c.id))
        .collect()
}
