use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use rusqlite::{Connection, params};

use clue_core::{ClueId, EvidenceItem, EvidenceKey, EvidenceStore};

use crate::error::{Result, StoreError};
use crate::schema;

/// Discovered clue ids per evidence item, for one case.
pub type CaseProgress = BTreeMap<String, BTreeSet<ClueId>>;

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        tracing::debug!("opened store at {}", path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let result = stmt.query_row([key], |row| row.get(0)).ok();
        Ok(result)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Discoveries ---

    /// Persisted ids for one item, or `None` if nothing was ever recorded.
    pub fn load_discovered(&self, key: &EvidenceKey) -> Result<Option<BTreeSet<ClueId>>> {
        let mut stmt = self.conn.prepare(
            "SELECT clue_id FROM discoveries WHERE case_id = ?1 AND evidence_id = ?2",
        )?;
        let ids: BTreeSet<ClueId> = stmt
            .query_map(params![key.case_id, key.evidence_id], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(if ids.is_empty() { None } else { Some(ids) })
    }

    /// Record ids as discovered. Already-recorded ids keep their original
    /// timestamp; nothing is ever removed. Returns how many rows were new.
    pub fn save_discovered<'a, I>(&self, key: &EvidenceKey, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a ClueId>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let mut added = 0;
        {
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO discoveries (case_id, evidence_id, clue_id)
                 VALUES (?1, ?2, ?3)",
            )?;
            for id in ids {
                added += insert.execute(params![key.case_id, key.evidence_id, id])?;
            }
        }
        tx.commit()?;
        if added > 0 {
            tracing::debug!("persisted {added} new discoveries for {key}");
        }
        Ok(added)
    }

    pub fn case_progress(&self, case_id: &str) -> Result<CaseProgress> {
        let mut stmt = self.conn.prepare(
            "SELECT evidence_id, clue_id FROM discoveries WHERE case_id = ?1",
        )?;
        let rows: Vec<(String, String)> = stmt
            .query_map([case_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;

        let mut progress = CaseProgress::new();
        for (evidence_id, clue_id) in rows {
            progress.entry(evidence_id).or_default().insert(clue_id);
        }
        Ok(progress)
    }

    /// Cases with at least one recorded discovery.
    pub fn case_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT case_id FROM discoveries ORDER BY case_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(ids)
    }

    pub fn discovery_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM discoveries", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Forget every discovery of a case. The only way the persisted set
    /// shrinks; meant for debugging and replaying content.
    pub fn reset_case(&self, case_id: &str) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM discoveries WHERE case_id = ?1", [case_id])?;
        tracing::info!("reset case {case_id}: removed {removed} discoveries");
        Ok(removed)
    }
}

impl EvidenceStore for Store {
    type Error = StoreError;

    fn load(&self, key: &EvidenceKey) -> Result<Option<BTreeSet<ClueId>>> {
        self.load_discovered(key)
    }

    fn save(&self, key: &EvidenceKey, item: &EvidenceItem) -> Result<()> {
        self.save_discovered(key, &item.discovered_clue_ids)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clue_core::{AnalysisConfig, CaseFile, Catalog, Point};
    use std::time::Instant;

    fn key(evidence: &str) -> EvidenceKey {
        EvidenceKey::new("case-001", evidence)
    }

    fn ids(list: &[&str]) -> BTreeSet<ClueId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_load_missing_is_none() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.load_discovered(&key("ev-1-1")).unwrap(), None);
    }

    #[test]
    fn test_save_is_monotonic() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.save_discovered(&key("ev-1-1"), &ids(&["c1"])).unwrap(), 1);
        assert_eq!(store.save_discovered(&key("ev-1-1"), &ids(&["c1"])).unwrap(), 0);
        // a save without c1 does not remove it
        store.save_discovered(&key("ev-1-1"), &ids(&["c9"])).unwrap();
        assert_eq!(
            store.load_discovered(&key("ev-1-1")).unwrap(),
            Some(ids(&["c1", "c9"]))
        );
        assert_eq!(store.discovery_count().unwrap(), 2);
    }

    #[test]
    fn test_case_progress_and_reset() {
        let store = Store::open_in_memory().unwrap();
        store.save_discovered(&key("ev-1-1"), &ids(&["c1"])).unwrap();
        store.save_discovered(&key("ev-1-3"), &ids(&["c3"])).unwrap();
        store
            .save_discovered(&EvidenceKey::new("case-002", "ev-2-1"), &ids(&["c2-1"]))
            .unwrap();

        let progress = store.case_progress("case-001").unwrap();
        assert_eq!(progress.len(), 2);
        assert!(progress["ev-1-3"].contains("c3"));
        assert_eq!(store.case_ids().unwrap(), ["case-001", "case-002"]);

        assert_eq!(store.reset_case("case-001").unwrap(), 2);
        assert!(store.case_progress("case-001").unwrap().is_empty());
        assert_eq!(store.discovery_count().unwrap(), 1);
    }

    #[test]
    fn test_metadata() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.get_metadata("last_case").unwrap(), None);
        store.set_metadata("last_case", "case-002").unwrap();
        assert_eq!(
            store.get_metadata("last_case").unwrap().as_deref(),
            Some("case-002")
        );
    }

    #[test]
    fn test_case_file_persists_through_store() {
        let config = AnalysisConfig::default();
        let catalog = Catalog::builtin(&config).unwrap();
        let case = catalog.case("case-001").unwrap();
        let store = Store::open_in_memory().unwrap();

        let mut file = CaseFile::load(case, config.clone(), &store).unwrap();
        file.open_evidence("ev-1-4").unwrap();
        file.submit_pointer_sample(Point::new(50.0, 50.0), Instant::now())
            .unwrap();
        file.close_evidence().unwrap();
        assert_eq!(file.persist(&store).unwrap(), 1);

        let reloaded = CaseFile::load(case, config, &store).unwrap();
        assert!(reloaded.item("ev-1-4").unwrap().is_discovered("c4"));
    }

    #[test]
    fn test_reopen_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("clue.db");
        {
            let store = Store::open(&path).unwrap();
            store.save_discovered(&key("ev-1-2"), &ids(&["c2"])).unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(
            store.load_discovered(&key("ev-1-2")).unwrap(),
            Some(ids(&["c2"]))
        );
    }

    #[test]
    fn test_open_under_a_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let err = Store::open(&blocker.join("clue.db")).err().unwrap();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
