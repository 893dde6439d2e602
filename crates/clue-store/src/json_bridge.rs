use std::fs;
use std::path::Path;

use clue_core::{ProgressExport, export_json, import_json};

use crate::error::{Result, StoreError};
use crate::store::Store;

impl Store {
    /// Snapshot one case's persisted discoveries.
    pub fn export_case(&self, case_id: &str) -> Result<ProgressExport> {
        let mut export = ProgressExport::new(case_id);
        export.discovered = self.case_progress(case_id)?;
        Ok(export)
    }

    pub fn export_case_json(&self, case_id: &str) -> Result<String> {
        let export = self.export_case(case_id)?;
        export_json(&export)
            .map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))
    }

    pub fn export_json_file(&self, case_id: &str, path: &Path) -> Result<()> {
        let json = self.export_case_json(case_id)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Merge an export into the store. Returns how many discoveries were new.
    pub fn import_export(&self, export: &ProgressExport) -> Result<usize> {
        let mut added = 0;
        for (key, ids) in export.entries() {
            added += self.save_discovered(&key, ids)?;
        }
        tracing::info!(
            "imported {added} new discoveries for case {}",
            export.case_id
        );
        Ok(added)
    }

    pub fn import_json_str(&self, json: &str) -> Result<usize> {
        let export =
            import_json(json).map_err(|e| StoreError::InvalidData(format!("invalid JSON: {e}")))?;
        self.import_export(&export)
    }

    pub fn import_json_file(&self, path: &Path) -> Result<usize> {
        let json = fs::read_to_string(path)?;
        self.import_json_str(&json)
    }
}
