use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 2;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    // Fails harmlessly on in-memory and fresh databases.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::info!("startup WAL checkpoint complete");
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS discoveries (
            case_id       TEXT NOT NULL,
            evidence_id   TEXT NOT NULL,
            clue_id       TEXT NOT NULL,
            discovered_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (case_id, evidence_id, clue_id)
        );
        ",
    )?;

    // v1 databases recorded finds without a timestamp
    if conn
        .prepare("SELECT discovered_at FROM discoveries LIMIT 0")
        .is_err()
    {
        conn.execute_batch(
            "ALTER TABLE discoveries ADD COLUMN discovered_at TEXT NOT NULL DEFAULT '';",
        )?;
        tracing::info!("migrated discoveries table to schema v{SCHEMA_VERSION}");
    }

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_disc_case ON discoveries(case_id);",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}
