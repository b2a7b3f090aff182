//! Repairs the `heuristics` table of the ELF memory index.
//!
//! Older indexes created the table with `NOT NULL` columns that had no
//! defaults, which breaks inserts that only name the required fields. The
//! repair rebuilds the table with defaults while keeping every row.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;
use tracing::info;

pub const HEURISTICS_TABLE: &str = "heuristics";
const BACKUP_TABLE: &str = "heuristics_old";

/// Current schema for the heuristics table; column order matches legacy tables.
pub const HEURISTICS_DDL: &str = "
CREATE TABLE heuristics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    domain TEXT NOT NULL,
    rule TEXT NOT NULL,
    explanation TEXT,
    source_type TEXT,
    source_id INTEGER,
    confidence REAL DEFAULT 0.5,
    times_validated INTEGER DEFAULT 0,
    times_violated INTEGER DEFAULT 0,
    is_golden INTEGER DEFAULT 0,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    status TEXT DEFAULT 'active',
    dormant_since TIMESTAMP,
    revival_conditions TEXT,
    times_revived INTEGER DEFAULT 0,
    times_contradicted INTEGER DEFAULT 0,
    min_applications INTEGER DEFAULT 1,
    last_confidence_update TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    update_count_today INTEGER DEFAULT 0,
    update_count_reset_date DATE DEFAULT CURRENT_DATE,
    last_used_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    confidence_ema REAL DEFAULT 0.5,
    ema_alpha REAL DEFAULT 0.2,
    ema_warmup_remaining INTEGER DEFAULT 0,
    last_ema_update TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    fraud_flags INTEGER DEFAULT 0,
    is_quarantined INTEGER DEFAULT 0,
    last_fraud_check TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    project_path TEXT
)";

const GOLDEN_INDEX_DDL: &str =
    "CREATE INDEX IF NOT EXISTS idx_heuristics_is_golden ON heuristics(is_golden)";

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("database not found at {0}")]
    MissingDatabase(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFixReport {
    /// No heuristics table exists yet; nothing was changed.
    TableMissing,
    Rebuilt { rows_restored: usize },
}

/// Opens the index at `path` and repairs it.
///
/// # Errors
/// Returns `SchemaError::MissingDatabase` if the file does not exist, or any
/// SQLite error raised while rebuilding (the transaction is rolled back).
pub fn fix_database(path: &Path) -> Result<SchemaFixReport, SchemaError> {
    if !path.exists() {
        return Err(SchemaError::MissingDatabase(path.display().to_string()));
    }
    let mut conn = Connection::open(path)?;
    fix_heuristics_schema(&mut conn)
}

/// Rebuilds the heuristics table inside a single transaction.
///
/// # Errors
/// Returns any SQLite error; nothing is committed on failure.
pub fn fix_heuristics_schema(conn: &mut Connection) -> Result<SchemaFixReport, SchemaError> {
    let exists = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [HEURISTICS_TABLE],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .is_some();
    if !exists {
        info!("heuristics table does not exist yet");
        return Ok(SchemaFixReport::TableMissing);
    }

    let tx = conn.transaction()?;
    tx.execute_batch(&format!("ALTER TABLE {HEURISTICS_TABLE} RENAME TO {BACKUP_TABLE}"))?;
    info!("backed up existing heuristics table");

    tx.execute_batch(HEURISTICS_DDL)?;
    info!("created heuristics table with defaults");

    let rows_restored = tx.execute(
        &format!("INSERT INTO {HEURISTICS_TABLE} SELECT * FROM {BACKUP_TABLE}"),
        [],
    )?;
    info!(rows_restored, "restored heuristics rows");

    tx.execute_batch(&format!("DROP TABLE {BACKUP_TABLE}"))?;
    tx.execute_batch(GOLDEN_INDEX_DDL)?;
    tx.commit()?;
    info!("heuristics schema fixed");

    Ok(SchemaFixReport::Rebuilt { rows_restored })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Same columns as the current schema, without any defaults.
    const LEGACY_DDL: &str = "
CREATE TABLE heuristics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    domain TEXT NOT NULL, rule TEXT NOT NULL, explanation TEXT, source_type TEXT,
    source_id INTEGER, confidence REAL NOT NULL, times_validated INTEGER NOT NULL,
    times_violated INTEGER NOT NULL, is_golden INTEGER NOT NULL, created_at TIMESTAMP,
    updated_at TIMESTAMP, status TEXT NOT NULL, dormant_since TIMESTAMP,
    revival_conditions TEXT, times_revived INTEGER, times_contradicted INTEGER,
    min_applications INTEGER, last_confidence_update TIMESTAMP, update_count_today INTEGER,
    update_count_reset_date DATE, last_used_at TIMESTAMP, confidence_ema REAL,
    ema_alpha REAL, ema_warmup_remaining INTEGER, last_ema_update TIMESTAMP,
    fraud_flags INTEGER, is_quarantined INTEGER, last_fraud_check TIMESTAMP,
    project_path TEXT
)";

    fn legacy_connection() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory sqlite");
        conn.execute_batch(LEGACY_DDL).expect("legacy table");
        conn.execute(
            "INSERT INTO heuristics (domain, rule, confidence, times_validated, times_violated, is_golden, status)
             VALUES ('rust', 'prefer explicit errors', 0.9, 3, 0, 1, 'active')",
            [],
        )
        .expect("legacy row");
        conn
    }

    #[test]
    fn missing_table_is_left_alone() {
        let mut conn = Connection::open_in_memory().expect("in-memory sqlite");
        let report = fix_heuristics_schema(&mut conn).expect("fix");
        assert_eq!(report, SchemaFixReport::TableMissing);
    }

    #[test]
    fn rebuild_keeps_rows_and_adds_defaults() {
        let mut conn = legacy_connection();

        let report = fix_heuristics_schema(&mut conn).expect("fix");
        assert_eq!(report, SchemaFixReport::Rebuilt { rows_restored: 1 });

        let rule: String = conn
            .query_row("SELECT rule FROM heuristics WHERE domain = 'rust'", [], |row| row.get(0))
            .expect("restored row");
        assert_eq!(rule, "prefer explicit errors");

        conn.execute(
            "INSERT INTO heuristics (domain, rule) VALUES ('python', 'pin dependencies')",
            [],
        )
        .expect("defaults should satisfy the schema");
        let (confidence, status): (f64, String) = conn
            .query_row(
                "SELECT confidence, status FROM heuristics WHERE domain = 'python'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .expect("new row");
        assert!((confidence - 0.5).abs() < f64::EPSILON);
        assert_eq!(status, "active");

        let backup: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE name = 'heuristics_old'",
                [],
                |row| row.get(0),
            )
            .optional()
            .expect("query");
        assert!(backup.is_none());
    }

    #[test]
    fn missing_database_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = fix_database(&dir.path().join("index.db")).expect_err("no file");
        assert!(matches!(err, SchemaError::MissingDatabase(_)));
    }
}
