//! Database schema definitions.
//!
//! This module contains the complete SQLite schema for the MemoryLane index.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the MemoryLane database.
///
/// Note: Timestamps are stored as INTEGER (Unix milliseconds).
pub const SCHEMA_SQL: &str = r#"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Row Store
-- ====================

-- Marked rows: one per distinct (document_path, tag, content)
CREATE TABLE IF NOT EXISTS marked_rows (
    id TEXT PRIMARY KEY,
    document_path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    tag TEXT NOT NULL CHECK (length(tag) > 0),
    content TEXT NOT NULL,
    row_created_at INTEGER NOT NULL,
    day_key TEXT NOT NULL CHECK (day_key GLOB '[0-9][0-9]-[0-9][0-9]'),
    year_key TEXT NOT NULL,
    document_created_at INTEGER NOT NULL,
    document_modified_at INTEGER NOT NULL,
    indexed_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(document_path, tag, content)
);

CREATE INDEX IF NOT EXISTS idx_marked_rows_document ON marked_rows(document_path);
CREATE INDEX IF NOT EXISTS idx_marked_rows_tag_day_key ON marked_rows(tag, day_key);
CREATE INDEX IF NOT EXISTS idx_marked_rows_created ON marked_rows(row_created_at DESC);

-- ====================
-- Sync Marker Store
-- ====================

CREATE TABLE IF NOT EXISTS sync_markers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    folder_path TEXT NOT NULL,
    tag TEXT NOT NULL,
    last_synced_at INTEGER NOT NULL,
    UNIQUE(folder_path, tag)
);

CREATE INDEX IF NOT EXISTS idx_sync_markers_folder ON sync_markers(folder_path);

-- ====================
-- Settings (folder, tag, date format, vault)
-- ====================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

/// Apply the schema to the database.
///
/// This uses `execute_batch` to run the entire DDL script.
/// It is idempotent because all statements use `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    // Readers proceed while a sync pass writes
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    // Every committed row write survives a crash
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"marked_rows".to_string()));
        assert!(tables.contains(&"sync_markers".to_string()));
        assert!(tables.contains(&"settings".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        apply_schema(&conn).expect("First apply failed");
        apply_schema(&conn).expect("Second apply failed");

        let versions: i32 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_secondary_indexes_exist() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(indexes.contains(&"idx_marked_rows_document".to_string()));
        assert!(indexes.contains(&"idx_marked_rows_tag_day_key".to_string()));
        assert!(indexes.contains(&"idx_sync_markers_folder".to_string()));
    }

    #[test]
    fn test_day_key_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let insert = |id: &str, day_key: &str| {
            conn.execute(
                "INSERT INTO marked_rows (id, document_path, file_name, tag, content, row_created_at,
                    day_key, year_key, document_created_at, document_modified_at, indexed_at, updated_at)
                 VALUES (?1, 'a.md', 'a.md', '#m', ?1, 0, ?2, '1970', 0, 0, 0, 0)",
                rusqlite::params![id, day_key],
            )
        };

        assert!(insert("row_ok", "05-01").is_ok());
        assert!(insert("row_bad", "5-1").is_err());
    }

    #[test]
    fn test_same_line_may_exist_once_per_tag() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let insert = |id: &str, tag: &str| {
            conn.execute(
                "INSERT INTO marked_rows (id, document_path, file_name, tag, content, row_created_at,
                    day_key, year_key, document_created_at, document_modified_at, indexed_at, updated_at)
                 VALUES (?1, 'a.md', 'a.md', ?2, '#a #b line', 0, '01-01', '1970', 0, 0, 0, 0)",
                rusqlite::params![id, tag],
            )
        };

        assert!(insert("row_a", "#a").is_ok());
        assert!(insert("row_b", "#b").is_ok());
        assert!(insert("row_a2", "#a").is_err());
        assert!(insert("row_empty", "").is_err());
    }

    #[test]
    fn test_one_marker_per_folder_and_tag() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO sync_markers (folder_path, tag, last_synced_at) VALUES ('/journal', '#m', 1)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO sync_markers (folder_path, tag, last_synced_at) VALUES ('/journal', '#m', 2)",
            [],
        );
        assert!(dup.is_err());
    }
}
