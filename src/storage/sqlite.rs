//! SQLite storage implementation.
//!
//! This module provides the storage backend for the MemoryLane index: the row
//! store, the sync marker store, and the settings table. Every mutation goes
//! through [`SqliteStorage::mutate`], so each call commits as its own
//! IMMEDIATE transaction.

use crate::error::Result;
use crate::model::{Row, SortDirection, SyncMarker};
use crate::storage::schema::apply_schema;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

const ROW_COLUMNS: &str = "id, document_path, file_name, tag, content, row_created_at, day_key,
     year_key, document_created_at, document_modified_at, indexed_at, updated_at";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, tracking which rows it touched.
///
/// Callers read the sets back inside the closure to report what a
/// transaction changed.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    pub inserted_rows: HashSet<String>,
    pub updated_rows: HashSet<String>,
    pub removed_rows: HashSet<String>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            inserted_rows: HashSet::new(),
            updated_rows: HashSet::new(),
            removed_rows: HashSet::new(),
        }
    }

    pub fn record_insert(&mut self, row_id: &str) {
        self.inserted_rows.insert(row_id.to_string());
    }

    pub fn record_update(&mut self, row_id: &str) {
        self.updated_rows.insert(row_id.to_string());
    }

    pub fn record_remove(&mut self, row_id: &str) {
        self.removed_rows.insert(row_id.to_string());
    }

    /// Whether the transaction has written or deleted any row.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !(self.inserted_rows.is_empty() && self.updated_rows.is_empty() && self.removed_rows.is_empty())
    }
}

/// Counts of what the index currently holds.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct IndexCounts {
    pub rows: usize,
    pub documents: usize,
    pub markers: usize,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// Begins an IMMEDIATE transaction, runs the closure, and commits. The
    /// transaction is rolled back if the closure fails.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op);
        let result = f(&tx, &mut ctx)?;

        tx.commit()?;

        if ctx.is_dirty() {
            tracing::trace!(
                op = %ctx.op_name,
                inserted = ctx.inserted_rows.len(),
                updated = ctx.updated_rows.len(),
                removed = ctx.removed_rows.len(),
                "mutation committed"
            );
        }

        Ok(result)
    }

    // ==================
    // Row Store
    // ==================

    /// Insert a row, or replace the stored row with the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails, including when another row
    /// already holds the same `(document_path, tag, content)`.
    pub fn upsert_row(&mut self, row: &Row) -> Result<()> {
        self.mutate("upsert_row", |tx, ctx| upsert_row_in(tx, row, ctx))
    }

    /// Delete a row by id. Absent ids are not an error.
    ///
    /// Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn remove_row(&mut self, id: &str) -> Result<bool> {
        self.mutate("remove_row", |tx, ctx| remove_row_in(tx, id, ctx))
    }

    /// Get a row by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_row(&self, id: &str) -> Result<Option<Row>> {
        let sql = format!("SELECT {ROW_COLUMNS} FROM marked_rows WHERE id = ?1");
        let row = self.conn.query_row(&sql, [id], map_row).optional()?;
        Ok(row)
    }

    /// Rows one document holds under `tag`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_rows_by_document(&self, document_path: &str, tag: &str) -> Result<Vec<Row>> {
        Ok(rows_by_document_in(&self.conn, document_path, tag)?)
    }

    /// Every row indexed under `tag`, optionally filtered, sorted by
    /// `row_created_at`.
    ///
    /// The filter keeps rows whose content contains it, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_rows(
        &self,
        tag: &str,
        filter: Option<&str>,
        direction: SortDirection,
    ) -> Result<Vec<Row>> {
        let dir = direction.as_sql();
        let sql = format!(
            "SELECT {ROW_COLUMNS} FROM marked_rows WHERE tag = ?1
             ORDER BY row_created_at {dir}, document_path ASC, content ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([tag], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let Some(needle) = filter.map(str::to_lowercase) else {
            return Ok(rows);
        };

        Ok(rows
            .into_iter()
            .filter(|row| row.content.to_lowercase().contains(&needle))
            .collect())
    }

    /// Rows under `tag` recorded on a given `MM-DD`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_rows_by_day_key(&self, tag: &str, day_key: &str) -> Result<Vec<Row>> {
        let sql = format!(
            "SELECT {ROW_COLUMNS} FROM marked_rows WHERE tag = ?1 AND day_key = ?2
             ORDER BY row_created_at DESC, document_path ASC, content ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([tag, day_key], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Distinct document paths that currently own rows under `tag`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_document_paths(&self, tag: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT document_path FROM marked_rows WHERE tag = ?1 ORDER BY document_path",
        )?;
        let paths = stmt
            .query_map([tag], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(paths)
    }

    /// Delete every row a document holds under `tag`, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn remove_rows_for_document(&mut self, document_path: &str, tag: &str) -> Result<usize> {
        self.mutate("remove_rows_for_document", |tx, ctx| {
            for row in rows_by_document_in(tx, document_path, tag)? {
                remove_row_in(tx, &row.id, ctx)?;
            }
            Ok(ctx.removed_rows.len())
        })
    }

    // ==================
    // Sync Marker Store
    // ==================

    /// Get the marker for a folder and tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_sync_marker(&self, folder_path: &str, tag: &str) -> Result<Option<SyncMarker>> {
        let marker = self
            .conn
            .query_row(
                "SELECT folder_path, tag, last_synced_at FROM sync_markers
                 WHERE folder_path = ?1 AND tag = ?2",
                [folder_path, tag],
                map_marker,
            )
            .optional()?;
        Ok(marker)
    }

    /// Create or replace the marker for a folder and tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn put_sync_marker(&mut self, marker: &SyncMarker) -> Result<()> {
        self.mutate("put_sync_marker", |tx, _ctx| {
            tx.execute(
                "INSERT INTO sync_markers (folder_path, tag, last_synced_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(folder_path, tag) DO UPDATE SET
                   last_synced_at = excluded.last_synced_at",
                rusqlite::params![marker.folder_path, marker.tag, marker.last_synced_at],
            )?;
            Ok(())
        })
    }

    /// All markers, ordered by folder then tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_sync_markers(&self) -> Result<Vec<SyncMarker>> {
        let mut stmt = self.conn.prepare(
            "SELECT folder_path, tag, last_synced_at FROM sync_markers ORDER BY folder_path, tag",
        )?;
        let markers = stmt
            .query_map([], map_marker)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(markers)
    }

    /// Drop every row and marker.
    ///
    /// Used when the monitored folder or tag changes, since rows indexed for
    /// the old configuration no longer describe the new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn clear_index(&mut self) -> Result<IndexCounts> {
        self.mutate("clear_index", |tx, _ctx| {
            let documents: i64 =
                tx.query_row("SELECT COUNT(DISTINCT document_path) FROM marked_rows", [], |r| {
                    r.get(0)
                })?;
            let rows = tx.execute("DELETE FROM marked_rows", [])?;
            let markers = tx.execute("DELETE FROM sync_markers", [])?;
            Ok(IndexCounts {
                rows,
                documents: count_to_usize(documents),
                markers,
            })
        })
    }

    /// Row, document and marker counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn index_counts(&self) -> Result<IndexCounts> {
        let (rows, documents): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT document_path) FROM marked_rows",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        let markers: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM sync_markers", [], |r| r.get(0))?;
        Ok(IndexCounts {
            rows: count_to_usize(rows),
            documents: count_to_usize(documents),
            markers: count_to_usize(markers),
        })
    }

    // ==================
    // Settings
    // ==================

    /// Get a settings value.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a settings value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_setting(&mut self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.mutate("set_setting", |tx, _ctx| {
            tx.execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                rusqlite::params![key, value, now],
            )?;
            Ok(())
        })
    }

    /// Remove a settings value.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_setting(&mut self, key: &str) -> Result<()> {
        self.mutate("delete_setting", |tx, _ctx| {
            tx.execute("DELETE FROM settings WHERE key = ?1", [key])?;
            Ok(())
        })
    }
}

// ==================
// Transaction-scoped row operations
// ==================

/// Insert or replace a row inside an open transaction.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn upsert_row_in(conn: &Connection, row: &Row, ctx: &mut MutationContext) -> Result<()> {
    let existed = conn
        .prepare("SELECT 1 FROM marked_rows WHERE id = ?1")?
        .exists([&row.id])?;

    conn.execute(
        "INSERT INTO marked_rows (id, document_path, file_name, tag, content, row_created_at, day_key,
             year_key, document_created_at, document_modified_at, indexed_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(id) DO UPDATE SET
           document_path = excluded.document_path,
           file_name = excluded.file_name,
           tag = excluded.tag,
           content = excluded.content,
           row_created_at = excluded.row_created_at,
           day_key = excluded.day_key,
           year_key = excluded.year_key,
           document_created_at = excluded.document_created_at,
           document_modified_at = excluded.document_modified_at,
           indexed_at = excluded.indexed_at,
           updated_at = excluded.updated_at",
        rusqlite::params![
            row.id,
            row.document_path,
            row.file_name,
            row.tag,
            row.content,
            row.row_created_at,
            row.day_key,
            row.year_key,
            row.document_created_at,
            row.document_modified_at,
            row.indexed_at,
            row.updated_at,
        ],
    )?;

    if existed {
        ctx.record_update(&row.id);
    } else {
        ctx.record_insert(&row.id);
    }
    Ok(())
}

/// Delete a row inside an open transaction. Returns whether it existed.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn remove_row_in(conn: &Connection, id: &str, ctx: &mut MutationContext) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM marked_rows WHERE id = ?1", [id])?;
    if deleted > 0 {
        ctx.record_remove(id);
    }
    Ok(deleted > 0)
}

/// Rows a document holds under `tag`, read through the given connection or
/// transaction.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn rows_by_document_in(
    conn: &Connection,
    document_path: &str,
    tag: &str,
) -> rusqlite::Result<Vec<Row>> {
    let sql = format!("SELECT {ROW_COLUMNS} FROM marked_rows WHERE document_path = ?1 AND tag = ?2");
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_map([document_path, tag], map_row)?.collect()
}

fn count_to_usize(count: i64) -> usize {
    usize::try_from(count).unwrap_or_default()
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Row> {
    Ok(Row {
        id: row.get(0)?,
        document_path: row.get(1)?,
        file_name: row.get(2)?,
        tag: row.get(3)?,
        content: row.get(4)?,
        row_created_at: row.get(5)?,
        day_key: row.get(6)?,
        year_key: row.get(7)?,
        document_created_at: row.get(8)?,
        document_modified_at: row.get(9)?,
        indexed_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn map_marker(row: &rusqlite::Row) -> rusqlite::Result<SyncMarker> {
    Ok(SyncMarker {
        folder_path: row.get(0)?,
        tag: row.get(1)?,
        last_synced_at: row.get(2)?,
    })
}
