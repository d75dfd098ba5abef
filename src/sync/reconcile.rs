//! Per-document reconciliation.
//!
//! Brings the stored rows for one document into agreement with its current
//! text. Rows are matched by exact line content, not by position: an edited
//! line becomes a removal plus an insertion, and a moved line keeps its row.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::model::Row;
use crate::storage::SqliteStorage;
use crate::storage::sqlite::{remove_row_in, rows_by_document_in, upsert_row_in};
use crate::sync::source::DocumentMeta;
use crate::sync::types::ReconcileStats;

/// Lines of `content` that contain `tag`, in document order.
pub fn tagged_lines<'c>(content: &'c str, tag: &'c str) -> impl Iterator<Item = &'c str> + 'c {
    content.lines().filter(move |line| line.contains(tag))
}

/// Reconciler for documents under one tag marker.
pub struct Reconciler<'a> {
    storage: &'a mut SqliteStorage,
    tag: &'a str,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler for `tag`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is empty, since every line would match.
    pub fn new(storage: &'a mut SqliteStorage, tag: &'a str) -> Result<Self> {
        if tag.is_empty() {
            return Err(Error::InvalidArgument("tag must not be empty".to_string()));
        }
        Ok(Self { storage, tag })
    }

    /// Reconcile one document against its current content.
    ///
    /// All inserts, refreshes and removals for the document commit in a
    /// single transaction, so a concurrent reader sees either the old or the
    /// new row set for this document.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written; nothing is
    /// applied in that case.
    pub fn reconcile(&mut self, document: &DocumentMeta, content: &str) -> Result<ReconcileStats> {
        let tag = self.tag;
        let now = chrono::Utc::now().timestamp_millis();

        let stats = self.storage.mutate("reconcile_document", |tx, ctx| {
            let mut stored: HashMap<String, Row> = rows_by_document_in(tx, &document.path, tag)?
                .into_iter()
                .map(|row| (row.content.clone(), row))
                .collect();
            let mut seen: HashSet<&str> = HashSet::new();
            let mut stats = ReconcileStats::default();

            for line in tagged_lines(content, tag) {
                if !seen.insert(line) {
                    stats.duplicates += 1;
                    continue;
                }

                match stored.remove(line) {
                    Some(mut row) if row.is_stale(document.modified_at) => {
                        row.document_created_at = document.created_at;
                        row.document_modified_at = document.modified_at;
                        row.updated_at = now.max(row.updated_at);
                        upsert_row_in(tx, &row, ctx)?;
                    }
                    Some(_) => stats.unchanged += 1,
                    None => {
                        let row = Row::observe(
                            &document.path,
                            tag,
                            line,
                            document.created_at,
                            document.modified_at,
                            now,
                        );
                        upsert_row_in(tx, &row, ctx)?;
                    }
                }
            }

            // Whatever was not consumed above has left the document
            for row in stored.values() {
                remove_row_in(tx, &row.id, ctx)?;
            }

            stats.inserted = ctx.inserted_rows.len();
            stats.updated = ctx.updated_rows.len();
            stats.removed = ctx.removed_rows.len();
            Ok(stats)
        })?;

        tracing::debug!(
            path = %document.path,
            inserted = stats.inserted,
            updated = stats.updated,
            removed = stats.removed,
            "Reconciled document"
        );

        Ok(stats)
    }

    /// Drop every row this tag holds for a document that no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn forget(&mut self, document_path: &str) -> Result<usize> {
        self.storage.remove_rows_for_document(document_path, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SortDirection;

    const TAG: &str = "#memory";

    fn doc(path: &str, modified_at: i64) -> DocumentMeta {
        DocumentMeta {
            path: path.to_string(),
            created_at: 1_000,
            modified_at,
        }
    }

    fn reconcile(storage: &mut SqliteStorage, meta: &DocumentMeta, content: &str) -> ReconcileStats {
        Reconciler::new(storage, TAG)
            .unwrap()
            .reconcile(meta, content)
            .unwrap()
    }

    #[test]
    fn test_tagged_lines_preserve_order() {
        let content = "intro\n#memory one\nplain\n#memory two\r\n";
        let lines: Vec<&str> = tagged_lines(content, TAG).collect();
        assert_eq!(lines, vec!["#memory one", "#memory two"]);
    }

    #[test]
    fn test_empty_tag_is_rejected() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(matches!(
            Reconciler::new(&mut storage, ""),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_new_lines_are_inserted() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let stats = reconcile(
            &mut storage,
            &doc("journal/a.md", 5_000),
            "#memory first 2021-06-01\nnothing\n#memory second",
        );

        assert_eq!(stats.inserted, 2);
        let rows = storage.list_rows_by_document("journal/a.md", TAG).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.file_name == "a.md"));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let meta = doc("a.md", 5_000);
        let content = "#memory one\n#memory two 2020-02-02";

        reconcile(&mut storage, &meta, content);
        let before = storage.list_rows(TAG, None, SortDirection::Asc).unwrap();

        let stats = reconcile(&mut storage, &meta, content);
        let after = storage.list_rows(TAG, None, SortDirection::Asc).unwrap();

        assert_eq!(stats.unchanged, 2);
        assert_eq!(stats.changes(), 0);
        assert_eq!(before, after);
    }

    #[test]
    fn test_touched_document_refreshes_timestamps_and_keeps_ids() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        reconcile(&mut storage, &doc("a.md", 5_000), "#memory one");
        let before = storage.list_rows_by_document("a.md", TAG).unwrap().remove(0);

        let stats = reconcile(&mut storage, &doc("a.md", 9_000), "#memory one\nuntagged edit");
        let after = storage.list_rows_by_document("a.md", TAG).unwrap().remove(0);

        assert_eq!(stats.updated, 1);
        assert_eq!(before.id, after.id);
        assert_eq!(before.content, after.content);
        assert_eq!(after.document_modified_at, 9_000);
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.indexed_at, before.indexed_at);
        assert_eq!(after.row_created_at, before.row_created_at);
    }

    #[test]
    fn test_edited_line_replaces_row() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        reconcile(&mut storage, &doc("a.md", 5_000), "#memory keep\n#memory old wording");

        let stats = reconcile(
            &mut storage,
            &doc("a.md", 6_000),
            "#memory keep\n#memory new wording",
        );

        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.removed, 1);
        let contents: HashSet<String> = storage
            .list_rows_by_document("a.md", TAG)
            .unwrap()
            .into_iter()
            .map(|r| r.content)
            .collect();
        assert!(contents.contains("#memory keep"));
        assert!(contents.contains("#memory new wording"));
        assert!(!contents.contains("#memory old wording"));
    }

    #[test]
    fn test_removing_all_tags_deletes_all_rows() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        reconcile(&mut storage, &doc("a.md", 5_000), "#memory one\n#memory two");

        let stats = reconcile(&mut storage, &doc("a.md", 6_000), "one\ntwo");
        assert_eq!(stats.removed, 2);
        assert!(storage.list_rows_by_document("a.md", TAG).unwrap().is_empty());
    }

    #[test]
    fn test_empty_document_deletes_all_rows() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        reconcile(&mut storage, &doc("a.md", 5_000), "#memory one");

        reconcile(&mut storage, &doc("a.md", 6_000), "");
        assert!(storage.list_rows_by_document("a.md", TAG).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_lines_collapse_to_one_row() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let stats = reconcile(
            &mut storage,
            &doc("a.md", 5_000),
            "#memory same line\nother\n#memory same line",
        );

        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(storage.list_rows_by_document("a.md", TAG).unwrap().len(), 1);

        // Second pass over the same text neither adds nor removes
        let again = reconcile(
            &mut storage,
            &doc("a.md", 5_000),
            "#memory same line\nother\n#memory same line",
        );
        assert_eq!(again.changes(), 0);
        assert_eq!(storage.list_rows_by_document("a.md", TAG).unwrap().len(), 1);
    }

    #[test]
    fn test_documents_are_isolated() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        reconcile(&mut storage, &doc("a.md", 5_000), "#memory shared text");
        reconcile(&mut storage, &doc("b.md", 5_000), "#memory shared text");

        reconcile(&mut storage, &doc("a.md", 6_000), "");
        assert!(storage.list_rows_by_document("a.md", TAG).unwrap().is_empty());
        assert_eq!(storage.list_rows_by_document("b.md", TAG).unwrap().len(), 1);
    }

    #[test]
    fn test_rows_of_other_tags_are_left_alone() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let meta = doc("a.md", 5_000);
        let content = "#memory one\n#other two\n#memory #other both";

        reconcile(&mut storage, &meta, content);
        let stats = Reconciler::new(&mut storage, "#other")
            .unwrap()
            .reconcile(&meta, content)
            .unwrap();
        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.removed, 0);

        // The first tag's rows survive a pass under the second
        let again = reconcile(&mut storage, &meta, content);
        assert_eq!(again.unchanged, 2);
        assert_eq!(again.changes(), 0);
        assert_eq!(storage.list_rows_by_document("a.md", TAG).unwrap().len(), 2);
        assert_eq!(storage.list_rows_by_document("a.md", "#other").unwrap().len(), 2);
    }

    #[test]
    fn test_forget_drops_document_rows() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        reconcile(&mut storage, &doc("a.md", 5_000), "#memory one\n#memory two");

        let removed = Reconciler::new(&mut storage, TAG).unwrap().forget("a.md").unwrap();
        assert_eq!(removed, 2);
        assert!(storage.list_rows_by_document("a.md", TAG).unwrap().is_empty());
    }
}
