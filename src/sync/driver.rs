//! Folder sync driver.
//!
//! A pass looks up the `(folder, tag)` marker to pick its scope:
//!
//! - no marker (or a forced pass): every document in the folder
//! - marker present: documents modified at or after the marker
//!
//! Each candidate is read and reconciled on its own. A document that fails
//! is logged and skipped; the rest of the batch still runs. Documents that
//! vanished from the folder have their rows pruned, and the marker is then
//! written according to the [`MarkerPolicy`].
//!
//! A directory that cannot be listed does not stop the pass. Rows below it
//! are kept and the marker stays where it was until it lists again.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::model::SyncMarker;
use crate::storage::SqliteStorage;
use crate::sync::reconcile::Reconciler;
use crate::sync::source::{DocumentMeta, DocumentSource, Listing, in_folder};
use crate::sync::types::{FailedDocument, MarkerPolicy, ReconcileStats, SyncMode, SyncReport};

type LockKey = (String, String);

/// Registry of per `(folder, tag)` locks.
///
/// Passes over the same folder and tag are serialized; passes over different
/// pairs run independently. Share one registry (behind an [`Arc`]) between
/// every driver that may touch the same store.
#[derive(Debug, Default)]
pub struct SyncLocks {
    locks: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl SyncLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, folder_path: &str, tag: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry((folder_path.to_string(), tag.to_string()))
                .or_default(),
        )
    }
}

/// Drives one reconciliation pass over a folder.
pub struct FolderSyncDriver<'a, S: DocumentSource> {
    storage: &'a mut SqliteStorage,
    source: &'a S,
    locks: &'a SyncLocks,
    folder_path: &'a str,
    tag: &'a str,
    policy: MarkerPolicy,
    force_full: bool,
}

impl<'a, S: DocumentSource> FolderSyncDriver<'a, S> {
    /// Create a driver for `folder_path` and `tag`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is empty.
    pub fn new(
        storage: &'a mut SqliteStorage,
        source: &'a S,
        locks: &'a SyncLocks,
        folder_path: &'a str,
        tag: &'a str,
    ) -> Result<Self> {
        if tag.is_empty() {
            return Err(Error::InvalidArgument("tag must not be empty".to_string()));
        }
        Ok(Self {
            storage,
            source,
            locks,
            folder_path,
            tag,
            policy: MarkerPolicy::default(),
            force_full: false,
        })
    }

    #[must_use]
    pub fn with_policy(mut self, policy: MarkerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Ignore any existing marker and scan the whole folder.
    #[must_use]
    pub fn force_full(mut self, force: bool) -> Self {
        self.force_full = force;
        self
    }

    /// Run a pass starting now.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the folder cannot be listed.
    /// Per-document failures are reported in [`SyncReport::failed`] instead.
    pub fn run(self) -> Result<SyncReport> {
        self.run_at(chrono::Utc::now().timestamp_millis())
    }

    /// Run a pass that started at `started_at` (Unix ms).
    ///
    /// # Errors
    ///
    /// See [`FolderSyncDriver::run`].
    pub fn run_at(mut self, started_at: i64) -> Result<SyncReport> {
        let lock = self.locks.handle(self.folder_path, self.tag);
        let _guard: MutexGuard<'_, ()> = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let marker = self.storage.get_sync_marker(self.folder_path, self.tag)?;
        let (mode, listing) = match (&marker, self.force_full) {
            (Some(marker), false) => (
                SyncMode::Incremental,
                self.source
                    .list_documents_modified_since(self.folder_path, marker.last_synced_at)?,
            ),
            _ => (
                SyncMode::Full,
                self.source.list_documents(self.folder_path)?,
            ),
        };

        let Listing {
            documents: candidates,
            skipped,
        } = listing;

        tracing::info!(
            folder = %self.folder_path,
            tag = %self.tag,
            %mode,
            candidates = candidates.len(),
            skipped = skipped.len(),
            "Starting sync pass"
        );

        let mut report = SyncReport::new(mode, self.folder_path, self.tag, started_at);
        report.candidates = candidates.len();
        report.note_skipped(skipped);

        let mut reconciler = Reconciler::new(self.storage, self.tag)?;
        for document in &candidates {
            match reconcile_one(&mut reconciler, self.source, document) {
                Ok(stats) => {
                    report.reconciled += 1;
                    report.stats.absorb(stats);
                }
                Err(e) => {
                    tracing::warn!(path = %document.path, error = %e, "Skipping document");
                    report.failed.push(FailedDocument {
                        path: document.path.clone(),
                        modified_at: document.modified_at,
                        error: e.to_string(),
                    });
                }
            }
        }

        self.prune_vanished(&mut report)?;

        let existing = marker.map(|m| m.last_synced_at);
        if let Some(last_synced_at) = next_marker(self.policy, existing, &report) {
            self.storage
                .put_sync_marker(&SyncMarker::new(self.folder_path, self.tag, last_synced_at))?;
            report.marker_written = Some(last_synced_at);
        }

        tracing::info!(
            folder = %self.folder_path,
            reconciled = report.reconciled,
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            inserted = report.stats.inserted,
            removed = report.stats.removed,
            pruned = report.pruned_rows,
            "Sync pass finished"
        );

        Ok(report)
    }

    /// Drop this tag's rows for documents in the folder that the source no
    /// longer lists.
    fn prune_vanished(&mut self, report: &mut SyncReport) -> Result<()> {
        let listing = self.source.list_documents(self.folder_path)?;
        let listed: HashSet<&str> = listing
            .documents
            .iter()
            .map(|doc| doc.path.as_str())
            .collect();

        for path in self.storage.list_document_paths(self.tag)? {
            if !in_folder(self.folder_path, &path)
                || listed.contains(path.as_str())
                || listing.is_unaccounted(&path)
            {
                continue;
            }
            let removed = self.storage.remove_rows_for_document(&path, self.tag)?;
            tracing::debug!(path = %path, removed, "Pruned vanished document");
            report.pruned_documents += 1;
            report.pruned_rows += removed;
        }

        report.note_skipped(listing.skipped);
        Ok(())
    }
}

fn reconcile_one<S: DocumentSource>(
    reconciler: &mut Reconciler<'_>,
    source: &S,
    document: &DocumentMeta,
) -> Result<ReconcileStats> {
    let content = source.read_content(&document.path)?;
    reconciler.reconcile(document, &content)
}

/// Marker value to write at the end of a pass, if any.
///
/// The marker never moves past a document that failed, so the next
/// incremental pass picks it up again. After an incomplete listing it is
/// left alone: documents that could not be seen have no mtime to hold it at.
fn next_marker(policy: MarkerPolicy, existing: Option<i64>, report: &SyncReport) -> Option<i64> {
    if !report.skipped.is_empty() {
        return None;
    }
    if policy == MarkerPolicy::WriteOnce && existing.is_some() {
        return None;
    }
    let value = report
        .failed
        .iter()
        .map(|f| f.modified_at)
        .fold(report.started_at, i64::min);
    Some(value)
}
