//! Sync types: pass modes, marker policy, and pass statistics.

use serde::Serialize;

use crate::sync::source::SkippedEntry;

/// Scope of a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Every document in the folder (no marker, or forced).
    Full,
    /// Only documents modified at or after the marker.
    Incremental,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Incremental => write!(f, "incremental"),
        }
    }
}

/// When the folder's sync marker is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerPolicy {
    /// Advance the marker at the end of every pass, full or incremental.
    #[default]
    RefreshEveryPass,
    /// Write the marker on the first pass only; later passes keep comparing
    /// against that first timestamp.
    WriteOnce,
}

impl std::str::FromStr for MarkerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "refresh" | "refresh_every_pass" => Ok(Self::RefreshEveryPass),
            "write-once" | "write_once" => Ok(Self::WriteOnce),
            _ => Err(format!("Unknown marker policy: {s}")),
        }
    }
}

/// Row changes produced by reconciling documents.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Tagged lines seen for the first time.
    pub inserted: usize,
    /// Existing rows whose document timestamps were refreshed.
    pub updated: usize,
    /// Existing rows left as they were.
    pub unchanged: usize,
    /// Rows whose line no longer appears in the document.
    pub removed: usize,
    /// Repeated tagged lines collapsed into an existing row.
    pub duplicates: usize,
}

impl ReconcileStats {
    /// Add another document's counts to this one.
    pub fn absorb(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.removed += other.removed;
        self.duplicates += other.duplicates;
    }

    /// Number of row writes (inserts, updates and removals).
    #[must_use]
    pub fn changes(&self) -> usize {
        self.inserted + self.updated + self.removed
    }
}

/// A document skipped during a pass.
#[derive(Debug, Clone, Serialize)]
pub struct FailedDocument {
    pub path: String,
    pub modified_at: i64,
    pub error: String,
}

/// Outcome of one folder sync pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub folder_path: String,
    pub tag: String,
    /// Wall-clock start of the pass (Unix ms).
    pub started_at: i64,
    /// Documents selected for reconciliation.
    pub candidates: usize,
    /// Documents reconciled successfully.
    pub reconciled: usize,
    /// Documents skipped because they could not be read or reconciled.
    pub failed: Vec<FailedDocument>,
    /// Entries under the folder that could not be listed.
    pub skipped: Vec<SkippedEntry>,
    /// Documents no longer present whose rows were dropped.
    pub pruned_documents: usize,
    /// Rows dropped along with vanished documents.
    pub pruned_rows: usize,
    pub stats: ReconcileStats,
    /// Marker timestamp written at the end of the pass, if any.
    pub marker_written: Option<i64>,
}

impl SyncReport {
    #[must_use]
    pub fn new(mode: SyncMode, folder_path: &str, tag: &str, started_at: i64) -> Self {
        Self {
            mode,
            folder_path: folder_path.to_string(),
            tag: tag.to_string(),
            started_at,
            candidates: 0,
            reconciled: 0,
            failed: Vec::new(),
            skipped: Vec::new(),
            pruned_documents: 0,
            pruned_rows: 0,
            stats: ReconcileStats::default(),
            marker_written: None,
        }
    }

    /// Returns true if the folder listed completely and every candidate was
    /// reconciled.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    /// Record skipped entries, ignoring paths already reported.
    pub fn note_skipped(&mut self, entries: Vec<SkippedEntry>) {
        for entry in entries {
            if !self.skipped.iter().any(|known| known.path == entry.path) {
                self.skipped.push(entry);
            }
        }
    }
}
