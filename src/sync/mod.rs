//! Incremental indexing of tagged lines.
//!
//! This module keeps the row store in agreement with a folder of documents:
//!
//! - **Source**: where documents come from ([`DocumentSource`])
//! - **Reconcile**: diff one document's tagged lines against its stored rows
//! - **Driver**: choose a full or incremental pass from the folder's sync
//!   marker, reconcile each candidate, prune vanished documents, and advance
//!   the marker
//!
//! # Example
//!
//! ```ignore
//! use mlane::sync::{FolderSyncDriver, SyncLocks, VaultSource};
//!
//! let source = VaultSource::new("/home/me/notes")?;
//! let locks = SyncLocks::new();
//! let report = FolderSyncDriver::new(&mut storage, &source, &locks, "journal", "#memory")?
//!     .run()?;
//! println!("{} rows added", report.stats.inserted);
//! ```

mod driver;
mod reconcile;
mod source;
mod types;

pub use driver::{FolderSyncDriver, SyncLocks};
pub use reconcile::{Reconciler, tagged_lines};
pub use source::{
    DocumentMeta, DocumentSource, Listing, MemorySource, SkippedEntry, VaultSource, in_folder,
};
pub use types::{FailedDocument, MarkerPolicy, ReconcileStats, SyncMode, SyncReport};
