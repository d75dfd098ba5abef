//! Document sources.
//!
//! A [`DocumentSource`] lists the documents under a folder and reads their
//! text on demand. [`VaultSource`] walks a directory of notes on disk;
//! [`MemorySource`] holds documents in memory for in-process callers and tests.
//!
//! A listing may be partial: entries that cannot be enumerated are reported
//! in [`Listing::skipped`] and the walk carries on.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};

/// File extensions treated as text documents by [`VaultSource`].
const DOCUMENT_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];

/// Metadata for one document, as listed by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    /// `/`-separated path relative to the source root
    pub path: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Modification timestamp (Unix ms)
    pub modified_at: i64,
}

/// An entry below the source root that could not be enumerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    /// `/`-separated path relative to the source root
    pub path: String,
    pub error: String,
}

/// Documents found in a folder, plus whatever could not be listed.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub documents: Vec<DocumentMeta>,
    pub skipped: Vec<SkippedEntry>,
}

impl Listing {
    /// Whether every entry under the folder was enumerated.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Keep only the documents in `folder_path`, and the skipped entries
    /// that could have held some.
    fn scope_to(mut self, folder_path: &str) -> Self {
        self.documents.retain(|doc| in_folder(folder_path, &doc.path));
        self.skipped
            .retain(|entry| may_hold_members(folder_path, &entry.path));
        self
    }

    /// Whether `path` is, or may lie below, a skipped entry.
    ///
    /// Such a document is unaccounted for rather than gone.
    #[must_use]
    pub fn is_unaccounted(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        self.skipped.iter().any(|entry| {
            path.strip_prefix(entry.path.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

/// Supplier of documents for a sync pass.
pub trait DocumentSource {
    /// Every document in `folder_path` (see [`in_folder`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be enumerated at all.
    /// Entries below it that fail are reported in [`Listing::skipped`].
    fn list_documents(&self, folder_path: &str) -> Result<Listing>;

    /// Documents in `folder_path` modified at or after `since` (Unix ms).
    ///
    /// # Errors
    ///
    /// See [`DocumentSource::list_documents`].
    fn list_documents_modified_since(&self, folder_path: &str, since: i64) -> Result<Listing> {
        let mut listing = self.list_documents(folder_path)?;
        listing.documents.retain(|doc| doc.modified_at >= since);
        Ok(listing)
    }

    /// Full text of a listed document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DocumentRead`] if the document cannot be read as text.
    fn read_content(&self, path: &str) -> Result<String>;
}

/// Whether `path` belongs to `folder_path`.
///
/// The root folder `/` holds only documents without a path separator. Any
/// other folder is a literal prefix of the document path; a leading `/` is
/// ignored on both sides.
#[must_use]
pub fn in_folder(folder_path: &str, path: &str) -> bool {
    let path = path.trim_start_matches('/');
    if folder_path == "/" {
        return !path.contains('/');
    }
    path.starts_with(folder_path.trim_start_matches('/'))
}

/// Whether an unlisted directory could contain documents of `folder_path`.
///
/// The root folder only holds top-level documents, so no subdirectory can.
fn may_hold_members(folder_path: &str, dir: &str) -> bool {
    if folder_path == "/" {
        return false;
    }
    let folder = folder_path.trim_start_matches('/');
    let dir = dir.trim_start_matches('/');
    dir.starts_with(folder) || folder.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
}

// ==================
// VaultSource
// ==================

/// Documents stored as text files under a directory.
///
/// Hidden files and directories (names starting with `.`) are skipped, as
/// are files without a known text extension. Unreadable subdirectories are
/// logged and reported as skipped entries.
#[derive(Debug, Clone)]
pub struct VaultSource {
    root: PathBuf,
}

impl VaultSource {
    /// Open a vault rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `root` is not a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::Config(format!(
                "Vault is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(&self) -> Result<Listing> {
        let mut listing = Listing::default();
        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                // The vault root itself must be listable
                Err(e) if e.depth() == 0 => return Err(std::io::Error::from(e).into()),
                Err(e) => {
                    let path = e
                        .path()
                        .and_then(|p| self.relative_path(p).ok())
                        .unwrap_or_default();
                    tracing::warn!(path = %path, error = %e, "Skipping unreadable vault entry");
                    listing.skipped.push(SkippedEntry {
                        path,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file() || !has_document_extension(entry.path()) {
                continue;
            }
            match self.describe(entry.path()) {
                Ok(meta) => listing.documents.push(meta),
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Skipping unreadable document metadata");
                }
            }
        }

        listing.documents.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(listing)
    }

    fn describe(&self, path: &Path) -> Result<DocumentMeta> {
        let metadata = fs::metadata(path)?;
        let modified_at = metadata.modified().map(system_time_millis)?;
        // Not every filesystem records a birth time
        let created_at = metadata
            .created()
            .map(system_time_millis)
            .unwrap_or(modified_at);

        Ok(DocumentMeta {
            path: self.relative_path(path)?,
            created_at,
            modified_at,
        })
    }

    fn relative_path(&self, path: &Path) -> Result<String> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|e| Error::Other(format!("Path outside vault: {e}")))?;
        let parts = relative
            .components()
            .map(|c| {
                c.as_os_str()
                    .to_str()
                    .ok_or_else(|| Error::Other(format!("Non UTF-8 path: {}", path.display())))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join("/"))
    }
}

impl DocumentSource for VaultSource {
    fn list_documents(&self, folder_path: &str) -> Result<Listing> {
        Ok(self.walk()?.scope_to(folder_path))
    }

    fn read_content(&self, path: &str) -> Result<String> {
        let full = self.root.join(path.trim_start_matches('/'));
        let bytes = fs::read(&full).map_err(|e| Error::DocumentRead {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        String::from_utf8(bytes).map_err(|e| Error::DocumentRead {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn has_document_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            DOCUMENT_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

fn system_time_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_millis()).ok())
        .unwrap_or(0)
}

// ==================
// MemorySource
// ==================

#[derive(Debug, Clone)]
struct MemoryDocument {
    content: Option<String>,
    created_at: i64,
    modified_at: i64,
}

/// Documents held in memory, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: BTreeMap<String, MemoryDocument>,
    unlistable: BTreeSet<String>,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a document.
    pub fn insert(&mut self, path: &str, content: &str, created_at: i64, modified_at: i64) {
        self.documents.insert(
            path.to_string(),
            MemoryDocument {
                content: Some(content.to_string()),
                created_at,
                modified_at,
            },
        );
    }

    /// Add a document that is listed but cannot be read.
    pub fn insert_unreadable(&mut self, path: &str, modified_at: i64) {
        self.documents.insert(
            path.to_string(),
            MemoryDocument {
                content: None,
                created_at: modified_at,
                modified_at,
            },
        );
    }

    /// Remove a document. Returns whether it existed.
    pub fn remove(&mut self, path: &str) -> bool {
        self.documents.remove(path).is_some()
    }

    /// Make a directory fail to list, hiding every document below it.
    pub fn set_unlistable(&mut self, dir: &str, unlistable: bool) {
        if unlistable {
            self.unlistable.insert(dir.to_string());
        } else {
            self.unlistable.remove(dir);
        }
    }
}

impl DocumentSource for MemorySource {
    fn list_documents(&self, folder_path: &str) -> Result<Listing> {
        let skipped: Vec<SkippedEntry> = self
            .unlistable
            .iter()
            .map(|dir| SkippedEntry {
                path: dir.clone(),
                error: "directory not listable".to_string(),
            })
            .collect();
        let hidden = Listing {
            documents: Vec::new(),
            skipped,
        };

        let documents = self
            .documents
            .iter()
            .filter(|(path, _)| !hidden.is_unaccounted(path))
            .map(|(path, doc)| DocumentMeta {
                path: path.clone(),
                created_at: doc.created_at,
                modified_at: doc.modified_at,
            })
            .collect();

        Ok(Listing {
            documents,
            skipped: hidden.skipped,
        }
        .scope_to(folder_path))
    }

    fn read_content(&self, path: &str) -> Result<String> {
        self.documents
            .get(path)
            .and_then(|doc| doc.content.clone())
            .ok_or_else(|| Error::DocumentRead {
                path: path.to_string(),
                message: "document not readable".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_folder_root_means_top_level_only() {
        assert!(in_folder("/", "today.md"));
        assert!(!in_folder("/", "journal/today.md"));
    }

    #[test]
    fn test_in_folder_prefix() {
        assert!(in_folder("/journal", "journal/2024/a.md"));
        assert!(in_folder("journal", "journal/a.md"));
        assert!(in_folder("/journal", "/journal/a.md"));
        assert!(!in_folder("/journal", "notes/a.md"));
    }

    #[test]
    fn test_memory_source_modified_since() {
        let mut source = MemorySource::new();
        source.insert("journal/old.md", "#m old", 0, 100);
        source.insert("journal/new.md", "#m new", 0, 200);
        source.insert("other/new.md", "#m other", 0, 300);

        let listing = source.list_documents_modified_since("/journal", 200).unwrap();
        let paths: Vec<&str> = listing.documents.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["journal/new.md"]);
    }

    #[test]
    fn test_memory_source_unreadable() {
        let mut source = MemorySource::new();
        source.insert_unreadable("broken.md", 5);
        assert_eq!(source.list_documents("/").unwrap().documents.len(), 1);
        assert!(matches!(
            source.read_content("broken.md"),
            Err(Error::DocumentRead { .. })
        ));
    }

    #[test]
    fn test_vault_source_walks_text_documents() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("journal/2024")).unwrap();
        fs::create_dir_all(root.join(".obsidian")).unwrap();
        fs::write(root.join("top.md"), "#m top").unwrap();
        fs::write(root.join("journal/a.md"), "#m a").unwrap();
        fs::write(root.join("journal/2024/b.txt"), "#m b").unwrap();
        fs::write(root.join("journal/image.png"), [0u8, 159, 146, 150]).unwrap();
        fs::write(root.join(".obsidian/workspace.md"), "#m hidden").unwrap();

        let source = VaultSource::new(root).unwrap();

        let all: Vec<String> = source
            .list_documents("journal")
            .unwrap()
            .documents
            .into_iter()
            .map(|d| d.path)
            .collect();
        assert_eq!(all, vec!["journal/2024/b.txt", "journal/a.md"]);

        let top: Vec<String> = source
            .list_documents("/")
            .unwrap()
            .documents
            .into_iter()
            .map(|d| d.path)
            .collect();
        assert_eq!(top, vec!["top.md"]);

        assert_eq!(source.read_content("journal/a.md").unwrap(), "#m a");
    }

    #[test]
    fn test_unaccounted_paths_follow_skipped_directories() {
        let listing = Listing {
            documents: Vec::new(),
            skipped: vec![SkippedEntry {
                path: "journal/2024".to_string(),
                error: "denied".to_string(),
            }],
        };
        assert!(listing.is_unaccounted("journal/2024/a.md"));
        assert!(listing.is_unaccounted("/journal/2024/deep/b.md"));
        assert!(!listing.is_unaccounted("journal/2024b/a.md"));
        assert!(!listing.is_unaccounted("journal/a.md"));
        assert!(!listing.is_complete());
    }

    #[test]
    fn test_skipped_entries_are_scoped_to_the_folder() {
        assert!(may_hold_members("journal", "journal/2024"));
        assert!(may_hold_members("/journal/2024", "journal"));
        assert!(!may_hold_members("journal", "notes"));
        assert!(!may_hold_members("/", "journal"));
    }

    #[test]
    fn test_memory_source_unlistable_directory() {
        let mut source = MemorySource::new();
        source.insert("journal/a.md", "#m a", 0, 1);
        source.insert("journal/locked/b.md", "#m b", 0, 1);
        source.set_unlistable("journal/locked", true);

        let listing = source.list_documents("journal").unwrap();
        assert_eq!(listing.documents.len(), 1);
        assert_eq!(listing.skipped[0].path, "journal/locked");
        assert!(source.list_documents("/").unwrap().is_complete());

        source.set_unlistable("journal/locked", false);
        assert_eq!(source.list_documents("journal").unwrap().documents.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_vault_source_skips_unreadable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("journal/locked")).unwrap();
        fs::write(root.join("journal/a.md"), "#m a").unwrap();
        fs::write(root.join("journal/locked/b.md"), "#m b").unwrap();

        let locked = root.join("journal/locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // Privileged users read through the mode bits
        let readable = fs::read_dir(&locked).is_ok();

        let listing = VaultSource::new(root)
            .unwrap()
            .list_documents("journal")
            .unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if readable {
            assert_eq!(listing.documents.len(), 2);
            return;
        }
        let paths: Vec<&str> = listing.documents.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["journal/a.md"]);
        assert_eq!(listing.skipped.len(), 1);
        assert_eq!(listing.skipped[0].path, "journal/locked");
        assert!(listing.is_unaccounted("journal/locked/b.md"));
    }

    #[test]
    fn test_vault_source_rejects_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.md"), [0xffu8, 0xfe, 0x00]).unwrap();

        let source = VaultSource::new(dir.path()).unwrap();
        assert!(matches!(
            source.read_content("bad.md"),
            Err(Error::DocumentRead { .. })
        ));
    }

    #[test]
    fn test_vault_source_requires_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(VaultSource::new(missing), Err(Error::Config(_))));
    }
}
