//! Configuration management.
//!
//! Two layers:
//! - **Database location**: resolved from `--db` / `MLANE_DB`, test mode, or
//!   the global default at `~/.memorylane/data/memorylane.db`.
//! - **Settings** (vault, folder, tag, date format): stored in the database's
//!   `settings` table and overridable per invocation from the command line.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use crate::validate::{normalize_folder_path, validate_date_format, validate_tag};

pub const DEFAULT_FOLDER_PATH: &str = "/";
pub const DEFAULT_TAG: &str = "#memory";
pub const DEFAULT_DATE_FORMAT: &str = "yyyy-MM-dd";

const KEY_VAULT: &str = "vault";
const KEY_FOLDER_PATH: &str = "folder_path";
const KEY_TAG: &str = "tag";
const KEY_DATE_FORMAT: &str = "date_format";

/// Get the global MemoryLane directory location (`~/.memorylane/`).
#[must_use]
pub fn global_data_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".memorylane"))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `MLANE_TEST_DB=1` (or any non-empty value
/// other than `0`/`false`). It redirects the database to an isolated file.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("MLANE_TEST_DB").is_ok_and(|v| is_truthy(&v))
}

fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Get the test database path (`~/.memorylane/test/memorylane.db`).
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_data_dir().map(|dir| dir.join("test").join("memorylane.db"))
}

/// Default database path for the current mode.
#[must_use]
pub fn default_db_path() -> Option<PathBuf> {
    if is_test_mode() {
        return test_db_path();
    }
    global_data_dir().map(|dir| dir.join("data").join("memorylane.db"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. `explicit_path` (the `--db` flag, which also reads `MLANE_DB`)
/// 2. `MLANE_TEST_DB` test database
/// 3. `~/.memorylane/data/memorylane.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }
    default_db_path()
}

/// Open the index database, which must already exist.
///
/// # Errors
///
/// Returns [`Error::NotInitialized`] if the database file is missing.
pub fn open_storage(explicit_path: Option<&Path>) -> Result<SqliteStorage> {
    let db_path = resolve_db_path(explicit_path).ok_or(Error::NotInitialized)?;
    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }
    SqliteStorage::open(&db_path)
}

/// User-facing settings consumed by the indexing core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    /// Root directory of the document vault
    pub vault: Option<PathBuf>,
    pub folder_path: String,
    pub tag: String,
    pub date_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault: None,
            folder_path: DEFAULT_FOLDER_PATH.to_string(),
            tag: DEFAULT_TAG.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// Per-invocation overrides from flags or environment.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub vault: Option<PathBuf>,
    pub folder_path: Option<String>,
    pub tag: Option<String>,
}

/// Result of [`Settings::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettingsChange {
    /// Folder or tag changed, so the index was cleared.
    pub index_cleared: bool,
    pub rows_removed: usize,
}

impl Settings {
    /// Load stored settings, falling back to defaults for unset keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings table cannot be read.
    pub fn load(storage: &SqliteStorage) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            vault: storage.get_setting(KEY_VAULT)?.map(PathBuf::from),
            folder_path: storage
                .get_setting(KEY_FOLDER_PATH)?
                .unwrap_or(defaults.folder_path),
            tag: storage.get_setting(KEY_TAG)?.unwrap_or(defaults.tag),
            date_format: storage
                .get_setting(KEY_DATE_FORMAT)?
                .unwrap_or(defaults.date_format),
        })
    }

    /// Apply overrides on top of stored settings.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is invalid.
    pub fn with_overrides(mut self, overrides: &SettingsOverrides) -> Result<Self> {
        if let Some(vault) = &overrides.vault {
            self.vault = Some(vault.clone());
        }
        if let Some(folder) = &overrides.folder_path {
            self.folder_path = normalize_folder_path(folder)?;
        }
        if let Some(tag) = &overrides.tag {
            self.tag = validate_tag(tag)?;
        }
        Ok(self)
    }

    /// Vault root, or an error if none is configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VaultNotConfigured`] if no vault is set.
    pub fn require_vault(&self) -> Result<&Path> {
        self.vault.as_deref().ok_or(Error::VaultNotConfigured)
    }

    /// Persist these settings.
    ///
    /// Rows and markers indexed for a different folder or tag no longer
    /// describe the new configuration, so changing either clears the index.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is invalid or the write fails.
    pub fn save(&self, storage: &mut SqliteStorage) -> Result<SettingsChange> {
        let folder_path = normalize_folder_path(&self.folder_path)?;
        let tag = validate_tag(&self.tag)?;
        validate_date_format(&self.date_format)?;

        let previous = Self::load(storage)?;
        let scope_changed = previous.folder_path != folder_path || previous.tag != tag;

        match &self.vault {
            Some(vault) => storage.set_setting(KEY_VAULT, &vault.to_string_lossy())?,
            None => storage.delete_setting(KEY_VAULT)?,
        }
        storage.set_setting(KEY_FOLDER_PATH, &folder_path)?;
        storage.set_setting(KEY_TAG, &tag)?;
        storage.set_setting(KEY_DATE_FORMAT, &self.date_format)?;

        if !scope_changed {
            return Ok(SettingsChange {
                index_cleared: false,
                rows_removed: 0,
            });
        }

        let cleared = storage.clear_index()?;
        tracing::info!(
            folder = %folder_path,
            tag = %tag,
            rows = cleared.rows,
            markers = cleared.markers,
            "Settings changed, index cleared"
        );
        Ok(SettingsChange {
            index_cleared: true,
            rows_removed: cleared.rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Row, SyncMarker};

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/index.db");
        let result = resolve_db_path(Some(&explicit));
        assert_eq!(result, Some(explicit));
    }

    #[test]
    fn test_resolve_db_path_default_is_global() {
        let path = resolve_db_path(None).unwrap();
        assert!(path.ends_with("memorylane.db"));
    }

    #[test]
    fn test_test_db_path_is_separate() {
        let global = global_data_dir().unwrap();
        let test = test_db_path().unwrap();
        assert!(test.to_string_lossy().contains("test"));
        assert_ne!(global.join("data").join("memorylane.db"), test);
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(""));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("FALSE"));
        assert!(is_truthy("1"));
        assert!(is_truthy("yes"));
    }

    #[test]
    fn test_open_storage_missing_file_is_not_initialized() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("absent.db");
        assert!(matches!(
            open_storage(Some(&missing)),
            Err(Error::NotInitialized)
        ));
    }

    #[test]
    fn test_settings_defaults_when_unset() {
        let storage = SqliteStorage::open_memory().unwrap();
        let settings = Settings::load(&storage).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(matches!(settings.require_vault(), Err(Error::VaultNotConfigured)));
    }

    #[test]
    fn test_settings_round_trip_without_scope_change() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let settings = Settings {
            vault: Some(PathBuf::from("/notes")),
            date_format: "dd/MM/yyyy".to_string(),
            ..Settings::default()
        };

        let change = settings.save(&mut storage).unwrap();
        assert!(!change.index_cleared);
        assert_eq!(Settings::load(&storage).unwrap(), settings);
    }

    #[test]
    fn test_changing_tag_clears_index() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .upsert_row(&Row::observe("a.md", "#memory", "#memory one", 0, 10, 10))
            .unwrap();
        storage
            .put_sync_marker(&SyncMarker::new("/", "#memory", 10))
            .unwrap();

        let settings = Settings {
            tag: "#recall".to_string(),
            ..Settings::default()
        };
        let change = settings.save(&mut storage).unwrap();

        assert!(change.index_cleared);
        assert_eq!(change.rows_removed, 1);
        let counts = storage.index_counts().unwrap();
        assert_eq!(counts.rows, 0);
        assert_eq!(counts.markers, 0);
    }

    #[test]
    fn test_overrides_are_validated() {
        let base = Settings::default();
        let overrides = SettingsOverrides {
            tag: Some(String::new()),
            ..SettingsOverrides::default()
        };
        assert!(base.clone().with_overrides(&overrides).is_err());

        let overrides = SettingsOverrides {
            folder_path: Some(" journal ".to_string()),
            ..SettingsOverrides::default()
        };
        let applied = base.with_overrides(&overrides).unwrap();
        assert_eq!(applied.folder_path, "journal");
    }
}
