//! Create the MemoryLane index database.
//!
//! Settings passed with `--vault`, `--folder` or `--tag` are stored in the
//! new database, so later commands need no flags.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{Settings, SettingsOverrides, resolve_db_path};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    settings: Settings,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if the database exists and `force` is not set, or if
/// the directory or database cannot be created.
pub fn execute(
    force: bool,
    db_path: Option<&PathBuf>,
    overrides: &SettingsOverrides,
    json: bool,
) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path)).ok_or_else(|| {
        Error::Config("Could not determine the MemoryLane data directory".to_string())
    })?;

    if db_path.exists() {
        if !force {
            return Err(Error::AlreadyInitialized { path: db_path });
        }
        remove_database(&db_path)?;
    }

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut storage = SqliteStorage::open(&db_path)?;
    let settings = Settings::default().with_overrides(overrides)?;
    if let Some(vault) = &settings.vault {
        if !vault.is_dir() {
            return Err(Error::Config(format!(
                "Vault is not a directory: {}",
                vault.display()
            )));
        }
    }
    settings.save(&mut storage)?;

    tracing::info!(path = %db_path.display(), "Initialized index database");

    if json {
        let output = InitOutput {
            database: db_path,
            settings,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized MemoryLane index");
        println!("  Database: {}", db_path.display());
        println!("  Folder:   {}", settings.folder_path);
        println!("  Tag:      {}", settings.tag);
        match &settings.vault {
            Some(vault) => println!("  Vault:    {}", vault.display()),
            None => {
                println!();
                println!("Next: mlane config set vault <dir>");
            }
        }
    }

    Ok(())
}

/// Remove a database file and its WAL side files.
fn remove_database(db_path: &Path) -> Result<()> {
    fs::remove_file(db_path)?;
    for suffix in ["-wal", "-shm"] {
        let mut side = db_path.as_os_str().to_owned();
        side.push(suffix);
        let side = PathBuf::from(side);
        if side.exists() {
            fs::remove_file(side)?;
        }
    }
    Ok(())
}
