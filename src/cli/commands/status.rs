//! Status command implementation.

use std::path::PathBuf;

use serde::Serialize;

use crate::config::{Settings, SettingsOverrides, resolve_db_path};
use crate::error::{Error, Result};
use crate::model::SyncMarker;
use crate::query::format_timestamp;
use crate::storage::{IndexCounts, SqliteStorage};

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    database: PathBuf,
    settings: Settings,
    counts: IndexCounts,
    markers: Vec<SyncMarker>,
}

/// Execute status command.
///
/// # Errors
///
/// Returns [`Error::NotInitialized`] if the database does not exist.
pub fn execute(db_path: Option<&PathBuf>, overrides: &SettingsOverrides, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path)).ok_or(Error::NotInitialized)?;

    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }

    let storage = SqliteStorage::open(&db_path)?;
    let settings = Settings::load(&storage)?.with_overrides(overrides)?;
    let counts = storage.index_counts()?;
    let markers = storage.list_sync_markers()?;

    if json {
        let output = StatusOutput {
            database: db_path,
            settings,
            counts,
            markers,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("MemoryLane Status");
    println!("=================");
    println!();
    println!("Database: {}", db_path.display());
    match &settings.vault {
        Some(vault) => println!("Vault:    {}", vault.display()),
        None => println!("Vault:    (not set)"),
    }
    println!("Folder:   {}", settings.folder_path);
    println!("Tag:      {}", settings.tag);
    println!();
    println!("Rows:      {}", counts.rows);
    println!("Documents: {}", counts.documents);

    if markers.is_empty() {
        println!();
        println!("Never synced. Run: mlane sync");
    } else {
        println!();
        println!("Sync markers:");
        for marker in &markers {
            println!(
                "  {} {}  last synced {}",
                marker.folder_path,
                marker.tag,
                format_timestamp(marker.last_synced_at, "yyyy-MM-dd HH:mm:ss")
            );
        }
    }

    Ok(())
}
