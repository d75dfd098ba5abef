//! Command implementations.

pub mod completions;
pub mod config;
pub mod init;
pub mod query;
pub mod status;
pub mod sync;
pub mod version;

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;

use crate::config::{Settings, SettingsOverrides, open_storage};
use crate::error::Result;
use crate::model::Row;
use crate::query::{Timeline, format_timestamp};
use crate::storage::SqliteStorage;
use crate::sync::{SyncLocks, VaultSource};

/// Open the store and load effective settings.
pub(crate) fn open_with_settings(
    db_path: Option<&PathBuf>,
    overrides: &SettingsOverrides,
) -> Result<(SqliteStorage, Settings)> {
    let storage = open_storage(db_path.map(PathBuf::as_path))?;
    let settings = Settings::load(&storage)?.with_overrides(overrides)?;
    Ok((storage, settings))
}

/// Build a timeline over the configured vault.
pub(crate) fn open_timeline(
    db_path: Option<&PathBuf>,
    overrides: &SettingsOverrides,
) -> Result<(Timeline<VaultSource>, Settings)> {
    let (storage, settings) = open_with_settings(db_path, overrides)?;
    let source = VaultSource::new(settings.require_vault()?)?;
    let timeline = Timeline::new(
        storage,
        source,
        &settings.folder_path,
        &settings.tag,
        Arc::new(SyncLocks::new()),
    );
    Ok((timeline, settings))
}

#[derive(Serialize)]
struct RowsOutput<'a> {
    rows: &'a [Row],
    count: usize,
}

/// Print rows as JSON or one line each.
pub(crate) fn print_rows(rows: &[Row], date_format: &str, json: bool) -> Result<()> {
    if json {
        let output = RowsOutput {
            rows,
            count: rows.len(),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No rows found.");
        return Ok(());
    }

    for row in rows {
        println!(
            "{}  {}  {}",
            format_timestamp(row.row_created_at, date_format).cyan(),
            row.content.trim(),
            format!("({})", row.file_name).dimmed()
        );
    }
    Ok(())
}
