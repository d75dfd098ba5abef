//! Config command implementations.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::config::{Settings, SettingsChange, SettingsOverrides, open_storage};
use crate::error::{Error, Result};
use crate::validate::normalize_setting_key;

#[derive(Serialize)]
struct ConfigSetOutput {
    key: String,
    value: String,
    #[serde(flatten)]
    change: SettingsChange,
}

/// Execute config commands.
///
/// # Errors
///
/// Returns an error if the store is unavailable or a value is invalid.
pub fn execute(
    command: &ConfigCommands,
    db_path: Option<&PathBuf>,
    overrides: &SettingsOverrides,
    json: bool,
) -> Result<()> {
    match command {
        ConfigCommands::Show => show(db_path, overrides, json),
        ConfigCommands::Set { key, value } => set(key, value, db_path, json),
    }
}

fn show(db_path: Option<&PathBuf>, overrides: &SettingsOverrides, json: bool) -> Result<()> {
    let storage = open_storage(db_path.map(PathBuf::as_path))?;
    let settings = Settings::load(&storage)?.with_overrides(overrides)?;

    if json {
        println!("{}", serde_json::to_string(&settings)?);
        return Ok(());
    }

    let vault = settings
        .vault
        .as_ref()
        .map_or_else(|| "(not set)".to_string(), |v| v.display().to_string());
    println!("vault        {vault}");
    println!("folder_path  {}", settings.folder_path);
    println!("tag          {}", settings.tag);
    println!("date_format  {}", settings.date_format);
    Ok(())
}

fn set(key: &str, value: &str, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let key = normalize_setting_key(key).map_err(|(input, suggestion)| {
        Error::InvalidArgument(match suggestion {
            Some(s) => format!("Unknown setting '{input}'. Did you mean '{s}'?"),
            None => format!("Unknown setting '{input}'"),
        })
    })?;

    let mut storage = open_storage(db_path.map(PathBuf::as_path))?;
    let mut settings = Settings::load(&storage)?;

    match key.as_str() {
        "vault" => {
            let path = PathBuf::from(value);
            if !path.is_dir() {
                return Err(Error::Config(format!(
                    "Vault is not a directory: {}",
                    path.display()
                )));
            }
            settings.vault = Some(path.canonicalize()?);
        }
        "folder_path" => settings.folder_path = value.to_string(),
        "tag" => settings.tag = value.to_string(),
        "date_format" => settings.date_format = value.to_string(),
        other => return Err(Error::InvalidArgument(format!("Unknown setting '{other}'"))),
    }

    let change = settings.save(&mut storage)?;

    if json {
        let output = ConfigSetOutput {
            key,
            value: value.to_string(),
            change,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Set {key} = {value}");
        if change.index_cleared {
            println!(
                "Index cleared ({} rows); the next sync rescans the folder.",
                change.rows_removed
            );
        }
    }

    Ok(())
}
