//! Read commands: list, search, today.

use std::path::PathBuf;

use chrono::Local;
use serde::Serialize;

use crate::config::SettingsOverrides;
use crate::error::Result;
use crate::model::{SortDirection, day_key};
use crate::query::{YearGroup, group_by_year, render_markdown, render_text, sort_groups};
use crate::validate::parse_date_arg;

use super::{open_timeline, print_rows};

#[derive(Serialize)]
struct TimelineOutput {
    date: String,
    day_key: String,
    years: Vec<YearGroup>,
    count: usize,
}

/// Sync the folder, then list every row.
///
/// # Errors
///
/// Returns an error if the store is unavailable, no vault is configured, or
/// the sync pass fails.
pub fn list(
    asc: bool,
    markdown: bool,
    db_path: Option<&PathBuf>,
    overrides: &SettingsOverrides,
    json: bool,
) -> Result<()> {
    let (mut timeline, settings) = open_timeline(db_path, overrides)?;
    let rows = if asc {
        timeline.browse(SortDirection::Asc)?
    } else {
        timeline.browse_all()?
    };

    if markdown && !json {
        let groups = sort_groups(group_by_year(rows));
        print!("{}", render_markdown(&groups, &settings.date_format));
        return Ok(());
    }

    print_rows(&rows, &settings.date_format, json)
}

/// Case-insensitive substring search over indexed rows.
///
/// Does not sync; run `mlane sync` or `mlane list` to refresh the index.
///
/// # Errors
///
/// Returns an error if the store is unavailable or no vault is configured.
pub fn search(
    text: &str,
    db_path: Option<&PathBuf>,
    overrides: &SettingsOverrides,
    json: bool,
) -> Result<()> {
    let (timeline, settings) = open_timeline(db_path, overrides)?;
    let rows = timeline.search(text)?;
    print_rows(&rows, &settings.date_format, json)
}

/// Rows from every year that share a month and day.
///
/// # Errors
///
/// Returns an error if the date is invalid or the store is unavailable.
pub fn today(
    date: Option<&str>,
    db_path: Option<&PathBuf>,
    overrides: &SettingsOverrides,
    json: bool,
) -> Result<()> {
    let (timeline, settings) = open_timeline(db_path, overrides)?;
    let (date, rows) = match date {
        Some(date) => {
            let date = parse_date_arg(date)?;
            (date, timeline.on_this_day_at(date)?)
        }
        None => (Local::now().date_naive(), timeline.on_this_day()?),
    };

    let count = rows.len();
    let years = sort_groups(group_by_year(rows));

    if json {
        let output = TimelineOutput {
            date: date.format("%Y-%m-%d").to_string(),
            day_key: day_key(date),
            years,
            count,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if years.is_empty() {
        println!("Nothing recorded on {} in past years.", date.format("%B %-d"));
        return Ok(());
    }

    print!("{}", render_text(&years, &settings.date_format));
    Ok(())
}
