//! Sync command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;

use crate::config::SettingsOverrides;
use crate::error::Result;
use crate::query::Timeline;
use crate::sync::{MarkerPolicy, SyncLocks, SyncReport, VaultSource};

use super::open_with_settings;

/// Execute the sync command.
///
/// # Errors
///
/// Returns an error if the store is unavailable, no vault is configured, or
/// the folder cannot be listed. Unreadable documents are reported, not fatal.
pub fn execute(
    full: bool,
    policy: MarkerPolicy,
    db_path: Option<&PathBuf>,
    overrides: &SettingsOverrides,
    json: bool,
) -> Result<()> {
    let (storage, settings) = open_with_settings(db_path, overrides)?;
    let source = VaultSource::new(settings.require_vault()?)?;

    let mut timeline = Timeline::new(
        storage,
        source,
        &settings.folder_path,
        &settings.tag,
        Arc::new(SyncLocks::new()),
    )
    .with_policy(policy);
    let report = timeline.sync(full)?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &SyncReport) {
    println!(
        "{} {} sync of {} for {}",
        "✓".green(),
        report.mode,
        report.folder_path.bold(),
        report.tag.bold()
    );
    println!(
        "  Documents: {} reconciled of {} candidates",
        report.reconciled, report.candidates
    );
    println!(
        "  Rows:      +{} inserted, ~{} refreshed, -{} removed",
        report.stats.inserted, report.stats.updated, report.stats.removed
    );
    if report.stats.duplicates > 0 {
        println!("  Duplicate lines collapsed: {}", report.stats.duplicates);
    }
    if report.pruned_documents > 0 {
        println!(
            "  Vanished documents pruned: {} ({} rows)",
            report.pruned_documents, report.pruned_rows
        );
    }
    if !report.failed.is_empty() {
        println!("{}", format!("  Skipped {} document(s):", report.failed.len()).yellow());
        for failed in &report.failed {
            println!("    {}: {}", failed.path, failed.error);
        }
    }
    if !report.skipped.is_empty() {
        println!(
            "{}",
            format!("  Could not list {} entry(ies), marker kept:", report.skipped.len()).yellow()
        );
        for entry in &report.skipped {
            println!("    {}: {}", entry.path, entry.error);
        }
    }
}
