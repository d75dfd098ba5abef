//! Query layer.
//!
//! [`Timeline`] owns the store handle and answers the read operations
//! (search, browse, on this day). `browse_all` runs a sync pass first so the
//! listing reflects the current folder contents. Every read only sees rows
//! indexed under the timeline's tag for documents inside its folder.
//!
//! The grouping and formatting helpers are pure and work on any row set.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};

use chrono::{Local, NaiveDate, TimeZone};
use regex::{Captures, Regex};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::{Row, SortDirection, day_key};
use crate::storage::SqliteStorage;
use crate::sync::{
    DocumentSource, FolderSyncDriver, MarkerPolicy, SyncLocks, SyncReport, in_folder,
};

/// Date format tokens, matched case-sensitively (`MM` month, `mm` minute).
static FORMAT_TOKENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"yyyy|MM|dd|HH|mm|ss").expect("valid format pattern"));

/// Rows of one year, ascending by row date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearGroup {
    pub year: String,
    pub rows: Vec<Row>,
}

/// Read side of the index, bound to one folder and tag.
pub struct Timeline<S: DocumentSource> {
    storage: Option<SqliteStorage>,
    source: S,
    folder_path: String,
    tag: String,
    policy: MarkerPolicy,
    locks: Arc<SyncLocks>,
}

impl<S: DocumentSource> Timeline<S> {
    #[must_use]
    pub fn new(
        storage: SqliteStorage,
        source: S,
        folder_path: &str,
        tag: &str,
        locks: Arc<SyncLocks>,
    ) -> Self {
        Self {
            storage: Some(storage),
            source,
            folder_path: folder_path.to_string(),
            tag: tag.to_string(),
            policy: MarkerPolicy::default(),
            locks,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: MarkerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Release the store handle. Queries fail with
    /// [`Error::NotInitialized`] until [`Timeline::attach`] is called.
    pub fn close(&mut self) -> Option<SqliteStorage> {
        self.storage.take()
    }

    pub fn attach(&mut self, storage: SqliteStorage) {
        self.storage = Some(storage);
    }

    fn storage(&self) -> Result<&SqliteStorage> {
        self.storage.as_ref().ok_or(Error::NotInitialized)
    }

    fn in_scope(&self, rows: Vec<Row>) -> Vec<Row> {
        rows.into_iter()
            .filter(|row| in_folder(&self.folder_path, &row.document_path))
            .collect()
    }

    /// Rows whose content contains `text` (case-insensitive), newest first.
    ///
    /// Surrounding whitespace is ignored; blank text lists everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the query fails.
    pub fn search(&self, text: &str) -> Result<Vec<Row>> {
        let text = text.trim();
        let filter = (!text.is_empty()).then_some(text);
        let rows = self.storage()?.list_rows(&self.tag, filter, SortDirection::Desc)?;
        Ok(self.in_scope(rows))
    }

    /// Run one sync pass for the configured folder and tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable, the store fails, or the
    /// folder cannot be listed.
    pub fn sync(&mut self, force_full: bool) -> Result<SyncReport> {
        let policy = self.policy;
        let storage = self.storage.as_mut().ok_or(Error::NotInitialized)?;
        FolderSyncDriver::new(storage, &self.source, &self.locks, &self.folder_path, &self.tag)?
            .with_policy(policy)
            .force_full(force_full)
            .run()
    }

    /// Sync, then list every row newest first.
    ///
    /// # Errors
    ///
    /// See [`Timeline::sync`].
    pub fn browse_all(&mut self) -> Result<Vec<Row>> {
        self.browse(SortDirection::Desc)
    }

    /// Sync, then list every row in `direction` order of row date.
    ///
    /// # Errors
    ///
    /// See [`Timeline::sync`].
    pub fn browse(&mut self, direction: SortDirection) -> Result<Vec<Row>> {
        self.sync(false)?;
        let rows = self.storage()?.list_rows(&self.tag, None, direction)?;
        Ok(self.in_scope(rows))
    }

    /// Rows from any year that fall on today's month and day.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the query fails.
    pub fn on_this_day(&self) -> Result<Vec<Row>> {
        self.on_this_day_at(Local::now().date_naive())
    }

    /// Rows from any year that fall on the month and day of `date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable or the query fails.
    pub fn on_this_day_at(&self, date: NaiveDate) -> Result<Vec<Row>> {
        let rows = self.storage()?.list_rows_by_day_key(&self.tag, &day_key(date))?;
        Ok(self.in_scope(rows))
    }
}

/// Group rows by year key.
#[must_use]
pub fn group_by_year(rows: Vec<Row>) -> HashMap<String, Vec<Row>> {
    let mut groups: HashMap<String, Vec<Row>> = HashMap::new();
    for row in rows {
        groups.entry(row.year_key.clone()).or_default().push(row);
    }
    groups
}

/// Years newest first, each year's rows oldest first.
#[must_use]
pub fn sort_groups(groups: HashMap<String, Vec<Row>>) -> Vec<YearGroup> {
    let mut sorted: Vec<YearGroup> = groups
        .into_iter()
        .map(|(year, mut rows)| {
            rows.sort_by(|a, b| {
                a.row_created_at
                    .cmp(&b.row_created_at)
                    .then_with(|| a.document_path.cmp(&b.document_path))
                    .then_with(|| a.content.cmp(&b.content))
            });
            YearGroup { year, rows }
        })
        .collect();
    sorted.sort_by(|a, b| b.year.cmp(&a.year));
    sorted
}

/// Format a Unix ms timestamp in local time.
///
/// Supported tokens: `yyyy`, `MM`, `dd`, `HH`, `mm`, `ss`. Anything else is
/// copied through.
#[must_use]
pub fn format_timestamp(millis: i64, pattern: &str) -> String {
    let Some(time) = Local.timestamp_millis_opt(millis).single() else {
        return pattern.to_string();
    };
    FORMAT_TOKENS
        .replace_all(pattern, |caps: &Captures<'_>| match &caps[0] {
            "yyyy" => time.format("%Y").to_string(),
            "MM" => time.format("%m").to_string(),
            "dd" => time.format("%d").to_string(),
            "HH" => time.format("%H").to_string(),
            "mm" => time.format("%M").to_string(),
            "ss" => time.format("%S").to_string(),
            other => other.to_string(),
        })
        .into_owned()
}

/// Plain-text timeline, one block per year.
#[must_use]
pub fn render_text(groups: &[YearGroup], date_format: &str) -> String {
    let mut out = String::new();
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "{}", group.year);
        for row in &group.rows {
            let _ = writeln!(
                out,
                "  {}  {}  ({})",
                format_timestamp(row.row_created_at, date_format),
                row.content.trim(),
                row.file_name
            );
        }
    }
    out
}

/// Markdown timeline using callout blocks, one heading per year.
#[must_use]
pub fn render_markdown(groups: &[YearGroup], date_format: &str) -> String {
    let mut out = String::new();
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "> [!info] **{}**\n\n", group.year);
        for row in &group.rows {
            let _ = writeln!(out, "> [!{}]", format_timestamp(row.row_created_at, date_format));
            let _ = writeln!(out, "> {}", row.content);
            let _ = write!(
                out,
                "> <span class=\"right-align\">[[{}]]</span>\n\n",
                row.file_name
            );
        }
    }
    out
}
