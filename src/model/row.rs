//! Row and sync marker models.
//!
//! A row is one line of a document that contains the tag marker. Rows are
//! content-addressed: at most one row exists per `(document_path, tag, content)`,
//! so two identical tagged lines in one document share a single row. A line
//! carrying two monitored tags yields one row per tag.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `YYYY-MM-DD` anywhere in a line, on word boundaries.
static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9]{4}-[0-9]{2}-[0-9]{2}\b").expect("valid date pattern"));

/// Sort order for timeline listings (by `row_created_at`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// SQL keyword for ORDER BY clauses.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One indexed tagged line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Stable surrogate identity (`row_` + 12 hex chars)
    pub id: String,

    /// Path of the owning document, relative to the vault root
    pub document_path: String,

    /// Last path segment of the owning document
    pub file_name: String,

    /// Tag marker this row was indexed under
    pub tag: String,

    /// Raw line text containing the tag marker
    pub content: String,

    /// Effective timestamp: embedded date if present, else document mtime (Unix ms)
    pub row_created_at: i64,

    /// `MM-DD` of `row_created_at`, for on-this-day lookups
    pub day_key: String,

    /// Four-digit year of `row_created_at`
    pub year_key: String,

    /// Document creation timestamp at indexing time (Unix ms)
    pub document_created_at: i64,

    /// Document modification timestamp at indexing time (Unix ms)
    pub document_modified_at: i64,

    /// When this row was first stored (Unix ms)
    pub indexed_at: i64,

    /// When this row was last touched (Unix ms)
    pub updated_at: i64,
}

impl Row {
    /// Build a row for a tagged line observed for the first time.
    ///
    /// The row date comes from the first `YYYY-MM-DD` in the line. When there
    /// is none, or it is not a real calendar date, the document modification
    /// timestamp is used instead.
    #[must_use]
    pub fn observe(
        document_path: &str,
        tag: &str,
        content: &str,
        document_created_at: i64,
        document_modified_at: i64,
        now: i64,
    ) -> Self {
        let (row_created_at, date) = match extract_row_date(content) {
            Some(date) => (local_midnight_millis(date), date),
            None => (document_modified_at, local_date(document_modified_at)),
        };

        Self {
            id: generate_row_id(),
            document_path: document_path.to_string(),
            file_name: file_name_of(document_path),
            tag: tag.to_string(),
            content: content.to_string(),
            row_created_at,
            day_key: day_key(date),
            year_key: year_key(date),
            document_created_at,
            document_modified_at,
            indexed_at: now,
            updated_at: now,
        }
    }

    /// Whether the owning document was modified since this row was written.
    #[must_use]
    pub fn is_stale(&self, document_modified_at: i64) -> bool {
        self.document_modified_at != document_modified_at
    }
}

/// Bookmark of the last reconciliation of a folder for one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMarker {
    pub folder_path: String,
    pub tag: String,
    /// Start time of the last completed pass (Unix ms)
    pub last_synced_at: i64,
}

impl SyncMarker {
    #[must_use]
    pub fn new(folder_path: &str, tag: &str, last_synced_at: i64) -> Self {
        Self {
            folder_path: folder_path.to_string(),
            tag: tag.to_string(),
            last_synced_at,
        }
    }
}

/// Extract the first embedded `YYYY-MM-DD` date from a line.
///
/// Only the first match is considered. A match that is not a valid date
/// (e.g. `2023-13-40`) yields `None`.
#[must_use]
pub fn extract_row_date(line: &str) -> Option<NaiveDate> {
    let found = DATE_PATTERN.find(line)?;
    NaiveDate::parse_from_str(found.as_str(), "%Y-%m-%d").ok()
}

/// `MM-DD` key for a calendar date.
#[must_use]
pub fn day_key(date: NaiveDate) -> String {
    format!("{:02}-{:02}", date.month(), date.day())
}

/// Four-digit year key for a calendar date.
#[must_use]
pub fn year_key(date: NaiveDate) -> String {
    format!("{:04}", date.year())
}

/// Local calendar date of a Unix-millisecond timestamp.
#[must_use]
pub fn local_date(millis: i64) -> NaiveDate {
    DateTime::from_timestamp_millis(millis)
        .unwrap_or_default()
        .with_timezone(&Local)
        .date_naive()
}

/// Unix milliseconds of local midnight on `date`.
///
/// Falls back to UTC midnight when local midnight does not exist (DST gap).
#[must_use]
pub fn local_midnight_millis(date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    midnight
        .and_local_timezone(Local)
        .earliest()
        .map_or_else(|| midnight.and_utc().timestamp_millis(), |dt| dt.timestamp_millis())
}

fn file_name_of(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn generate_row_id() -> String {
    format!("row_{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_row_date_first_match_wins() {
        let date = extract_row_date("#memory 2021-03-04 then 2022-05-06").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2021, 3, 4).unwrap());
    }

    #[test]
    fn test_extract_row_date_rejects_invalid_calendar_date() {
        assert!(extract_row_date("#memory 2023-13-40").is_none());
        assert!(extract_row_date("#memory no date here").is_none());
        // Part of a longer number is not a date
        assert!(extract_row_date("#memory 12023-05-011").is_none());
    }

    #[test]
    fn test_embedded_date_drives_row_keys() {
        let modified = local_midnight_millis(NaiveDate::from_ymd_opt(2023, 5, 1).unwrap());
        let row = Row::observe("journal/may.md", "#tag", "#tag met 2022-05-01", modified, modified, modified);

        assert_eq!(row.row_created_at, local_midnight_millis(NaiveDate::from_ymd_opt(2022, 5, 1).unwrap()));
        assert_eq!(row.day_key, "05-01");
        assert_eq!(row.year_key, "2022");
        assert_eq!(row.file_name, "may.md");
    }

    #[test]
    fn test_missing_date_falls_back_to_document_mtime() {
        let modified = local_midnight_millis(NaiveDate::from_ymd_opt(2020, 12, 25).unwrap()) + 3_600_000;
        let row = Row::observe("xmas.md", "#tag", "#tag presents", 0, modified, modified);

        assert_eq!(row.row_created_at, modified);
        assert_eq!(row.day_key, "12-25");
        assert_eq!(row.year_key, "2020");
    }

    #[test]
    fn test_day_key_shape() {
        let key = day_key(NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
        assert_eq!(key, "01-09");
        assert_eq!(key.len(), 5);
        assert_eq!(key.as_bytes()[2], b'-');
    }

    #[test]
    fn test_row_ids_are_unique() {
        let a = Row::observe("a.md", "#t", "#t x", 0, 0, 0);
        let b = Row::observe("a.md", "#t", "#t x", 0, 0, 0);
        assert!(a.id.starts_with("row_"));
        assert_eq!(a.id.len(), 16);
        assert_ne!(a.id, b.id);
    }
}
