//! Input validation for settings and command arguments.
//!
//! Setting keys resolve in three tiers: exact match, synonym lookup, then an
//! error carrying the closest known key as a suggestion.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::{Days, Local, NaiveDate};

use crate::error::{Error, Result};

// ── Setting keys ─────────────────────────────────────────────

pub static VALID_SETTING_KEYS: LazyLock<HashSet<&str>> = LazyLock::new(|| {
    ["vault", "folder_path", "tag", "date_format"]
        .into_iter()
        .collect()
});

pub static SETTING_KEY_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("root", "vault"),
        ("vault_path", "vault"),
        ("folder", "folder_path"),
        ("folderpath", "folder_path"),
        ("dir", "folder_path"),
        ("directory", "folder_path"),
        ("hashtag", "tag"),
        ("tag_name", "tag"),
        ("tagname", "tag"),
        ("marker", "tag"),
        ("format", "date_format"),
        ("dateformat", "date_format"),
    ]
    .into_iter()
    .collect()
});

/// Normalize a setting key via exact match or synonym lookup.
///
/// Returns the canonical key, or an error with the original input and an
/// optional suggestion.
pub fn normalize_setting_key(input: &str) -> std::result::Result<String, (String, Option<String>)> {
    let lower = input.trim().to_lowercase().replace('-', "_");

    if VALID_SETTING_KEYS.contains(lower.as_str()) {
        return Ok(lower);
    }

    if let Some(&canonical) = SETTING_KEY_SYNONYMS.get(lower.as_str()) {
        return Ok(canonical.to_string());
    }

    let suggestion = find_closest_match(&lower, &VALID_SETTING_KEYS, &SETTING_KEY_SYNONYMS);
    Err((input.to_string(), suggestion))
}

/// Find the closest matching value across valid set and synonyms.
fn find_closest_match(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;

    for &candidate in valid.iter().chain(synonyms.keys()) {
        let dist = levenshtein_distance(input, candidate);
        if dist > 3 || best.is_some_and(|(_, d)| d <= dist) {
            continue;
        }
        // Synonyms suggest the key they map to
        let shown = synonyms.get(candidate).copied().unwrap_or(candidate);
        best = Some((shown, dist));
    }

    best.map(|(v, _)| v.to_string())
}

/// Compute the Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

// ── Settings values ──────────────────────────────────────────

/// A tag marker must be non-empty; an empty marker would match every line.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for an empty or blank tag.
pub fn validate_tag(tag: &str) -> Result<String> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(Error::InvalidArgument("tag must not be empty".to_string()));
    }
    Ok(tag.to_string())
}

/// Trim a folder path. `/` stays as the root folder.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for a blank path.
pub fn normalize_folder_path(folder: &str) -> Result<String> {
    let folder = folder.trim();
    if folder.is_empty() {
        return Err(Error::InvalidArgument(
            "folder path must not be empty (use \"/\" for the vault root)".to_string(),
        ));
    }
    Ok(folder.to_string())
}

/// A display date format must not be blank.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for a blank format.
pub fn validate_date_format(format: &str) -> Result<()> {
    if format.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "date format must not be empty".to_string(),
        ));
    }
    Ok(())
}

// ── Dates ────────────────────────────────────────────────────

/// Parse a `--date` argument: `YYYY-MM-DD`, `today`, `yesterday` or
/// `tomorrow`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] if the input is not a valid date.
pub fn parse_date_arg(input: &str) -> Result<NaiveDate> {
    let today = Local::now().date_naive();
    let lower = input.trim().to_lowercase();

    let relative = match lower.as_str() {
        "today" | "now" => Some(today),
        "yesterday" => today.checked_sub_days(Days::new(1)),
        "tomorrow" => today.checked_add_days(Days::new(1)),
        _ => None,
    };
    if let Some(date) = relative {
        return Ok(date);
    }

    NaiveDate::parse_from_str(&lower, "%Y-%m-%d").map_err(|_| {
        Error::InvalidArgument(format!("Invalid date '{input}': expected YYYY-MM-DD"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_key_exact_and_synonym() {
        assert_eq!(normalize_setting_key("tag").unwrap(), "tag");
        assert_eq!(normalize_setting_key("Folder").unwrap(), "folder_path");
        assert_eq!(normalize_setting_key("date-format").unwrap(), "date_format");
        assert_eq!(normalize_setting_key("hashtag").unwrap(), "tag");
    }

    #[test]
    fn test_setting_key_suggestion() {
        let (input, suggestion) = normalize_setting_key("vualt").unwrap_err();
        assert_eq!(input, "vualt");
        assert_eq!(suggestion.as_deref(), Some("vault"));

        let (_, suggestion) = normalize_setting_key("completely-unrelated").unwrap_err();
        assert!(suggestion.is_none());
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("tag", "tag"), 0);
    }

    #[test]
    fn test_validate_tag() {
        assert_eq!(validate_tag("  #memory ").unwrap(), "#memory");
        assert!(validate_tag("").is_err());
        assert!(validate_tag("   ").is_err());
    }

    #[test]
    fn test_normalize_folder_path() {
        assert_eq!(normalize_folder_path("/").unwrap(), "/");
        assert_eq!(normalize_folder_path(" journal ").unwrap(), "journal");
        assert!(normalize_folder_path("  ").is_err());
    }

    #[test]
    fn test_parse_date_arg() {
        assert_eq!(
            parse_date_arg("2022-05-01").unwrap(),
            NaiveDate::from_ymd_opt(2022, 5, 1).unwrap()
        );
        assert_eq!(parse_date_arg("TODAY").unwrap(), Local::now().date_naive());
        assert!(matches!(
            parse_date_arg("2022-02-30"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(parse_date_arg("next week").is_err());
    }
}
