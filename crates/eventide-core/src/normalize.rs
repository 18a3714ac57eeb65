//! Pure text normalization helpers shared by the filter, resolver and ingest path.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use regex::Regex;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("Invalid regex"));

/// Trim and collapse internal whitespace runs to a single space.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-folded, whitespace-collapsed title.
///
/// ```
/// use eventide_core::normalize::normalize_title;
///
/// assert_eq!(normalize_title("  SF  Jazz\tNight "), "sf jazz night");
/// ```
pub fn normalize_title(raw: &str) -> String {
    normalize_text(&raw.to_lowercase())
}

/// Lower-cased location with all non-word characters removed and whitespace collapsed.
pub fn normalize_location(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    normalize_text(&NON_WORD.replace_all(&lowered, ""))
}

/// Lower-cased, whitespace-separated word set of a title.
pub fn title_tokens(title: &str) -> HashSet<String> {
    title
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of the two titles' token sets.
///
/// Two titles without any tokens score `0.0`.
pub fn jaccard_similarity(left: &str, right: &str) -> f64 {
    jaccard(&title_tokens(left), &title_tokens(right))
}

/// `|a ∩ b| / |a ∪ b|` over precomputed token sets.
#[allow(clippy::cast_precision_loss)]
pub fn jaccard(left: &HashSet<String>, right: &HashSet<String>) -> f64 {
    let intersection = left.intersection(right).count();
    let union = left.len() + right.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Monday-to-Sunday bucket containing `date`, as `YYYY-MM-DD_to_YYYY-MM-DD`.
pub fn week_identifier(date: NaiveDate) -> String {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    let sunday = monday + Duration::days(6);
    format!(
        "{}_to_{}",
        monday.format("%Y-%m-%d"),
        sunday.format("%Y-%m-%d")
    )
}

/// Week bucket for a scraped start time, falling back to the scrape date
/// when the start time cannot be read as a date.
pub fn week_identifier_for(start_time: &str, scraped_at: DateTime<Utc>) -> String {
    let date = parse_event_date(start_time).unwrap_or_else(|| scraped_at.date_naive());
    week_identifier(date)
}

fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.date_naive());
    }
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}
