//! Invalid-record filter.
//!
//! Drops records whose normalized title degraded to a bare source domain,
//! which is how a failed extraction shows up.

use std::collections::HashSet;

use crate::models::EventRecord;
use crate::normalize::normalize_title;

/// Sentinel titles used when no configuration overrides them.
pub const DEFAULT_INVALID_TITLES: &[&str] = &[
    "eventbrite.com",
    "www.eventbrite.com",
    "sfstation.com",
    "www.sfstation.com",
    "funcheap.com",
    "sf.funcheap.com",
];

#[derive(Debug, Clone)]
pub struct InvalidRecordFilter {
    sentinels: HashSet<String>,
}

impl Default for InvalidRecordFilter {
    fn default() -> Self {
        Self::new(DEFAULT_INVALID_TITLES.iter().copied())
    }
}

impl InvalidRecordFilter {
    pub fn new<I, S>(sentinels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sentinels = sentinels
            .into_iter()
            .map(|value| normalize_title(value.as_ref()))
            .filter(|value| !value.is_empty())
            .collect();
        Self { sentinels }
    }

    pub fn is_invalid(&self, record: &EventRecord) -> bool {
        self.is_sentinel_title(&record.normalized_title)
    }

    pub fn is_sentinel_title(&self, normalized_title: &str) -> bool {
        self.sentinels.contains(normalized_title)
    }

    /// Keep only valid records. Fields are never rewritten.
    pub fn filter(&self, records: Vec<EventRecord>) -> Vec<EventRecord> {
        self.partition(records).0
    }

    /// Split into `(valid, invalid)`, preserving input order in both halves.
    pub fn partition(&self, records: Vec<EventRecord>) -> (Vec<EventRecord>, Vec<EventRecord>) {
        let (invalid, valid): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|record| self.is_invalid(record));
        if !invalid.is_empty() {
            tracing::debug!(dropped = invalid.len(), "Filtered scraper failure records");
        }
        (valid, invalid)
    }
}
