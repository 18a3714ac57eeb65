//! Event model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::normalize::{normalize_title, week_identifier_for};

/// Identity of a canonical event, assigned by the authoritative store.
///
/// Never reassigned once created, and identical in every replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(i64);

impl EventId {
    /// Wrap a raw store identifier
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Get the raw integer value
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// One real-world event in the canonical dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Identity assigned by the authoritative store
    pub id: EventId,
    pub title: String,
    /// Case-folded, whitespace-collapsed title used for matching
    pub normalized_title: String,
    /// ISO-8601 start instant as produced by the scraper
    pub start_time: String,
    pub end_time: Option<String>,
    /// Free-text venue/address
    pub location: String,
    /// Free-text price ("Free", "$25")
    pub price: String,
    pub description: Option<String>,
    pub description_detail: Option<String>,
    /// Canonical source URL; the primary de-duplication key
    pub original_url: String,
    pub short_url: Option<String>,
    /// Scraper/site that produced the record
    pub source: String,
    pub event_type: String,
    /// Curation confidence of the extraction path; higher wins conflicts
    pub priority: i64,
    /// Capture instant; tie-break and sync watermark
    pub scraped_at: DateTime<Utc>,
    /// Scheduling bucket, `YYYY-MM-DD_to_YYYY-MM-DD`
    pub week_identifier: String,
}

impl EventRecord {
    /// URL key used for exact matching
    pub fn url_key(&self) -> &str {
        self.original_url.trim()
    }

    /// Compare every mutable field (everything except `id`)
    pub fn same_content(&self, other: &Self) -> bool {
        self.title == other.title
            && self.normalized_title == other.normalized_title
            && self.start_time == other.start_time
            && self.end_time == other.end_time
            && self.location == other.location
            && self.price == other.price
            && self.description == other.description
            && self.description_detail == other.description_detail
            && self.original_url == other.original_url
            && self.short_url == other.short_url
            && self.source == other.source
            && self.event_type == other.event_type
            && self.priority == other.priority
            && self.scraped_at == other.scraped_at
            && self.week_identifier == other.week_identifier
    }
}

/// A raw record as delivered by the scraping collaborator, before it has an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedEvent {
    pub title: String,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub description_detail: Option<String>,
    pub original_url: String,
    #[serde(default)]
    pub short_url: Option<String>,
    pub source: String,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    pub scraped_at: DateTime<Utc>,
    #[serde(default)]
    pub week_identifier: Option<String>,
}

impl ScrapedEvent {
    /// Normalized title for this raw record
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }

    /// Build the canonical shape under the given identity.
    ///
    /// Derives `normalized_title`, and `week_identifier` when the scraper
    /// did not supply one.
    #[must_use]
    pub fn into_record(self, id: EventId) -> EventRecord {
        let normalized_title = self.normalized_title();
        let week_identifier = self
            .week_identifier
            .filter(|week| !week.trim().is_empty())
            .unwrap_or_else(|| week_identifier_for(&self.start_time, self.scraped_at));

        EventRecord {
            id,
            title: self.title.trim().to_string(),
            normalized_title,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location,
            price: self.price,
            description: self.description,
            description_detail: self.description_detail,
            original_url: self.original_url.trim().to_string(),
            short_url: self.short_url,
            source: self.source,
            event_type: self.event_type.unwrap_or_else(|| "general".to_string()),
            priority: self.priority.unwrap_or(0),
            scraped_at: self.scraped_at,
            week_identifier,
        }
    }
}
