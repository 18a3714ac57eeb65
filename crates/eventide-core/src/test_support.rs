//! Fixtures shared by unit tests.

use chrono::{DateTime, Utc};

use crate::models::{EventId, EventRecord, PerformanceRecord};
use crate::normalize::normalize_title;

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

/// Event at the same venue and week as every other fixture event.
pub fn event(id: i64, title: &str, url: &str, priority: i64) -> EventRecord {
    EventRecord {
        id: EventId::new(id),
        title: title.to_string(),
        normalized_title: normalize_title(title),
        start_time: "2024-03-06T19:00:00Z".to_string(),
        end_time: None,
        location: "SFJAZZ Center".to_string(),
        price: "$25".to_string(),
        description: None,
        description_detail: None,
        original_url: url.to_string(),
        short_url: None,
        source: "test".to_string(),
        event_type: "general".to_string(),
        priority,
        scraped_at: at("2024-01-01T00:00:00Z"),
        week_identifier: "2024-03-04_to_2024-03-10".to_string(),
    }
}

pub fn performance(id: i64, event_id: i64, score: f64) -> PerformanceRecord {
    PerformanceRecord {
        id,
        event_id: EventId::new(event_id),
        shortio_clicks: 0,
        xhs_likes: 0,
        xhs_favorites: 0,
        xhs_comments: 0,
        xhs_shares: 0,
        engagement_score: score,
        normalized_score: 0.0,
        data_source: None,
        source_review: None,
        source_website: None,
    }
}
