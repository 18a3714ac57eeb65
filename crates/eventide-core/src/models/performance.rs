//! Performance (engagement) model

use serde::{Deserialize, Serialize};

use super::EventId;

/// Engagement metrics attached to a published event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// Row identifier
    pub id: i64,
    /// Event this row belongs to; not enforced by a foreign key
    pub event_id: EventId,
    pub shortio_clicks: i64,
    pub xhs_likes: i64,
    pub xhs_favorites: i64,
    pub xhs_comments: i64,
    pub xhs_shares: i64,
    /// Derived ranking number; the merge keeps the highest
    pub engagement_score: f64,
    pub normalized_score: f64,
    pub data_source: Option<String>,
    pub source_review: Option<String>,
    pub source_website: Option<String>,
}

impl PerformanceRecord {
    /// Copy of this row rebound to another event
    #[must_use]
    pub fn rebound_to(&self, event_id: EventId) -> Self {
        Self {
            event_id,
            ..self.clone()
        }
    }
}
