//! Performance repository implementation

use rusqlite::{params, Connection};

use super::repository::{id_params, placeholders};
use crate::error::Result;
use crate::models::{EventId, PerformanceRecord};

const PERFORMANCE_COLUMNS: &str = "id, event_id, shortio_clicks, xhs_likes, xhs_favorites, \
     xhs_comments, xhs_shares, engagement_score, normalized_score, data_source, source_review, \
     source_website";

/// Trait for engagement metric storage.
///
/// A store created before metrics existed has no `event_performance` table;
/// callers see that as an `Error::is_missing_table` error.
pub trait PerformanceRepository {
    /// Rows bound to any of `event_ids`
    fn list_for_events(&self, event_ids: &[EventId]) -> Result<Vec<PerformanceRecord>>;

    fn list_all(&self) -> Result<Vec<PerformanceRecord>>;

    /// Rows whose `event_id` matches no event
    fn list_orphans(&self) -> Result<Vec<PerformanceRecord>>;

    /// Insert preserving `record.id`
    fn insert(&self, record: &PerformanceRecord) -> Result<()>;

    /// Delete every row bound to any of `event_ids`
    fn delete_for_events(&self, event_ids: &[EventId]) -> Result<usize>;
}

/// `SQLite` implementation of `PerformanceRepository`
pub struct SqlitePerformanceRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePerformanceRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_performance(row: &rusqlite::Row<'_>) -> rusqlite::Result<PerformanceRecord> {
        Ok(PerformanceRecord {
            id: row.get(0)?,
            event_id: EventId::new(row.get(1)?),
            shortio_clicks: row.get(2)?,
            xhs_likes: row.get(3)?,
            xhs_favorites: row.get(4)?,
            xhs_comments: row.get(5)?,
            xhs_shares: row.get(6)?,
            engagement_score: row.get(7)?,
            normalized_score: row.get(8)?,
            data_source: row.get(9)?,
            source_review: row.get(10)?,
            source_website: row.get(11)?,
        })
    }
}

impl PerformanceRepository for SqlitePerformanceRepository<'_> {
    fn list_for_events(&self, event_ids: &[EventId]) -> Result<Vec<PerformanceRecord>> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PERFORMANCE_COLUMNS} FROM event_performance
             WHERE event_id IN ({})
             ORDER BY id ASC",
            placeholders(event_ids.len())
        ))?;
        let rows = stmt
            .query_map(id_params(event_ids), Self::parse_performance)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn list_all(&self) -> Result<Vec<PerformanceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PERFORMANCE_COLUMNS} FROM event_performance ORDER BY id ASC"
        ))?;
        let rows = stmt
            .query_map([], Self::parse_performance)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn list_orphans(&self) -> Result<Vec<PerformanceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PERFORMANCE_COLUMNS} FROM event_performance p
             WHERE NOT EXISTS (SELECT 1 FROM events e WHERE e.id = p.event_id)
             ORDER BY p.id ASC"
        ))?;
        let rows = stmt
            .query_map([], Self::parse_performance)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn insert(&self, record: &PerformanceRecord) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO event_performance ({PERFORMANCE_COLUMNS})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                record.id,
                record.event_id.get(),
                record.shortio_clicks,
                record.xhs_likes,
                record.xhs_favorites,
                record.xhs_comments,
                record.xhs_shares,
                record.engagement_score,
                record.normalized_score,
                record.data_source,
                record.source_review,
                record.source_website,
            ],
        )?;
        Ok(())
    }

    fn delete_for_events(&self, event_ids: &[EventId]) -> Result<usize> {
        if event_ids.is_empty() {
            return Ok(0);
        }
        let removed = self.conn.execute(
            &format!(
                "DELETE FROM event_performance WHERE event_id IN ({})",
                placeholders(event_ids.len())
            ),
            id_params(event_ids),
        )?;
        Ok(removed)
    }
}
