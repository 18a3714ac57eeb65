//! Event repository implementation

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{EventId, EventRecord};

pub(crate) const EVENT_COLUMNS: &str = "id, title, normalized_title, start_time, end_time, \
     location, price, description, description_detail, original_url, short_url, source, \
     event_type, priority, scraped_at, week_identifier";

/// Trait for canonical event storage operations.
///
/// Every insert carries its identity; nothing here allocates ids.
pub trait EventRepository {
    /// Get an event by ID
    fn get(&self, id: EventId) -> Result<Option<EventRecord>>;

    /// All events, ordered by id
    fn list_all(&self) -> Result<Vec<EventRecord>>;

    /// Events in one scheduling bucket, ordered by start time
    fn list_by_week(&self, week_identifier: &str) -> Result<Vec<EventRecord>>;

    /// Events with `scraped_at` strictly after `since` (all when `None`),
    /// ascending by `scraped_at` then `id`
    fn list_scraped_after(&self, since: Option<DateTime<Utc>>) -> Result<Vec<EventRecord>>;

    /// Latest `scraped_at` present, the incremental sync watermark
    fn max_scraped_at(&self) -> Result<Option<DateTime<Utc>>>;

    /// All ids, ascending
    fn ids(&self) -> Result<Vec<EventId>>;

    fn count(&self) -> Result<usize>;

    /// Insert preserving `record.id`
    fn insert(&self, record: &EventRecord) -> Result<()>;

    /// Overwrite every mutable field of the row with `record.id`
    fn update(&self, record: &EventRecord) -> Result<()>;

    fn delete(&self, id: EventId) -> Result<()>;
}

/// `SQLite` implementation of `EventRepository`
pub struct SqliteEventRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteEventRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an event from a database row selected with `EVENT_COLUMNS`
    pub(crate) fn parse_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRecord> {
        let scraped_at_ms: i64 = row.get(14)?;
        let scraped_at = DateTime::from_timestamp_millis(scraped_at_ms)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(14, scraped_at_ms))?;

        Ok(EventRecord {
            id: EventId::new(row.get(0)?),
            title: row.get(1)?,
            normalized_title: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            location: row.get(5)?,
            price: row.get(6)?,
            description: row.get(7)?,
            description_detail: row.get(8)?,
            original_url: row.get(9)?,
            short_url: row.get(10)?,
            source: row.get(11)?,
            event_type: row.get(12)?,
            priority: row.get(13)?,
            scraped_at,
            week_identifier: row.get(15)?,
        })
    }

    fn query_events(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<EventRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let events = stmt
            .query_map(params, Self::parse_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }
}

impl EventRepository for SqliteEventRepository<'_> {
    fn get(&self, id: EventId) -> Result<Option<EventRecord>> {
        let event = self
            .conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"),
                params![id.get()],
                Self::parse_event,
            )
            .optional()?;
        Ok(event)
    }

    fn list_all(&self) -> Result<Vec<EventRecord>> {
        self.query_events(
            &format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY id ASC"),
            [],
        )
    }

    fn list_by_week(&self, week_identifier: &str) -> Result<Vec<EventRecord>> {
        self.query_events(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM events
                 WHERE week_identifier = ?
                 ORDER BY start_time ASC, id ASC"
            ),
            params![week_identifier],
        )
    }

    fn list_scraped_after(&self, since: Option<DateTime<Utc>>) -> Result<Vec<EventRecord>> {
        let since_ms = since.map_or(i64::MIN, |since| since.timestamp_millis());
        self.query_events(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM events
                 WHERE scraped_at > ?
                 ORDER BY scraped_at ASC, id ASC"
            ),
            params![since_ms],
        )
    }

    fn max_scraped_at(&self) -> Result<Option<DateTime<Utc>>> {
        let max_ms: Option<i64> =
            self.conn
                .query_row("SELECT MAX(scraped_at) FROM events", [], |row| row.get(0))?;
        Ok(max_ms.and_then(DateTime::from_timestamp_millis))
    }

    fn ids(&self) -> Result<Vec<EventId>> {
        let mut stmt = self.conn.prepare("SELECT id FROM events ORDER BY id ASC")?;
        let ids = stmt
            .query_map([], |row| row.get(0).map(EventId::new))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| Error::Database(format!("invalid row count {count}")))
    }

    fn insert(&self, record: &EventRecord) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO events ({EVENT_COLUMNS})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                record.id.get(),
                record.title,
                record.normalized_title,
                record.start_time,
                record.end_time,
                record.location,
                record.price,
                record.description,
                record.description_detail,
                record.original_url,
                record.short_url,
                record.source,
                record.event_type,
                record.priority,
                record.scraped_at.timestamp_millis(),
                record.week_identifier,
            ],
        )?;
        Ok(())
    }

    fn update(&self, record: &EventRecord) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE events SET
                title = ?, normalized_title = ?, start_time = ?, end_time = ?,
                location = ?, price = ?, description = ?, description_detail = ?,
                original_url = ?, short_url = ?, source = ?, event_type = ?,
                priority = ?, scraped_at = ?, week_identifier = ?
             WHERE id = ?",
            params![
                record.title,
                record.normalized_title,
                record.start_time,
                record.end_time,
                record.location,
                record.price,
                record.description,
                record.description_detail,
                record.original_url,
                record.short_url,
                record.source,
                record.event_type,
                record.priority,
                record.scraped_at.timestamp_millis(),
                record.week_identifier,
                record.id.get(),
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(record.id.to_string()));
        }
        Ok(())
    }

    fn delete(&self, id: EventId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM events WHERE id = ?", params![id.get()])?;
        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }
}

/// `?, ?, ?` with one placeholder per bound value
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Raw ids for `params_from_iter`
pub(crate) fn id_params(ids: &[EventId]) -> impl rusqlite::Params + '_ {
    params_from_iter(ids.iter().map(|id| id.get()))
}
