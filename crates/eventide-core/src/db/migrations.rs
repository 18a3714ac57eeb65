//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration to version 1: canonical events
fn migrate_v1(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            normalized_title TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT,
            location TEXT NOT NULL DEFAULT '',
            price TEXT NOT NULL DEFAULT '',
            description TEXT,
            description_detail TEXT,
            original_url TEXT NOT NULL,
            short_url TEXT,
            source TEXT NOT NULL,
            event_type TEXT NOT NULL DEFAULT 'general',
            priority INTEGER NOT NULL DEFAULT 0,
            scraped_at INTEGER NOT NULL,
            week_identifier TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX IF NOT EXISTS idx_events_original_url ON events(original_url);
        CREATE INDEX IF NOT EXISTS idx_events_scraped_at ON events(scraped_at);
        CREATE INDEX IF NOT EXISTS idx_events_week ON events(week_identifier);
        INSERT INTO schema_version (version) VALUES (1);",
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: engagement metrics.
///
/// `event_id` carries no foreign key: rows are relocated by the dedup pass
/// and may be orphaned by identity migrations.
fn migrate_v2(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS event_performance (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id INTEGER NOT NULL,
            shortio_clicks INTEGER NOT NULL DEFAULT 0,
            xhs_likes INTEGER NOT NULL DEFAULT 0,
            xhs_favorites INTEGER NOT NULL DEFAULT 0,
            xhs_comments INTEGER NOT NULL DEFAULT 0,
            xhs_shares INTEGER NOT NULL DEFAULT 0,
            engagement_score REAL NOT NULL DEFAULT 0,
            normalized_score REAL NOT NULL DEFAULT 0,
            data_source TEXT,
            source_review TEXT,
            source_website TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_event_performance_event ON event_performance(event_id);
        INSERT INTO schema_version (version) VALUES (2);",
    )?;
    tx.commit()?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_migrations() {
        let conn = setup();
        run(&conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = setup();
        run(&conn).unwrap();
        run(&conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_v2_creates_performance_table() {
        let conn = setup();
        run(&conn).unwrap();

        assert!(table_exists(&conn, "events"));
        assert!(table_exists(&conn, "event_performance"));
    }
}
