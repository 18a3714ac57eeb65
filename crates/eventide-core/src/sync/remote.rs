//! Read access to the authoritative store.

use chrono::{DateTime, Utc};

use crate::config::{RemoteConfig, RemoteTarget};
use crate::db::{Database, EventRepository, SqliteEventRepository};
use crate::error::{Error, Result};
use crate::models::EventRecord;

use super::libsql_http::LibSqlHttpRemote;

/// The identity authority a local replica pulls from.
///
/// Any error from `fetch_events` is a fetch failure and aborts the run.
pub trait RemoteStore {
    /// Events with `scraped_at` strictly after `since` (all when `None`),
    /// ascending by `scraped_at` then `id`.
    fn fetch_events(&self, since: Option<DateTime<Utc>>) -> Result<Vec<EventRecord>>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Authoritative store kept in a `SQLite` file
pub struct SqliteRemoteStore {
    db: Database,
}

impl SqliteRemoteStore {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open an existing store file read-only; a missing file is a fetch failure.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let db = Database::open_read_only(path)
            .map_err(|error| Error::Fetch(error.to_string()))?;
        Ok(Self::new(db))
    }
}

impl RemoteStore for SqliteRemoteStore {
    fn fetch_events(&self, since: Option<DateTime<Utc>>) -> Result<Vec<EventRecord>> {
        SqliteEventRepository::new(self.db.connection())
            .list_scraped_after(since)
            .map_err(|error| Error::Fetch(error.to_string()))
    }

    fn describe(&self) -> String {
        self.db.path().map_or_else(
            || "in-memory store".to_string(),
            |path| path.display().to_string(),
        )
    }
}

/// Connect to the configured authoritative store.
pub fn open_remote(config: &RemoteConfig) -> Result<Box<dyn RemoteStore>> {
    match &config.target {
        RemoteTarget::File(path) => Ok(Box::new(SqliteRemoteStore::open(path)?)),
        RemoteTarget::Url(url) => {
            let token = config.auth_token.as_deref().unwrap_or_default();
            Ok(Box::new(LibSqlHttpRemote::new(url, token, config.timeout)?))
        }
    }
}
