//! Error types for eventide-core

use thiserror::Error;

/// Result type alias using eventide-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in eventide-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading from the authoritative store failed; the run must abort
    #[error("Remote fetch failed: {0}")]
    Fetch(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Event not found
    #[error("Event not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error means the named table does not exist yet.
    pub fn is_missing_table(&self, table: &str) -> bool {
        match self {
            Self::Sqlite(error) => error
                .to_string()
                .contains(&format!("no such table: {table}")),
            _ => false,
        }
    }
}
