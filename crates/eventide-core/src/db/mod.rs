//! Database layer for Eventide

mod connection;
mod migrations;
mod performance_repository;
mod repository;

pub use connection::Database;
pub use performance_repository::{PerformanceRepository, SqlitePerformanceRepository};
pub use repository::{EventRepository, SqliteEventRepository};

pub(crate) use repository::EVENT_COLUMNS;
