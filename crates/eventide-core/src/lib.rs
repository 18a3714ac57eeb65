//! eventide-core - Core library for Eventide
//!
//! Maintains a canonical, de-duplicated event dataset: filtering scraper
//! failures, resolving record identity, collapsing duplicates, and keeping
//! local replicas in step with the authoritative store.

pub mod backup;
pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod export;
pub mod filter;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod policy;
pub mod report;
pub mod resolver;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, Result};
pub use models::{EventId, EventRecord, PerformanceRecord, ScrapedEvent};
