//! Data models for Eventide

mod event;
mod performance;

pub use event::{EventId, EventRecord, ScrapedEvent};
pub use performance::PerformanceRecord;
