//! Recovered-failure tally shared by every batch job.
//!
//! Recoverable problems never abort a run. They are counted here by category
//! and returned with the run summary, so callers can assert on a clean run.

use serde::Serialize;

use crate::models::{EventId, EventRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// A single record could not be written
    Write,
    /// An expected table is absent; treated as zero rows
    SchemaMissing,
    /// A duplicate cluster could not be ordered and was left unresolved
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub category: FailureCategory,
    pub event_id: Option<EventId>,
    pub title: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunFailures {
    pub write: usize,
    pub schema_missing: usize,
    pub ambiguous: usize,
    pub details: Vec<RecordFailure>,
}

impl RunFailures {
    pub fn record_write(&mut self, record: &EventRecord, error: &impl std::fmt::Display) {
        tracing::warn!(
            event_id = %record.id,
            title = %record.title,
            "Failed to write event: {error}"
        );
        self.write += 1;
        self.details.push(RecordFailure {
            category: FailureCategory::Write,
            event_id: Some(record.id),
            title: Some(record.title.clone()),
            message: error.to_string(),
        });
    }

    /// Write failure where only the id is known, such as a delete
    pub fn record_write_id(&mut self, event_id: EventId, error: &impl std::fmt::Display) {
        tracing::warn!(event_id = %event_id, "Failed to write event: {error}");
        self.write += 1;
        self.details.push(RecordFailure {
            category: FailureCategory::Write,
            event_id: Some(event_id),
            title: None,
            message: error.to_string(),
        });
    }

    pub fn record_schema_missing(&mut self, table: &str) {
        tracing::warn!("Table `{table}` is missing; treating it as empty");
        self.schema_missing += 1;
        self.details.push(RecordFailure {
            category: FailureCategory::SchemaMissing,
            event_id: None,
            title: None,
            message: format!("table `{table}` not found"),
        });
    }

    pub fn record_ambiguous(&mut self, event_ids: &[EventId], error: &impl std::fmt::Display) {
        tracing::warn!(?event_ids, "Leaving duplicate cluster unresolved: {error}");
        self.ambiguous += 1;
        self.details.push(RecordFailure {
            category: FailureCategory::Ambiguous,
            event_id: event_ids.first().copied(),
            title: None,
            message: error.to_string(),
        });
    }

    pub const fn total(&self) -> usize {
        self.write + self.schema_missing + self.ambiguous
    }

    /// True when nothing was recovered from
    pub const fn is_clean(&self) -> bool {
        self.total() == 0
    }

    /// `write=0 schema_missing=0 ambiguous=0`
    pub fn summary_line(&self) -> String {
        format!(
            "write={} schema_missing={} ambiguous={}",
            self.write, self.schema_missing, self.ambiguous
        )
    }
}
