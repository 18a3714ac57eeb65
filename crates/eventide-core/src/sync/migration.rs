//! Identity recovery for a local replica whose ids drifted from the remote.
//!
//! Performance rows reference events by value, so after a rebuild any row
//! pointing at an id the remote never had is orphaned. Orphans are reported
//! for manual review and never deleted.

use rusqlite::Connection;
use serde::Serialize;

use super::engine::{SyncEngine, SyncMode, SyncOptions, SyncSummary};
use crate::db::{PerformanceRepository, SqlitePerformanceRepository};
use crate::error::Result;
use crate::models::PerformanceRecord;
use crate::report::RunFailures;

const PERFORMANCE_TABLE: &str = "event_performance";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrphanReport {
    pub orphans: Vec<PerformanceRecord>,
    pub failures: RunFailures,
}

/// Performance rows whose `event_id` matches no event.
///
/// A store without a performance table has no orphans; that is recorded as
/// a schema-missing failure rather than an error.
pub fn find_orphans(conn: &Connection) -> Result<OrphanReport> {
    let mut report = OrphanReport::default();
    match SqlitePerformanceRepository::new(conn).list_orphans() {
        Ok(orphans) => report.orphans = orphans,
        Err(error) if error.is_missing_table(PERFORMANCE_TABLE) => {
            report.failures.record_schema_missing(PERFORMANCE_TABLE);
        }
        Err(error) => return Err(error),
    }

    for orphan in &report.orphans {
        tracing::warn!(
            performance_id = orphan.id,
            event_id = %orphan.event_id,
            "Performance row references a missing event"
        );
    }
    Ok(report)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdMigrationReport {
    pub sync: SyncSummary,
    pub orphans: OrphanReport,
}

impl IdMigrationReport {
    pub const fn is_clean(&self) -> bool {
        self.sync.failures.is_clean() && self.orphans.failures.is_clean()
    }
}

/// Back up the replica, clear it, rebuild it from the remote with remote ids,
/// then report orphaned performance rows.
pub fn migrate_ids(engine: &SyncEngine<'_>) -> Result<IdMigrationReport> {
    let sync = engine.run(&SyncOptions {
        mode: SyncMode::Full,
        since: None,
        dry_run: false,
    })?;
    let orphans = find_orphans(engine.local().connection())?;

    tracing::info!(
        rebuilt = sync.inserted,
        removed = sync.deleted,
        orphans = orphans.orphans.len(),
        "Id migration complete"
    );
    Ok(IdMigrationReport { sync, orphans })
}
