//! Duplicate reconciliation over a whole store.
//!
//! A pass loads every event, removes scraper-failure records, clusters the
//! rest, and collapses each multi-record cluster to its policy winner while
//! carrying the best performance row over to it. Planning is pure reading;
//! the same plan is either reported (dry run) or applied in one transaction.

use std::fmt;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Serialize;

use crate::backup::backup_store;
use crate::db::{
    Database, EventRepository, PerformanceRepository, SqliteEventRepository,
    SqlitePerformanceRepository,
};
use crate::error::Result;
use crate::filter::InvalidRecordFilter;
use crate::models::{EventId, EventRecord};
use crate::policy::{ConflictPolicy, PerformanceMerge};
use crate::report::RunFailures;
use crate::resolver::IdentityResolver;

const PERFORMANCE_TABLE: &str = "event_performance";

/// Decision for one cluster of two or more records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterDecision {
    pub keep: EventId,
    pub keep_title: String,
    pub keep_priority: i64,
    pub drop: Vec<EventId>,
    pub performance: Option<PerformanceMerge>,
}

impl ClusterDecision {
    fn cluster_ids(&self) -> Vec<EventId> {
        std::iter::once(self.keep)
            .chain(self.drop.iter().copied())
            .collect()
    }
}

impl fmt::Display for ClusterDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let drop = self
            .drop
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "keep {} (priority {}) \"{}\" drop [{drop}]",
            self.keep, self.keep_priority, self.keep_title
        )?;
        if let Some(merge) = &self.performance {
            write!(
                f,
                " performance: event {} score {} -> {}",
                merge.source_event_id, merge.survivor.engagement_score, self.keep
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DedupPlan {
    /// Events loaded from the store
    pub examined: usize,
    /// Scraper-failure records to delete
    pub invalid: Vec<EventId>,
    /// Performance rows left orphaned by deleting `invalid`
    pub invalid_performance: Vec<i64>,
    pub decisions: Vec<ClusterDecision>,
    /// Problems found while planning
    pub failures: RunFailures,
}

impl DedupPlan {
    pub fn is_noop(&self) -> bool {
        self.invalid.is_empty() && self.decisions.is_empty()
    }

    /// Every event id the plan deletes
    pub fn deleted_ids(&self) -> Vec<EventId> {
        self.invalid
            .iter()
            .copied()
            .chain(self.decisions.iter().flat_map(|decision| decision.drop.iter().copied()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DedupReport {
    pub dry_run: bool,
    pub plan: DedupPlan,
    pub events_deleted: usize,
    pub performance_rows_merged: usize,
    pub backup_path: Option<PathBuf>,
}

impl DedupReport {
    pub const fn failures(&self) -> &RunFailures {
        &self.plan.failures
    }
}

#[derive(Debug, Clone, Default)]
pub struct DedupOptions {
    pub dry_run: bool,
    pub backup_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct DedupEngine {
    resolver: IdentityResolver,
    policy: ConflictPolicy,
    filter: InvalidRecordFilter,
}

impl DedupEngine {
    pub const fn new(resolver: IdentityResolver, filter: InvalidRecordFilter) -> Self {
        Self {
            resolver,
            policy: ConflictPolicy,
            filter,
        }
    }

    /// Plan, back up, and apply in one transaction (or only plan on dry run).
    pub fn run(&self, db: &Database, options: &DedupOptions) -> Result<DedupReport> {
        let plan = self.plan(db.connection())?;
        tracing::info!(
            examined = plan.examined,
            clusters = plan.decisions.len(),
            invalid = plan.invalid.len(),
            dry_run = options.dry_run,
            "Planned dedup pass"
        );

        if options.dry_run || plan.is_noop() {
            return Ok(DedupReport {
                dry_run: options.dry_run,
                plan,
                events_deleted: 0,
                performance_rows_merged: 0,
                backup_path: None,
            });
        }

        let backup_path = backup_store(db, options.backup_dir.as_deref())?;
        let tx = db.begin()?;
        let (events_deleted, performance_rows_merged) = self.apply(&tx, &plan)?;
        tx.commit()?;

        tracing::info!(events_deleted, performance_rows_merged, "Dedup pass committed");
        Ok(DedupReport {
            dry_run: false,
            plan,
            events_deleted,
            performance_rows_merged,
            backup_path,
        })
    }

    /// Read the store and decide what to delete and merge.
    pub fn plan(&self, conn: &Connection) -> Result<DedupPlan> {
        let events = SqliteEventRepository::new(conn).list_all()?;
        Ok(self.plan_records(conn, events))
    }

    fn plan_records(&self, conn: &Connection, events: Vec<EventRecord>) -> DedupPlan {
        let mut plan = DedupPlan {
            examined: events.len(),
            ..DedupPlan::default()
        };

        let (valid, invalid) = self.filter.partition(events);
        let invalid_ids: Vec<EventId> = invalid.iter().map(|record| record.id).collect();

        let performance = SqlitePerformanceRepository::new(conn);
        let mut performance_available = true;

        match performance.list_for_events(&invalid_ids) {
            Ok(rows) => {
                plan.invalid = invalid_ids;
                plan.invalid_performance = rows.iter().map(|row| row.id).collect();
            }
            Err(error) if error.is_missing_table(PERFORMANCE_TABLE) => {
                plan.failures.record_schema_missing(PERFORMANCE_TABLE);
                performance_available = false;
                plan.invalid = invalid_ids;
            }
            // Invalid records stay until their performance rows can be read
            Err(error) => {
                for record in &invalid {
                    plan.failures.record_write(record, &error);
                }
            }
        }

        for cluster in self.resolver.cluster(valid) {
            if cluster.len() < 2 {
                continue;
            }

            let cluster_ids: Vec<EventId> = cluster.iter().map(|record| record.id).collect();
            let resolution = match self.policy.resolve(cluster) {
                Ok(resolution) => resolution,
                Err(error) => {
                    plan.failures.record_ambiguous(&cluster_ids, &error);
                    continue;
                }
            };

            let merge = if performance_available {
                match performance.list_for_events(&resolution.cluster_ids()) {
                    Ok(rows) => self.policy.merge_performance(&resolution, &rows),
                    Err(error) if error.is_missing_table(PERFORMANCE_TABLE) => {
                        plan.failures.record_schema_missing(PERFORMANCE_TABLE);
                        performance_available = false;
                        None
                    }
                    Err(error) => {
                        // Unresolved: the cluster's rows cannot be merged
                        plan.failures.record_write(&resolution.keep, &error);
                        continue;
                    }
                }
            } else {
                None
            };

            plan.decisions.push(ClusterDecision {
                keep: resolution.keep.id,
                keep_title: resolution.keep.title.clone(),
                keep_priority: resolution.keep.priority,
                drop: resolution.drop_ids(),
                performance: merge,
            });
        }

        plan
    }

    /// Apply a plan. Any error aborts; the caller's transaction rolls back.
    ///
    /// Returns `(events_deleted, performance_rows_merged)`.
    pub fn apply(&self, conn: &Connection, plan: &DedupPlan) -> Result<(usize, usize)> {
        let events = SqliteEventRepository::new(conn);
        let performance = SqlitePerformanceRepository::new(conn);
        let mut events_deleted = 0;
        let mut performance_rows_merged = 0;

        for decision in &plan.decisions {
            if let Some(merge) = &decision.performance {
                performance.delete_for_events(&decision.cluster_ids())?;
                performance.insert(&merge.survivor)?;
                performance_rows_merged += merge.removed.len();
            }
            for id in &decision.drop {
                events.delete(*id)?;
                events_deleted += 1;
            }
            tracing::debug!(keep = %decision.keep, dropped = decision.drop.len(), "Collapsed cluster");
        }

        for id in &plan.invalid {
            events.delete(*id)?;
            events_deleted += 1;
        }

        Ok((events_deleted, performance_rows_merged))
    }
}
