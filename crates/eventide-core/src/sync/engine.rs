//! Replica sync engine.
//!
//! A run fetches from the authoritative store, computes one ordered
//! [`SyncPlan`] against the local replica, and then either reports that plan
//! (dry run) or applies exactly it inside one transaction. Local rows always
//! take the remote id verbatim.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use super::remote::RemoteStore;
use crate::backup::backup_store;
use crate::db::{Database, EventRepository, SqliteEventRepository};
use crate::error::Result;
use crate::models::{EventId, EventRecord};
use crate::report::RunFailures;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Pull rows newer than the local watermark; never delete
    #[default]
    Incremental,
    /// Delete every local row, then pull everything
    Full,
    /// Pull everything, then delete local rows the remote no longer has
    Diff,
}

impl SyncMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Incremental => "incremental",
            Self::Full => "full",
            Self::Diff => "diff",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" => Ok(Self::Incremental),
            "full" => Ok(Self::Full),
            "diff" => Ok(Self::Diff),
            other => Err(format!(
                "unknown sync mode '{other}' (expected incremental, full or diff)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub mode: SyncMode,
    /// Watermark override for incremental runs
    pub since: Option<DateTime<Utc>>,
    pub dry_run: bool,
}

/// One write the engine performs, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SyncOp {
    Insert { id: EventId, title: String },
    Update { id: EventId, title: String },
    Delete { id: EventId },
}

impl fmt::Display for SyncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert { id, title } => write!(f, "insert {id} \"{title}\""),
            Self::Update { id, title } => write!(f, "update {id} \"{title}\""),
            Self::Delete { id } => write!(f, "delete {id}"),
        }
    }
}

#[derive(Debug, Clone)]
enum Step {
    Insert(EventRecord),
    Update(EventRecord),
    Delete(EventId),
}

impl Step {
    fn op(&self) -> SyncOp {
        match self {
            Self::Insert(record) => SyncOp::Insert {
                id: record.id,
                title: record.title.clone(),
            },
            Self::Update(record) => SyncOp::Update {
                id: record.id,
                title: record.title.clone(),
            },
            Self::Delete(id) => SyncOp::Delete { id: *id },
        }
    }
}

/// Ordered writes that bring the local replica in line with a fetch.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub mode: SyncMode,
    /// Watermark the fetch was bounded by
    pub since: Option<DateTime<Utc>>,
    pub fetched: usize,
    /// Fetched rows already identical locally
    pub unchanged: usize,
    steps: Vec<Step>,
}

impl SyncPlan {
    pub fn ops(&self) -> Vec<SyncOp> {
        self.steps.iter().map(Step::op).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn has_deletes(&self) -> bool {
        self.steps.iter().any(|step| matches!(step, Step::Delete(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSummary {
    pub mode: SyncMode,
    pub dry_run: bool,
    pub source: String,
    pub since: Option<DateTime<Utc>>,
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    /// Planned operations on a dry run; attempted operations otherwise
    pub ops: Vec<SyncOp>,
    pub failures: RunFailures,
    pub backup_path: Option<PathBuf>,
}

impl SyncSummary {
    pub const fn is_clean(&self) -> bool {
        self.failures.is_clean()
    }
}

pub struct SyncEngine<'a> {
    remote: &'a dyn RemoteStore,
    local: &'a Database,
    backup_dir: Option<PathBuf>,
}

impl<'a> SyncEngine<'a> {
    pub fn new(remote: &'a dyn RemoteStore, local: &'a Database) -> Self {
        Self {
            remote,
            local,
            backup_dir: None,
        }
    }

    pub const fn local(&self) -> &'a Database {
        self.local
    }

    #[must_use]
    pub fn with_backup_dir(mut self, backup_dir: Option<PathBuf>) -> Self {
        self.backup_dir = backup_dir;
        self
    }

    /// Fetch and compute the writes a run would perform.
    ///
    /// Fails only when the fetch or the local read fails; nothing is written.
    pub fn plan(&self, options: &SyncOptions) -> Result<SyncPlan> {
        let local = SqliteEventRepository::new(self.local.connection());
        let since = match options.mode {
            SyncMode::Incremental => match options.since {
                Some(since) => Some(since),
                None => local.max_scraped_at()?,
            },
            SyncMode::Full | SyncMode::Diff => None,
        };

        tracing::info!(
            mode = %options.mode,
            remote = %self.remote.describe(),
            since = ?since,
            "Fetching remote events"
        );
        let remote_events = self.remote.fetch_events(since)?;
        let fetched = remote_events.len();

        let mut steps = Vec::new();
        let mut unchanged = 0;

        match options.mode {
            SyncMode::Full => {
                steps.extend(local.ids()?.into_iter().map(Step::Delete));
                steps.extend(remote_events.into_iter().map(Step::Insert));
            }
            SyncMode::Incremental | SyncMode::Diff => {
                let mut existing: HashMap<EventId, EventRecord> = local
                    .list_all()?
                    .into_iter()
                    .map(|record| (record.id, record))
                    .collect();
                let remote_ids: HashSet<EventId> =
                    remote_events.iter().map(|record| record.id).collect();

                for record in remote_events {
                    match existing.get(&record.id) {
                        Some(current) if current.same_content(&record) => unchanged += 1,
                        Some(_) => steps.push(Step::Update(record)),
                        None => steps.push(Step::Insert(record)),
                    }
                }

                if options.mode == SyncMode::Diff {
                    existing.retain(|id, _| !remote_ids.contains(id));
                    let mut stale: Vec<EventId> = existing.into_keys().collect();
                    stale.sort_unstable();
                    steps.extend(stale.into_iter().map(Step::Delete));
                }
            }
        }

        Ok(SyncPlan {
            mode: options.mode,
            since,
            fetched,
            unchanged,
            steps,
        })
    }

    /// Plan, then apply unless `dry_run`.
    ///
    /// A fetch failure aborts before anything is written. Per-record write
    /// failures are tallied and the batch continues.
    pub fn run(&self, options: &SyncOptions) -> Result<SyncSummary> {
        let plan = self.plan(options)?;
        self.execute(&plan, options.dry_run)
    }

    /// Report or apply an already computed plan against this engine's store.
    pub fn execute(&self, plan: &SyncPlan, dry_run: bool) -> Result<SyncSummary> {
        if dry_run {
            let summary = self.summary(plan, true, Applied::planned(plan), None);
            tracing::info!(
                mode = %plan.mode,
                planned = summary.ops.len(),
                "Dry run: no changes written"
            );
            return Ok(summary);
        }

        let backup_path = if plan.has_deletes() {
            backup_store(self.local, self.backup_dir.as_deref())?
        } else {
            None
        };

        let tx = self.local.begin()?;
        let applied = apply(&tx, plan);
        tx.commit()?;

        let summary = self.summary(plan, false, applied, backup_path);
        tracing::info!(
            mode = %summary.mode,
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            unchanged = summary.unchanged,
            failures = summary.failures.total(),
            "Sync complete"
        );
        Ok(summary)
    }

    fn summary(
        &self,
        plan: &SyncPlan,
        dry_run: bool,
        applied: Applied,
        backup_path: Option<PathBuf>,
    ) -> SyncSummary {
        SyncSummary {
            mode: plan.mode,
            dry_run,
            source: self.remote.describe(),
            since: plan.since,
            fetched: plan.fetched,
            inserted: applied.inserted,
            updated: applied.updated,
            unchanged: plan.unchanged,
            deleted: applied.deleted,
            ops: applied.ops,
            failures: applied.failures,
            backup_path,
        }
    }
}

/// Counts of writes that succeeded, or would be made on a dry run
#[derive(Debug, Default)]
struct Applied {
    ops: Vec<SyncOp>,
    inserted: usize,
    updated: usize,
    deleted: usize,
    failures: RunFailures,
}

impl Applied {
    fn planned(plan: &SyncPlan) -> Self {
        let mut applied = Self::default();
        for step in &plan.steps {
            applied.record(step);
        }
        applied
    }

    fn record(&mut self, step: &Step) {
        self.ops.push(step.op());
        match step {
            Step::Insert(_) => self.inserted += 1,
            Step::Update(_) => self.updated += 1,
            Step::Delete(_) => self.deleted += 1,
        }
    }
}

/// Execute every step in order, recording failures instead of stopping.
fn apply(conn: &Connection, plan: &SyncPlan) -> Applied {
    let repo = SqliteEventRepository::new(conn);
    let mut applied = Applied::default();

    for step in &plan.steps {
        let outcome = match step {
            Step::Insert(record) => repo.insert(record),
            Step::Update(record) => repo.update(record),
            Step::Delete(id) => repo.delete(*id),
        };

        match outcome {
            Ok(()) => applied.record(step),
            Err(error) => {
                applied.ops.push(step.op());
                match step {
                    Step::Insert(record) | Step::Update(record) => {
                        applied.failures.record_write(record, &error);
                    }
                    Step::Delete(id) => applied.failures.record_write_id(*id, &error),
                }
            }
        }
    }

    applied
}
