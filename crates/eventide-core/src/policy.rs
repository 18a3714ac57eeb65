//! Conflict resolution policy for a cluster of duplicate records.

use std::cmp::Ordering;

use serde::Serialize;
use thiserror::Error;

use crate::models::{EventId, EventRecord, PerformanceRecord};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("cannot resolve an empty cluster")]
    EmptyCluster,
    #[error("cluster cannot be ordered: events {0:?} tie on priority, scraped_at and id")]
    Ambiguous(Vec<EventId>),
}

/// Outcome for one cluster: the surviving record and the records to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub keep: EventRecord,
    pub drop: Vec<EventRecord>,
}

impl Resolution {
    pub fn drop_ids(&self) -> Vec<EventId> {
        self.drop.iter().map(|record| record.id).collect()
    }

    /// Ids of every record in the cluster, survivor first.
    pub fn cluster_ids(&self) -> Vec<EventId> {
        std::iter::once(self.keep.id)
            .chain(self.drop.iter().map(|record| record.id))
            .collect()
    }
}

/// Performance rows to rewrite so exactly one survives for the kept event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMerge {
    /// Row ids deleted across the whole cluster
    pub removed: Vec<i64>,
    /// Reinserted row, bound to the kept event
    pub survivor: PerformanceRecord,
    /// Event the survivor's metrics originally belonged to
    pub source_event_id: EventId,
}

/// Deterministic winner selection:
/// highest `priority`, then latest `scraped_at`, then smallest `id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictPolicy;

impl ConflictPolicy {
    /// Order two records so the preferred one sorts first.
    pub fn preference(left: &EventRecord, right: &EventRecord) -> Ordering {
        right
            .priority
            .cmp(&left.priority)
            .then_with(|| right.scraped_at.cmp(&left.scraped_at))
            .then_with(|| left.id.cmp(&right.id))
    }

    pub fn resolve(&self, cluster: Vec<EventRecord>) -> Result<Resolution, PolicyError> {
        let mut cluster = cluster;
        match cluster.len() {
            0 => return Err(PolicyError::EmptyCluster),
            1 => {
                let keep = cluster.remove(0);
                return Ok(Resolution {
                    keep,
                    drop: Vec::new(),
                });
            }
            _ => {}
        }

        cluster.sort_by(Self::preference);
        if Self::preference(&cluster[0], &cluster[1]) == Ordering::Equal {
            let tied = cluster
                .iter()
                .take_while(|record| Self::preference(&cluster[0], record) == Ordering::Equal)
                .map(|record| record.id)
                .collect();
            return Err(PolicyError::Ambiguous(tied));
        }

        let keep = cluster.remove(0);
        Ok(Resolution {
            keep,
            drop: cluster,
        })
    }

    /// Pick the performance row to carry over: maximum `engagement_score`,
    /// ties broken by the largest `event_id`, then the largest row id.
    pub fn select_performance<'a>(
        &self,
        rows: &'a [PerformanceRecord],
    ) -> Option<&'a PerformanceRecord> {
        rows.iter().max_by(|left, right| {
            left.engagement_score
                .total_cmp(&right.engagement_score)
                .then_with(|| left.event_id.cmp(&right.event_id))
                .then_with(|| left.id.cmp(&right.id))
        })
    }

    /// Plan the performance merge for a resolved cluster.
    ///
    /// `rows` are every performance row bound to any id in the cluster.
    /// Returns `None` when the cluster has no performance data.
    pub fn merge_performance(
        &self,
        resolution: &Resolution,
        rows: &[PerformanceRecord],
    ) -> Option<PerformanceMerge> {
        let chosen = self.select_performance(rows)?;
        Some(PerformanceMerge {
            removed: rows.iter().map(|row| row.id).collect(),
            survivor: chosen.rebound_to(resolution.keep.id),
            source_event_id: chosen.event_id,
        })
    }
}
