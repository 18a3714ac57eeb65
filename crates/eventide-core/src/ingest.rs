//! Ingest of scraped records into the authoritative store.
//!
//! This is the only path that allocates event ids. A batch is filtered,
//! inserted and reconciled against the existing dataset in one transaction;
//! a dry run executes the same steps and rolls them back.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::backup::backup_store;
use crate::db::{Database, EventRepository, SqliteEventRepository};
use crate::dedup::{DedupEngine, DedupPlan};
use crate::error::{Error, Result};
use crate::filter::InvalidRecordFilter;
use crate::models::{EventId, EventRecord, ScrapedEvent};
use crate::report::RunFailures;
use crate::resolver::IdentityResolver;

/// Read a JSON array of scraped records.
pub fn read_scraped_file(path: &Path) -> Result<Vec<ScrapedEvent>> {
    let file = std::fs::File::open(path).map_err(|error| {
        Error::InvalidInput(format!("cannot read {}: {error}", path.display()))
    })?;
    let records = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(records)
}

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub dry_run: bool,
    pub backup_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub dry_run: bool,
    pub received: usize,
    /// Scraper-failure records dropped before insert
    pub rejected: usize,
    /// Ids allocated to the inserted records
    pub inserted: Vec<EventId>,
    pub dedup: DedupPlan,
    pub events_deleted: usize,
    pub failures: RunFailures,
    pub backup_path: Option<PathBuf>,
}

pub struct IngestPipeline {
    filter: InvalidRecordFilter,
    dedup: DedupEngine,
}

impl IngestPipeline {
    pub fn new(resolver: IdentityResolver, filter: InvalidRecordFilter) -> Self {
        Self {
            dedup: DedupEngine::new(resolver, filter.clone()),
            filter,
        }
    }

    pub fn run(
        &self,
        db: &Database,
        batch: Vec<ScrapedEvent>,
        options: &IngestOptions,
    ) -> Result<IngestReport> {
        let received = batch.len();
        let records: Vec<EventRecord> = batch
            .into_iter()
            .map(|raw| raw.into_record(EventId::new(0)))
            .collect();
        let (valid, invalid) = self.filter.partition(records);

        let backup_path = if options.dry_run
            || SqliteEventRepository::new(db.connection()).count()? == 0
        {
            None
        } else {
            backup_store(db, options.backup_dir.as_deref())?
        };

        let tx = db.begin()?;
        let mut failures = RunFailures::default();
        let mut inserted = Vec::with_capacity(valid.len());
        for record in &valid {
            match insert_allocating(&tx, record) {
                Ok(id) => inserted.push(id),
                Err(error) => failures.record_write(record, &error),
            }
        }

        let dedup = self.dedup.plan(&tx)?;
        let (events_deleted, _) = self.dedup.apply(&tx, &dedup)?;

        if options.dry_run {
            tx.rollback()?;
        } else {
            tx.commit()?;
        }

        tracing::info!(
            received,
            rejected = invalid.len(),
            inserted = inserted.len(),
            events_deleted,
            dry_run = options.dry_run,
            "Ingested scraped batch"
        );

        Ok(IngestReport {
            dry_run: options.dry_run,
            received,
            rejected: invalid.len(),
            inserted,
            dedup,
            events_deleted,
            failures,
            backup_path,
        })
    }
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::new(IdentityResolver::default(), InvalidRecordFilter::default())
    }
}

/// Insert letting the store assign the id.
fn insert_allocating(conn: &Connection, record: &EventRecord) -> Result<EventId> {
    conn.execute(
        "INSERT INTO events (
            title, normalized_title, start_time, end_time, location, price,
            description, description_detail, original_url, short_url, source,
            event_type, priority, scraped_at, week_identifier
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            record.title,
            record.normalized_title,
            record.start_time,
            record.end_time,
            record.location,
            record.price,
            record.description,
            record.description_detail,
            record.original_url,
            record.short_url,
            record.source,
            record.event_type,
            record.priority,
            record.scraped_at.timestamp_millis(),
            record.week_identifier,
        ],
    )?;
    Ok(EventId::new(conn.last_insert_rowid()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::at;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn raw(title: &str, url: &str, priority: i64) -> ScrapedEvent {
        ScrapedEvent {
            title: title.to_string(),
            start_time: "2024-03-06T19:00:00Z".to_string(),
            end_time: None,
            location: "SFJAZZ Center".to_string(),
            price: "$25".to_string(),
            description: None,
            description_detail: None,
            original_url: url.to_string(),
            short_url: None,
            source: "test".to_string(),
            event_type: None,
            priority: Some(priority),
            scraped_at: at("2024-03-01T12:00:00Z"),
            week_identifier: None,
        }
    }

    #[test]
    fn allocates_ids_filters_and_collapses_duplicates() {
        let db = Database::open_in_memory().unwrap();
        let batch = vec![
            raw("Jazz Night", "https://x.test/e1", 0),
            raw("eventbrite.com", "https://x.test/broken", 0),
            raw("Jazz Night", "https://x.test/e1", 10),
            raw("Poetry Slam", "https://x.test/e2", 0),
        ];

        let report = IngestPipeline::default()
            .run(&db, batch, &IngestOptions::default())
            .unwrap();

        assert_eq!(report.received, 4);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.inserted.len(), 3);
        assert_eq!(report.events_deleted, 1);

        let stored = SqliteEventRepository::new(db.connection()).list_all().unwrap();
        assert_eq!(stored.len(), 2);
        let jazz = stored.iter().find(|record| record.title == "Jazz Night").unwrap();
        assert_eq!(jazz.priority, 10);
        assert_eq!(jazz.week_identifier, "2024-03-04_to_2024-03-10");
    }

    #[test]
    fn rescrape_of_existing_url_keeps_one_record() {
        let db = Database::open_in_memory().unwrap();
        let pipeline = IngestPipeline::default();
        pipeline
            .run(&db, vec![raw("Jazz Night", "https://x.test/e1", 5)], &IngestOptions::default())
            .unwrap();
        pipeline
            .run(&db, vec![raw("Jazz Night", "https://x.test/e1", 5)], &IngestOptions::default())
            .unwrap();

        let ids = SqliteEventRepository::new(db.connection()).ids().unwrap();
        assert_eq!(ids, vec![EventId::new(1)]);
    }

    #[test]
    fn dry_run_rolls_back_and_matches_live_plan() {
        let db = Database::open_in_memory().unwrap();
        let batch = vec![
            raw("Jazz Night", "https://x.test/e1", 0),
            raw("Jazz Night", "https://x.test/e1", 3),
        ];
        let pipeline = IngestPipeline::default();

        let preview = pipeline
            .run(
                &db,
                batch.clone(),
                &IngestOptions {
                    dry_run: true,
                    backup_dir: None,
                },
            )
            .unwrap();
        assert_eq!(SqliteEventRepository::new(db.connection()).count().unwrap(), 0);

        let live = pipeline.run(&db, batch, &IngestOptions::default()).unwrap();
        assert_eq!(preview.inserted, live.inserted);
        assert_eq!(preview.dedup, live.dedup);
    }

    #[test]
    fn backs_up_non_empty_store() {
        let tmp = tempdir().unwrap();
        let db = Database::open(tmp.path().join("remote.db")).unwrap();
        let pipeline = IngestPipeline::default();

        let first = pipeline
            .run(&db, vec![raw("A", "https://x.test/a", 0)], &IngestOptions::default())
            .unwrap();
        assert_eq!(first.backup_path, None);

        let second = pipeline
            .run(&db, vec![raw("B", "https://x.test/b", 0)], &IngestOptions::default())
            .unwrap();
        assert!(second.backup_path.unwrap().exists());
    }

    #[test]
    fn reads_json_array_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("batch.json");
        std::fs::write(
            &path,
            r#"[{"title": "Jazz", "start_time": "2024-03-06T19:00:00Z",
                 "original_url": "https://x.test/e1", "source": "sfstation",
                 "scraped_at": "2024-03-01T12:00:00Z"}]"#,
        )
        .unwrap();

        let batch = read_scraped_file(&path).unwrap();
        assert_eq!(batch.len(), 1);
        assert!(read_scraped_file(&tmp.path().join("missing.json")).is_err());
    }
}
