use std::path::{Path, PathBuf};

use clap::Parser;
use eventide_core::config::AppConfig;
use eventide_core::db::{Database, EventRepository, SqliteEventRepository};
use eventide_core::EventId;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::cli::{Cli, Commands, DedupeByArg, ExportFormatArg, SyncModeArg};
use crate::commands::common::{
    format_dedup_lines, normalize_week, parse_since, resolve_db_path, Context,
};
use crate::commands::dedup::run_dedup;
use crate::commands::export::run_export;
use crate::commands::ingest::run_ingest;
use crate::commands::orphans::format_orphan_lines;
use crate::commands::sync::run_sync;
use crate::error::CliError;

const BATCH: &str = r#"[
    {"title": "SF Jazz Festival Night", "start_time": "2024-03-06T19:00:00Z",
     "location": "SFJAZZ Center", "original_url": "https://x.test/e1",
     "source": "sfstation", "priority": 5, "scraped_at": "2024-03-01T10:00:00Z"},
    {"title": "SF Jazz Festival Night", "start_time": "2024-03-06T19:00:00Z",
     "location": "SFJAZZ Center", "original_url": "https://x.test/e1",
     "source": "eventbrite", "priority": 10, "scraped_at": "2024-03-01T09:00:00Z"},
    {"title": "www.sfstation.com", "start_time": "2024-03-07T19:00:00Z",
     "original_url": "https://x.test/broken", "source": "sfstation",
     "scraped_at": "2024-03-01T10:00:00Z"},
    {"title": "Poetry Slam", "start_time": "2024-03-12T19:00:00Z",
     "location": "Bird & Beckett", "original_url": "https://x.test/e2",
     "source": "funcheap", "scraped_at": "2024-03-01T10:00:00Z"}
]"#;

fn context(db_path: &Path, remote: Option<&Path>) -> Context {
    Context::new(
        AppConfig::default(),
        Some(db_path.to_path_buf()),
        remote.map(|path| path.display().to_string()),
    )
}

fn ingest_batch(ctx: &Context, dir: &Path) {
    let file = dir.join("batch.json");
    std::fs::write(&file, BATCH).unwrap();
    run_ingest(ctx, &file, false, false).unwrap();
}

fn stored_ids(path: &Path) -> Vec<EventId> {
    let db = Database::open_read_only(path).unwrap();
    SqliteEventRepository::new(db.connection()).ids().unwrap()
}

#[test]
fn cli_db_path_wins_over_config() {
    let config = AppConfig {
        db_path: Some(PathBuf::from("/env/events.db")),
        ..AppConfig::default()
    };
    assert_eq!(
        resolve_db_path(Some(PathBuf::from("/flag/events.db")), &config),
        PathBuf::from("/flag/events.db")
    );
    assert_eq!(
        resolve_db_path(None, &config),
        PathBuf::from("/env/events.db")
    );
    assert!(resolve_db_path(None, &AppConfig::default()).ends_with("eventide/events.db"));
}

#[test]
fn parse_since_accepts_rfc3339_and_dates() {
    assert_eq!(
        parse_since("2024-01-02").unwrap().to_rfc3339(),
        "2024-01-02T00:00:00+00:00"
    );
    assert_eq!(
        parse_since("2024-01-02T03:04:05-08:00").unwrap().to_rfc3339(),
        "2024-01-02T11:04:05+00:00"
    );
    assert!(matches!(
        parse_since("last week"),
        Err(CliError::InvalidSince(_))
    ));
}

#[test]
fn normalize_week_requires_two_dates() {
    assert_eq!(
        normalize_week(" 2024-03-04_to_2024-03-10 ").unwrap(),
        "2024-03-04_to_2024-03-10"
    );
    assert!(normalize_week("2024-03-04").is_err());
    assert!(normalize_week("2024-03-04_to_soon").is_err());
}

#[test]
fn parses_sync_flags() {
    let cli = Cli::try_parse_from([
        "eventide",
        "--db-path",
        "/tmp/local.db",
        "sync",
        "--mode",
        "diff",
        "--dry-run",
    ])
    .unwrap();

    assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/local.db")));
    match cli.command {
        Commands::Sync { mode, dry_run, .. } => {
            assert_eq!(mode, SyncModeArg::Diff);
            assert!(dry_run);
        }
        _ => panic!("expected sync command"),
    }
}

#[test]
fn parses_dedupe_by_with_either_spelling() {
    for spelling in ["normalized-title", "normalized_title"] {
        let cli =
            Cli::try_parse_from(["eventide", "dedup", "--dedupe-by", spelling]).unwrap();
        match cli.command {
            Commands::Dedup { dedupe_by, .. } => {
                assert_eq!(dedupe_by, DedupeByArg::NormalizedTitle);
            }
            _ => panic!("expected dedup command"),
        }
    }
    assert!(Cli::try_parse_from(["eventide", "sync", "--mode", "mirror"]).is_err());
}

#[test]
fn ingest_filters_and_collapses_batch() {
    let tmp = tempdir().unwrap();
    let store = tmp.path().join("remote.db");
    let ctx = context(&store, None);

    ingest_batch(&ctx, tmp.path());

    let db = Database::open_read_only(&store).unwrap();
    let events = SqliteEventRepository::new(db.connection()).list_all().unwrap();
    assert_eq!(events.len(), 2);
    let jazz = events
        .iter()
        .find(|event| event.original_url == "https://x.test/e1")
        .unwrap();
    assert_eq!(jazz.priority, 10);
}

#[test]
fn sync_from_file_remote_preserves_ids() {
    let tmp = tempdir().unwrap();
    let remote_path = tmp.path().join("remote.db");
    ingest_batch(&context(&remote_path, None), tmp.path());

    let local_path = tmp.path().join("local.db");
    let ctx = context(&local_path, Some(&remote_path));
    run_sync(&ctx, SyncModeArg::Diff, None, false, true).unwrap();

    assert_eq!(stored_ids(&local_path), stored_ids(&remote_path));
}

#[test]
fn sync_dry_run_leaves_local_store_empty() {
    let tmp = tempdir().unwrap();
    let remote_path = tmp.path().join("remote.db");
    ingest_batch(&context(&remote_path, None), tmp.path());

    let local_path = tmp.path().join("local.db");
    let ctx = context(&local_path, Some(&remote_path));
    run_sync(&ctx, SyncModeArg::Full, None, true, false).unwrap();

    assert!(!local_path.exists());
}

#[test]
fn failed_fetch_does_not_create_local_store() {
    let tmp = tempdir().unwrap();
    let remote_path = tmp.path().join("remote.db");
    std::fs::write(&remote_path, b"").unwrap();

    let local_path = tmp.path().join("local.db");
    let ctx = context(&local_path, Some(&remote_path));
    let error = run_sync(&ctx, SyncModeArg::Full, None, false, false).unwrap_err();

    assert!(error.to_string().contains("Remote fetch failed"));
    assert!(!local_path.exists());
}

#[test]
fn sync_with_missing_remote_fails() {
    let tmp = tempdir().unwrap();
    let ctx = context(
        &tmp.path().join("local.db"),
        Some(&tmp.path().join("absent.db")),
    );

    let error = run_sync(&ctx, SyncModeArg::Incremental, None, false, false).unwrap_err();
    assert!(error.to_string().contains("Remote fetch failed"));
}

#[test]
fn sync_without_remote_reports_missing_config() {
    let tmp = tempdir().unwrap();
    let ctx = context(&tmp.path().join("local.db"), None);

    let error = run_sync(&ctx, SyncModeArg::Incremental, None, false, false).unwrap_err();
    assert!(error.to_string().contains("EVENTIDE_REMOTE"));
}

#[test]
fn dedup_dry_run_reports_without_deleting() {
    let tmp = tempdir().unwrap();
    let store = tmp.path().join("events.db");
    {
        let db = Database::open(&store).unwrap();
        let repo = SqliteEventRepository::new(db.connection());
        let file = tmp.path().join("batch.json");
        std::fs::write(&file, BATCH).unwrap();
        let batch = eventide_core::ingest::read_scraped_file(&file).unwrap();
        for (index, raw) in batch.into_iter().enumerate() {
            let id = i64::try_from(index).unwrap() + 1;
            repo.insert(&raw.into_record(EventId::new(id))).unwrap();
        }
    }

    run_dedup(
        &context(&store, None),
        true,
        DedupeByArg::OriginalUrl,
        false,
        false,
    )
    .unwrap();
    assert_eq!(stored_ids(&store).len(), 4);

    run_dedup(
        &context(&store, None),
        false,
        DedupeByArg::OriginalUrl,
        false,
        true,
    )
    .unwrap();
    assert_eq!(stored_ids(&store), vec![EventId::new(2), EventId::new(4)]);
}

#[test]
fn dedup_lines_describe_noop_store() {
    let db = Database::open_in_memory().unwrap();
    let report = eventide_core::dedup::DedupEngine::default()
        .run(&db, &eventide_core::dedup::DedupOptions::default())
        .unwrap();

    let lines = format_dedup_lines(&report);
    assert_eq!(lines[0], "No duplicates among 0 events.");
    assert_eq!(lines[1], "Failures: write=0 schema_missing=0 ambiguous=0");
}

#[test]
fn export_writes_week_filtered_markdown() {
    let tmp = tempdir().unwrap();
    let store = tmp.path().join("events.db");
    let ctx = context(&store, None);
    ingest_batch(&ctx, tmp.path());

    let output = tmp.path().join("week.md");
    run_export(
        &ctx,
        ExportFormatArg::Markdown,
        Some("2024-03-04_to_2024-03-10"),
        Some(&output),
    )
    .unwrap();

    let rendered = std::fs::read_to_string(&output).unwrap();
    assert!(rendered.contains("# SF Jazz Festival Night"));
    assert!(!rendered.contains("Poetry Slam"));
}

#[test]
fn export_into_directory_uses_suggested_file_name() {
    let tmp = tempdir().unwrap();
    let store = tmp.path().join("events.db");
    let ctx = context(&store, None);
    ingest_batch(&ctx, tmp.path());

    let out_dir = tmp.path().join("out");
    std::fs::create_dir(&out_dir).unwrap();
    run_export(
        &ctx,
        ExportFormatArg::Json,
        Some("2024-03-04_to_2024-03-10"),
        Some(&out_dir),
    )
    .unwrap();

    assert!(out_dir
        .join("eventide-2024-03-04_to_2024-03-10.json")
        .is_file());
}

#[test]
fn orphan_lines_report_empty_store() {
    let db = Database::open_in_memory().unwrap();
    let report = eventide_core::sync::find_orphans(db.connection()).unwrap();
    assert_eq!(
        format_orphan_lines(&report),
        vec!["No orphaned performance rows.".to_string()]
    );
}
