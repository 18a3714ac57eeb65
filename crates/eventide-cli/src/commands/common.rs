use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use eventide_core::config::AppConfig;
use eventide_core::db::Database;
use eventide_core::dedup::DedupReport;
use eventide_core::report::RunFailures;
use eventide_core::sync::SyncSummary;
use serde::Serialize;

use crate::error::CliError;

/// Everything a command needs from flags and the environment
pub struct Context {
    pub config: AppConfig,
    pub db_path: PathBuf,
    pub remote: Option<String>,
}

impl Context {
    pub fn new(config: AppConfig, cli_db_path: Option<PathBuf>, remote: Option<String>) -> Self {
        let db_path = resolve_db_path(cli_db_path, &config);
        Self {
            config,
            db_path,
            remote,
        }
    }

    pub fn open_local(&self) -> Result<Database, CliError> {
        Ok(Database::open(&self.db_path)?)
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>, config: &AppConfig) -> PathBuf {
    cli_db_path
        .or_else(|| config.db_path.clone())
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eventide")
        .join("events.db")
}

/// Accepts RFC 3339 or a bare date (midnight UTC).
pub fn parse_since(raw: &str) -> Result<DateTime<Utc>, CliError> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| CliError::InvalidSince(raw.to_string()))
}

pub fn normalize_week(raw: &str) -> Result<String, CliError> {
    let trimmed = raw.trim();
    let valid = trimmed.split_once("_to_").is_some_and(|(start, end)| {
        NaiveDate::parse_from_str(start, "%Y-%m-%d").is_ok()
            && NaiveDate::parse_from_str(end, "%Y-%m-%d").is_ok()
    });
    if valid {
        Ok(trimmed.to_string())
    } else {
        Err(CliError::InvalidWeek(raw.to_string()))
    }
}

pub fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn write_output(rendered: &str, output_path: Option<&Path>) -> Result<(), CliError> {
    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }
    Ok(())
}

pub fn format_failure_lines(failures: &RunFailures) -> Vec<String> {
    let mut lines = vec![format!("Failures: {}", failures.summary_line())];
    for failure in &failures.details {
        let subject = match (&failure.event_id, &failure.title) {
            (Some(id), Some(title)) => format!("{id} \"{title}\""),
            (Some(id), None) => id.to_string(),
            _ => "-".to_string(),
        };
        lines.push(format!("  [{:?}] {subject}: {}", failure.category, failure.message));
    }
    lines
}

pub fn format_sync_lines(summary: &SyncSummary) -> Vec<String> {
    let verb = if summary.dry_run { "Planned" } else { "Applied" };
    let mut lines = vec![format!(
        "{verb} {} sync from {}: fetched={} inserted={} updated={} unchanged={} deleted={}",
        summary.mode,
        summary.source,
        summary.fetched,
        summary.inserted,
        summary.updated,
        summary.unchanged,
        summary.deleted
    )];
    if summary.dry_run {
        lines.extend(summary.ops.iter().map(|op| format!("  {op}")));
    }
    if let Some(path) = &summary.backup_path {
        lines.push(format!("Backup: {}", path.display()));
    }
    lines.extend(format_failure_lines(&summary.failures));
    lines
}

pub fn format_dedup_lines(report: &DedupReport) -> Vec<String> {
    let plan = &report.plan;
    let mut lines = Vec::new();
    if plan.is_noop() {
        lines.push(format!("No duplicates among {} events.", plan.examined));
    } else {
        let verb = if report.dry_run { "Would collapse" } else { "Collapsed" };
        lines.push(format!(
            "{verb} {} clusters and remove {} invalid records ({} events examined)",
            plan.decisions.len(),
            plan.invalid.len(),
            plan.examined
        ));
    }
    lines.extend(plan.decisions.iter().map(|decision| format!("  {decision}")));
    if !plan.invalid.is_empty() {
        let ids = plan
            .invalid
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("  invalid [{ids}]"));
    }
    if !plan.invalid_performance.is_empty() {
        let ids = plan
            .invalid_performance
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("  orphaned performance rows [{ids}]"));
    }
    if let Some(path) = &report.backup_path {
        lines.push(format!("Backup: {}", path.display()));
    }
    lines.extend(format_failure_lines(report.failures()));
    lines
}
