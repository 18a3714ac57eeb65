use eventide_core::sync::{find_orphans, OrphanReport};

use crate::commands::common::{format_failure_lines, print_json, Context};
use crate::error::CliError;

pub fn run_orphans(ctx: &Context, as_json: bool) -> Result<(), CliError> {
    let db = ctx.open_local()?;
    let report = find_orphans(db.connection())?;

    if as_json {
        return print_json(&report);
    }
    for line in format_orphan_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_orphan_lines(report: &OrphanReport) -> Vec<String> {
    let mut lines = if report.orphans.is_empty() {
        vec!["No orphaned performance rows.".to_string()]
    } else {
        let mut lines = vec![format!(
            "{} orphaned performance rows (kept for manual review):",
            report.orphans.len()
        )];
        lines.extend(report.orphans.iter().map(|orphan| {
            format!(
                "  row {} -> missing event {} (engagement {})",
                orphan.id, orphan.event_id, orphan.engagement_score
            )
        }));
        lines
    };
    if !report.failures.is_clean() {
        lines.extend(format_failure_lines(&report.failures));
    }
    lines
}
