use std::path::Path;

use eventide_core::ingest::{read_scraped_file, IngestOptions, IngestPipeline};
use eventide_core::resolver::IdentityResolver;

use crate::commands::common::{format_failure_lines, print_json, Context};
use crate::error::CliError;

pub fn run_ingest(ctx: &Context, file: &Path, dry_run: bool, as_json: bool) -> Result<(), CliError> {
    let batch = read_scraped_file(file)?;
    let pipeline = IngestPipeline::new(
        IdentityResolver::new(ctx.config.resolver_config()),
        ctx.config.invalid_filter(),
    );

    let db = ctx.open_local()?;
    let report = pipeline.run(
        &db,
        batch,
        &IngestOptions {
            dry_run,
            backup_dir: ctx.config.backup_dir.clone(),
        },
    )?;

    if as_json {
        return print_json(&report);
    }

    let verb = if report.dry_run { "Would ingest" } else { "Ingested" };
    println!(
        "{verb} {} of {} records ({} rejected), collapsing {} duplicates",
        report.inserted.len(),
        report.received,
        report.rejected,
        report.events_deleted
    );
    for decision in &report.dedup.decisions {
        println!("  {decision}");
    }
    if let Some(path) = &report.backup_path {
        println!("Backup: {}", path.display());
    }
    for line in format_failure_lines(&report.failures) {
        println!("{line}");
    }
    Ok(())
}
