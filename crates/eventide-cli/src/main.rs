//! Eventide CLI - maintain the canonical event dataset
//!
//! Ingest scraped batches, collapse duplicates, and keep the local replica
//! in step with the authoritative store.

mod cli;
mod commands;
mod error;

use clap::Parser;
use eventide_core::config::AppConfig;

use crate::cli::{Cli, Commands};
use crate::commands::common::Context;
use crate::commands::dedup::run_dedup;
use crate::commands::export::run_export;
use crate::commands::ingest::run_ingest;
use crate::commands::migrate::run_migrate_ids;
use crate::commands::orphans::run_orphans;
use crate::commands::sync::run_sync;
use crate::error::CliError;

fn main() {
    if let Err(error) = run() {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let ctx = Context::new(AppConfig::from_env()?, cli.db_path, cli.remote);

    match cli.command {
        Commands::Sync {
            mode,
            since,
            dry_run,
            json,
        } => run_sync(&ctx, mode, since.as_deref(), dry_run, json),
        Commands::Dedup {
            dry_run,
            dedupe_by,
            exact_only,
            json,
        } => run_dedup(&ctx, dry_run, dedupe_by, exact_only, json),
        Commands::Ingest {
            file,
            dry_run,
            json,
        } => run_ingest(&ctx, &file, dry_run, json),
        Commands::MigrateIds { json } => run_migrate_ids(&ctx, json),
        Commands::Orphans { json } => run_orphans(&ctx, json),
        Commands::Export {
            format,
            week,
            output,
        } => run_export(&ctx, format, week.as_deref(), output.as_deref()),
    }
}

// Logs go to stderr so --json output on stdout stays parseable.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("eventide=info,eventide_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests;
