use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "eventide")]
#[command(about = "Keep the canonical event dataset de-duplicated and in sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the local store file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Authoritative store: a SQLite file path or a libsql:// / https:// URL
    #[arg(long, global = true, value_name = "PATH|URL")]
    pub remote: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pull canonical events from the authoritative store into the local replica
    Sync {
        /// Sync strategy
        #[arg(long, value_enum, default_value_t = SyncModeArg::Incremental)]
        mode: SyncModeArg,
        /// Override the local watermark (RFC 3339 or YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        since: Option<String>,
        /// Print the planned inserts/updates/deletes without writing
        #[arg(long)]
        dry_run: bool,
        /// Output the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Collapse duplicate events in the local store
    Dedup {
        /// Preview clusters and keep/drop decisions without deleting
        #[arg(long)]
        dry_run: bool,
        /// Field used for exact matching
        #[arg(long, value_enum, default_value_t = DedupeByArg::OriginalUrl)]
        dedupe_by: DedupeByArg,
        /// Skip fuzzy title/location matching
        #[arg(long)]
        exact_only: bool,
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Insert a JSON array of scraped events, allocating ids, then dedup
    Ingest {
        /// Scraper output file
        file: PathBuf,
        /// Report what would change and roll back
        #[arg(long)]
        dry_run: bool,
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the local replica with remote ids and report orphaned metrics
    MigrateIds {
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List performance rows that reference missing events
    Orphans {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export events
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormatArg::Json)]
        format: ExportFormatArg,
        /// Only events in this week bucket (YYYY-MM-DD_to_YYYY-MM-DD)
        #[arg(long, value_name = "ID")]
        week: Option<String>,
        /// Output file or directory (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SyncModeArg {
    Incremental,
    Full,
    Diff,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum DedupeByArg {
    #[value(alias = "original_url")]
    OriginalUrl,
    #[value(alias = "normalized_title")]
    NormalizedTitle,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormatArg {
    Json,
    Markdown,
}
