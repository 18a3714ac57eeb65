use eventide_core::dedup::{DedupEngine, DedupOptions};
use eventide_core::resolver::{DedupeKey, IdentityResolver};

use crate::cli::DedupeByArg;
use crate::commands::common::{format_dedup_lines, print_json, Context};
use crate::error::CliError;

impl From<DedupeByArg> for DedupeKey {
    fn from(key: DedupeByArg) -> Self {
        match key {
            DedupeByArg::OriginalUrl => Self::OriginalUrl,
            DedupeByArg::NormalizedTitle => Self::NormalizedTitle,
        }
    }
}

pub fn run_dedup(
    ctx: &Context,
    dry_run: bool,
    dedupe_by: DedupeByArg,
    exact_only: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let mut resolver_config = ctx.config.resolver_config().with_key(dedupe_by.into());
    if exact_only {
        resolver_config = resolver_config.exact_only();
    }
    let engine = DedupEngine::new(
        IdentityResolver::new(resolver_config),
        ctx.config.invalid_filter(),
    );

    let db = ctx.open_local()?;
    let report = engine.run(
        &db,
        &DedupOptions {
            dry_run,
            backup_dir: ctx.config.backup_dir.clone(),
        },
    )?;

    if as_json {
        return print_json(&report);
    }
    for line in format_dedup_lines(&report) {
        println!("{line}");
    }
    Ok(())
}
