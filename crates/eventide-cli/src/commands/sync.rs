use eventide_core::db::Database;
use eventide_core::sync::{open_remote, SyncEngine, SyncMode, SyncOptions};

use crate::cli::SyncModeArg;
use crate::commands::common::{format_sync_lines, parse_since, print_json, Context};
use crate::error::CliError;

impl From<SyncModeArg> for SyncMode {
    fn from(mode: SyncModeArg) -> Self {
        match mode {
            SyncModeArg::Incremental => Self::Incremental,
            SyncModeArg::Full => Self::Full,
            SyncModeArg::Diff => Self::Diff,
        }
    }
}

pub fn run_sync(
    ctx: &Context,
    mode: SyncModeArg,
    since: Option<&str>,
    dry_run: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let since = since.map(parse_since).transpose()?;
    let remote = open_remote(&ctx.config.remote_config(ctx.remote.as_deref())?)?;
    let options = SyncOptions {
        mode: mode.into(),
        since,
        dry_run,
    };

    let summary = if ctx.db_path.is_file() {
        let local = ctx.open_local()?;
        SyncEngine::new(remote.as_ref(), &local)
            .with_backup_dir(ctx.config.backup_dir.clone())
            .run(&options)?
    } else {
        // No store file yet: plan against an empty scratch store so a failed
        // fetch or a dry run leaves nothing on disk.
        let scratch = Database::open_in_memory()?;
        let plan = SyncEngine::new(remote.as_ref(), &scratch).plan(&options)?;
        if dry_run {
            SyncEngine::new(remote.as_ref(), &scratch).execute(&plan, true)?
        } else {
            let local = ctx.open_local()?;
            SyncEngine::new(remote.as_ref(), &local)
                .with_backup_dir(ctx.config.backup_dir.clone())
                .execute(&plan, false)?
        }
    };

    if as_json {
        return print_json(&summary);
    }
    for line in format_sync_lines(&summary) {
        println!("{line}");
    }
    Ok(())
}
