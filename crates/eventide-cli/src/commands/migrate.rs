use eventide_core::sync::{migrate_ids, open_remote, SyncEngine};

use crate::commands::common::{format_sync_lines, print_json, Context};
use crate::commands::orphans::format_orphan_lines;
use crate::error::CliError;

pub fn run_migrate_ids(ctx: &Context, as_json: bool) -> Result<(), CliError> {
    let remote = open_remote(&ctx.config.remote_config(ctx.remote.as_deref())?)?;
    let local = ctx.open_local()?;
    let engine =
        SyncEngine::new(remote.as_ref(), &local).with_backup_dir(ctx.config.backup_dir.clone());

    let report = migrate_ids(&engine)?;

    if as_json {
        return print_json(&report);
    }
    for line in format_sync_lines(&report.sync) {
        println!("{line}");
    }
    for line in format_orphan_lines(&report.orphans) {
        println!("{line}");
    }
    Ok(())
}
