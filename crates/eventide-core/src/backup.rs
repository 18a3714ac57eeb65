//! Store file backups taken before destructive operations.

use std::path::{Path, PathBuf};

use crate::db::Database;
use crate::error::{Error, Result};

/// Copy the store file aside.
///
/// The copy lands in `backup_dir` when given, otherwise next to the store,
/// named `<file>.backup-<timestamp>`. In-memory stores have nothing to back
/// up and return `None`.
pub fn backup_store(db: &Database, backup_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let Some(store_path) = db.path() else {
        return Ok(None);
    };

    db.checkpoint()?;
    let backup_path = backup_path_for(store_path, backup_dir)?;
    if let Some(parent) = backup_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(store_path, &backup_path)?;

    tracing::info!(
        "Backed up store {} to {}",
        store_path.display(),
        backup_path.display()
    );
    Ok(Some(backup_path))
}

fn backup_path_for(store_path: &Path, backup_dir: Option<&Path>) -> Result<PathBuf> {
    let Some(file_name) = store_path.file_name().and_then(|name| name.to_str()) else {
        return Err(Error::InvalidInput(format!(
            "store path has no file name: {}",
            store_path.display()
        )));
    };

    let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3fZ");
    let backup_name = format!("{file_name}.backup-{timestamp}");
    let directory = backup_dir
        .map(Path::to_path_buf)
        .or_else(|| store_path.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    Ok(directory.join(backup_name))
}
