use std::path::Path;

use eventide_core::db::{EventRepository, SqliteEventRepository};
use eventide_core::export::{render_events_export, suggested_export_file_name, ExportFormat};

use crate::cli::ExportFormatArg;
use crate::commands::common::{normalize_week, write_output, Context};
use crate::error::CliError;

impl From<ExportFormatArg> for ExportFormat {
    fn from(format: ExportFormatArg) -> Self {
        match format {
            ExportFormatArg::Json => Self::Json,
            ExportFormatArg::Markdown => Self::Markdown,
        }
    }
}

pub fn run_export(
    ctx: &Context,
    format: ExportFormatArg,
    week: Option<&str>,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let week = week.map(normalize_week).transpose()?;
    let db = ctx.open_local()?;
    let repo = SqliteEventRepository::new(db.connection());
    let events = match &week {
        Some(week) => repo.list_by_week(week)?,
        None => repo.list_all()?,
    };

    let format = ExportFormat::from(format);
    let rendered = render_events_export(&events, format)?;
    let output_path = output_path.map(|path| {
        if path.is_dir() {
            path.join(suggested_export_file_name(format, week.as_deref()))
        } else {
            path.to_path_buf()
        }
    });
    write_output(&rendered, output_path.as_deref())
}
