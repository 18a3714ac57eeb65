//! Export of the canonical dataset for downstream collaborators.
//!
//! JSON feeds the website; Markdown with frontmatter feeds post generation.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::EventRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(format!("unknown export format '{other}'")),
        }
    }
}

/// Public shape of an event; scrape bookkeeping is left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEvent {
    pub id: i64,
    pub title: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub location: String,
    pub price: String,
    pub description: Option<String>,
    pub url: String,
    pub source: String,
    pub event_type: String,
    pub week_identifier: String,
}

#[must_use]
pub fn event_to_export_item(event: &EventRecord) -> ExportEvent {
    ExportEvent {
        id: event.id.get(),
        title: event.title.clone(),
        start_time: event.start_time.clone(),
        end_time: event.end_time.clone(),
        location: event.location.clone(),
        price: event.price.clone(),
        description: event
            .description_detail
            .clone()
            .or_else(|| event.description.clone()),
        url: event
            .short_url
            .clone()
            .unwrap_or_else(|| event.original_url.clone()),
        source: event.source.clone(),
        event_type: event.event_type.clone(),
        week_identifier: event.week_identifier.clone(),
    }
}

pub fn render_json_export(events: &[EventRecord]) -> serde_json::Result<String> {
    let items = events
        .iter()
        .map(event_to_export_item)
        .collect::<Vec<ExportEvent>>();
    serde_json::to_string_pretty(&items)
}

/// Render events in Markdown with frontmatter blocks.
#[must_use]
pub fn render_markdown_export(events: &[EventRecord]) -> String {
    let mut output = String::new();

    for (index, event) in events.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }

        let item = event_to_export_item(event);
        let _ = writeln!(output, "---");
        let _ = writeln!(output, "id: {}", item.id);
        let _ = writeln!(output, "start_time: {}", item.start_time);
        if let Some(end_time) = &item.end_time {
            let _ = writeln!(output, "end_time: {end_time}");
        }
        let _ = writeln!(output, "location: {}", item.location);
        let _ = writeln!(output, "price: {}", item.price);
        let _ = writeln!(output, "url: {}", item.url);
        let _ = writeln!(output, "type: {}", item.event_type);
        let _ = writeln!(output, "week: {}", item.week_identifier);
        let _ = writeln!(output, "---");
        let _ = writeln!(output);
        let _ = writeln!(output, "# {}", item.title);
        if let Some(description) = &item.description {
            let _ = writeln!(output);
            output.push_str(description.trim());
            output.push('\n');
        }
    }

    output
}

pub fn render_events_export(
    events: &[EventRecord],
    format: ExportFormat,
) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(events),
        ExportFormat::Markdown => Ok(render_markdown_export(events)),
    }
}

/// Default file name, scoped by week when the export is.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, week: Option<&str>) -> String {
    match week {
        Some(week) => format!("eventide-{week}.{}", format.extension()),
        None => format!("eventide-events.{}", format.extension()),
    }
}
