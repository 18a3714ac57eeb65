//! Authoritative store served by a libSQL server over its HTTP pipeline API.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::remote::RemoteStore;
use crate::db::EVENT_COLUMNS;
use crate::error::{Error, Result};
use crate::models::{EventId, EventRecord};

const PIPELINE_PATH: &str = "/v2/pipeline";

/// `scraped_at` as epoch milliseconds whether stored as INTEGER or as text.
const SCRAPED_AT_MS: &str = "CASE typeof(scraped_at) \
     WHEN 'text' THEN CAST(round((julianday(scraped_at) - 2440587.5) * 86400000.0) AS INTEGER) \
     ELSE scraped_at END";

fn fetch_events_sql() -> String {
    format!(
        "SELECT {EVENT_COLUMNS} FROM events
         WHERE {SCRAPED_AT_MS} > ?
         ORDER BY {SCRAPED_AT_MS} ASC, id ASC"
    )
}

pub struct LibSqlHttpRemote {
    endpoint: String,
    auth_token: String,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for LibSqlHttpRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("LibSqlHttpRemote")
            .field("endpoint", &self.endpoint)
            .field("auth_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl LibSqlHttpRemote {
    /// `base_url` is the database's `https://` URL.
    pub fn new(base_url: &str, auth_token: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidInput(
                "libSQL endpoint must include http:// or https://".to_string(),
            ));
        }
        let auth_token = auth_token.trim();
        if auth_token.is_empty() {
            return Err(Error::InvalidInput(
                "libSQL auth token must not be empty".to_string(),
            ));
        }

        Ok(Self {
            endpoint: format!("{base_url}{PIPELINE_PATH}"),
            auth_token: auth_token.to_string(),
            client: reqwest::blocking::Client::builder().timeout(timeout).build()?,
        })
    }

    fn execute(&self, sql: &str, args: Vec<Value>) -> Result<StatementResult> {
        let request = PipelineRequest {
            requests: vec![
                StreamRequest::Execute {
                    stmt: Statement { sql, args },
                },
                StreamRequest::Close,
            ],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.auth_token)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .map_err(|error| Error::Fetch(format!("libSQL request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|error| Error::Fetch(format!("failed to read libSQL response: {error}")))?;
        if !status.is_success() {
            return Err(Error::Fetch(parse_api_error(status, &body)));
        }

        parse_pipeline_response(&body)
    }
}

impl RemoteStore for LibSqlHttpRemote {
    fn fetch_events(&self, since: Option<DateTime<Utc>>) -> Result<Vec<EventRecord>> {
        let since_ms = since.map_or(i64::MIN, |since| since.timestamp_millis());
        let result = self.execute(
            &fetch_events_sql(),
            vec![Value::Integer {
                value: since_ms.to_string(),
            }],
        )?;

        let events = result.into_events()?;
        tracing::debug!(fetched = events.len(), "Fetched events over libSQL HTTP");
        Ok(events)
    }

    fn describe(&self) -> String {
        self.endpoint.trim_end_matches(PIPELINE_PATH).to_string()
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PipelineRequest<'a> {
    requests: Vec<StreamRequest<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamRequest<'a> {
    Execute { stmt: Statement<'a> },
    Close,
}

#[derive(Debug, Serialize)]
struct Statement<'a> {
    sql: &'a str,
    args: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct PipelineResponse {
    results: Vec<PipelineResult>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PipelineResult {
    Ok { response: StreamResponse },
    Error { error: StreamError },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamResponse {
    Execute { result: StatementResult },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    cols: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct Column {
    name: Option<String>,
}

/// A single SQL value as encoded by the pipeline protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Value {
    Null,
    /// Integers travel as decimal strings
    Integer { value: String },
    Float { value: f64 },
    Text { value: String },
    Blob { base64: String },
}

fn parse_pipeline_response(body: &str) -> Result<StatementResult> {
    let response: PipelineResponse = serde_json::from_str(body)
        .map_err(|error| Error::Fetch(format!("malformed libSQL response: {error}")))?;

    for result in response.results {
        match result {
            PipelineResult::Ok {
                response: StreamResponse::Execute { result },
            } => return Ok(result),
            PipelineResult::Ok { .. } => {}
            PipelineResult::Error { error } => {
                let code = error.code.map(|code| format!(" [{code}]")).unwrap_or_default();
                return Err(Error::Fetch(format!(
                    "libSQL statement failed: {}{code}",
                    error.message
                )));
            }
        }
    }

    Err(Error::Fetch(
        "libSQL response did not include a statement result".to_string(),
    ))
}

impl StatementResult {
    fn into_events(self) -> Result<Vec<EventRecord>> {
        let columns: HashMap<String, usize> = self
            .cols
            .into_iter()
            .enumerate()
            .filter_map(|(index, column)| column.name.map(|name| (name, index)))
            .collect();

        self.rows
            .iter()
            .map(|row| {
                RowReader {
                    columns: &columns,
                    row,
                }
                .event()
            })
            .collect()
    }
}

struct RowReader<'a> {
    columns: &'a HashMap<String, usize>,
    row: &'a [Value],
}

impl RowReader<'_> {
    fn event(&self) -> Result<EventRecord> {
        Ok(EventRecord {
            id: EventId::new(self.integer("id")?),
            title: self.text("title")?,
            normalized_title: self.text("normalized_title")?,
            start_time: self.text("start_time")?,
            end_time: self.optional_text("end_time")?,
            location: self.text("location")?,
            price: self.text("price")?,
            description: self.optional_text("description")?,
            description_detail: self.optional_text("description_detail")?,
            original_url: self.text("original_url")?,
            short_url: self.optional_text("short_url")?,
            source: self.text("source")?,
            event_type: self.text("event_type")?,
            priority: self.integer("priority")?,
            scraped_at: self.timestamp("scraped_at")?,
            week_identifier: self.text("week_identifier")?,
        })
    }

    fn value(&self, name: &str) -> Result<&Value> {
        self.columns
            .get(name)
            .and_then(|&index| self.row.get(index))
            .ok_or_else(|| Error::Fetch(format!("libSQL row is missing column `{name}`")))
    }

    fn integer(&self, name: &str) -> Result<i64> {
        match self.value(name)? {
            Value::Integer { value } => value.parse().map_err(|_| {
                Error::Fetch(format!("column `{name}` holds invalid integer `{value}`"))
            }),
            other => Err(unexpected(name, "integer", other)),
        }
    }

    fn optional_text(&self, name: &str) -> Result<Option<String>> {
        match self.value(name)? {
            Value::Null => Ok(None),
            Value::Text { value } => Ok(Some(value.clone())),
            Value::Integer { value } => Ok(Some(value.clone())),
            Value::Float { value } => Ok(Some(value.to_string())),
            Value::Blob { base64 } => Err(Error::Fetch(format!(
                "column `{name}` holds a blob ({} base64 chars), expected text",
                base64.len()
            ))),
        }
    }

    fn text(&self, name: &str) -> Result<String> {
        self.optional_text(name)?
            .ok_or_else(|| Error::Fetch(format!("column `{name}` is unexpectedly null")))
    }

    /// Unix milliseconds, or text in RFC 3339 / `YYYY-MM-DD HH:MM:SS` form
    fn timestamp(&self, name: &str) -> Result<DateTime<Utc>> {
        match self.value(name)? {
            Value::Integer { value } => value
                .parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_millis)
                .ok_or_else(|| Error::Fetch(format!("column `{name}` holds invalid timestamp"))),
            Value::Text { value } => parse_text_timestamp(value).ok_or_else(|| {
                Error::Fetch(format!("column `{name}` holds invalid timestamp `{value}`"))
            }),
            other => Err(unexpected(name, "timestamp", other)),
        }
    }
}

fn parse_text_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn unexpected(name: &str, expected: &str, found: &Value) -> Error {
    Error::Fetch(format!(
        "column `{name}` expected {expected}, found {found:?}"
    ))
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("libSQL server error: {} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed: String = body.trim().chars().take(180).collect();
    if trimmed.is_empty() {
        format!("libSQL server returned HTTP {}", status.as_u16())
    } else {
        format!("libSQL server error: {trimmed} ({})", status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EXECUTE_RESPONSE: &str = r#"{
        "baton": null,
        "base_url": null,
        "results": [
            {
                "type": "ok",
                "response": {
                    "type": "execute",
                    "result": {
                        "cols": [
                            {"name": "id", "decltype": "INTEGER"},
                            {"name": "title", "decltype": "TEXT"},
                            {"name": "normalized_title", "decltype": "TEXT"},
                            {"name": "start_time", "decltype": "TEXT"},
                            {"name": "end_time", "decltype": "TEXT"},
                            {"name": "location", "decltype": "TEXT"},
                            {"name": "price", "decltype": "TEXT"},
                            {"name": "description", "decltype": "TEXT"},
                            {"name": "description_detail", "decltype": "TEXT"},
                            {"name": "original_url", "decltype": "TEXT"},
                            {"name": "short_url", "decltype": "TEXT"},
                            {"name": "source", "decltype": "TEXT"},
                            {"name": "event_type", "decltype": "TEXT"},
                            {"name": "priority", "decltype": "INTEGER"},
                            {"name": "scraped_at", "decltype": "INTEGER"},
                            {"name": "week_identifier", "decltype": "TEXT"}
                        ],
                        "rows": [[
                            {"type": "integer", "value": "42"},
                            {"type": "text", "value": "SF Jazz Night"},
                            {"type": "text", "value": "sf jazz night"},
                            {"type": "text", "value": "2024-03-06T19:00:00Z"},
                            {"type": "null"},
                            {"type": "text", "value": "SFJAZZ Center"},
                            {"type": "text", "value": "$25"},
                            {"type": "null"},
                            {"type": "null"},
                            {"type": "text", "value": "https://x.test/e1"},
                            {"type": "null"},
                            {"type": "text", "value": "sfstation"},
                            {"type": "text", "value": "music"},
                            {"type": "integer", "value": "10"},
                            {"type": "integer", "value": "1704067200000"},
                            {"type": "text", "value": "2024-03-04_to_2024-03-10"}
                        ]],
                        "affected_row_count": 0,
                        "last_insert_rowid": null
                    }
                }
            },
            {"type": "ok", "response": {"type": "close"}}
        ]
    }"#;

    #[test]
    fn decodes_event_rows() {
        let events = parse_pipeline_response(EXECUTE_RESPONSE)
            .unwrap()
            .into_events()
            .unwrap();

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.id, EventId::new(42));
        assert_eq!(event.end_time, None);
        assert_eq!(event.priority, 10);
        assert_eq!(event.scraped_at.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(event.original_url, "https://x.test/e1");
    }

    #[test]
    fn statement_error_is_a_fetch_error() {
        let body = r#"{"results": [
            {"type": "error", "error": {"message": "no such table: events", "code": "SQLITE_ERROR"}},
            {"type": "ok", "response": {"type": "close"}}
        ]}"#;

        let error = parse_pipeline_response(body).unwrap_err();
        assert!(matches!(error, Error::Fetch(_)));
        assert!(error.to_string().contains("no such table: events [SQLITE_ERROR]"));
    }

    #[test]
    fn malformed_payload_is_a_fetch_error() {
        let error = parse_pipeline_response("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(error, Error::Fetch(_)));
    }

    #[test]
    fn request_uses_tagged_values() {
        let request = PipelineRequest {
            requests: vec![
                StreamRequest::Execute {
                    stmt: Statement {
                        sql: "SELECT 1",
                        args: vec![Value::Integer {
                            value: "7".to_string(),
                        }],
                    },
                },
                StreamRequest::Close,
            ],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "requests": [
                    {"type": "execute", "stmt": {"sql": "SELECT 1", "args": [{"type": "integer", "value": "7"}]}},
                    {"type": "close"}
                ]
            })
        );
    }

    #[test]
    fn text_timestamps_are_accepted() {
        assert_eq!(
            parse_text_timestamp("2024-01-02 03:04:05").unwrap().to_rfc3339(),
            "2024-01-02T03:04:05+00:00"
        );
        assert!(parse_text_timestamp("2024-01-02T03:04:05Z").is_some());
        assert!(parse_text_timestamp("yesterday").is_none());
    }

    #[test]
    fn watermark_compares_text_and_integer_timestamps() {
        let db = crate::db::Database::open_in_memory().unwrap();
        let conn = db.connection();
        conn.execute_batch(
            "INSERT INTO events (id, title, normalized_title, start_time, original_url,
                                 source, scraped_at)
             VALUES (1, 'Old', 'old', '', 'https://x.test/1', 't', '2024-01-01T00:00:00Z'),
                    (2, 'New', 'new', '', 'https://x.test/2', 't', '2024-01-03 00:00:00'),
                    (3, 'Mid', 'mid', '', 'https://x.test/3', 't', 1704153600000);",
        )
        .unwrap();

        let watermark = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .timestamp_millis();
        let ids: Vec<i64> = conn
            .prepare(&fetch_events_sql().replacen(EVENT_COLUMNS, "id", 1))
            .unwrap()
            .query_map([watermark], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn api_error_prefers_message_field() {
        let message = parse_api_error(StatusCode::UNAUTHORIZED, r#"{"message":"bad token"}"#);
        assert_eq!(message, "libSQL server error: bad token (401)");
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "  "),
            "libSQL server returned HTTP 502"
        );
    }

    #[test]
    fn new_validates_inputs_and_debug_redacts() {
        assert!(LibSqlHttpRemote::new("db.example.com", "t", Duration::from_secs(1)).is_err());
        assert!(LibSqlHttpRemote::new("https://db.example.com", " ", Duration::from_secs(1)).is_err());

        let remote =
            LibSqlHttpRemote::new("https://db.example.com/", "secret", Duration::from_secs(1))
                .unwrap();
        assert_eq!(remote.describe(), "https://db.example.com");
        let debug = format!("{remote:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
