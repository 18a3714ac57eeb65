//! Runtime configuration read from the environment.
//!
//! Every value has a default except the remote store, which is only needed
//! by commands that talk to the authoritative replica.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::filter::{InvalidRecordFilter, DEFAULT_INVALID_TITLES};
use crate::resolver::{ResolverConfig, DEFAULT_FUZZY_THRESHOLD};

const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Where the authoritative store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteTarget {
    /// A `SQLite` file on a reachable filesystem
    File(PathBuf),
    /// A libSQL server, as an `https://` base URL
    Url(String),
}

impl RemoteTarget {
    /// `libsql://` is rewritten to `https://`; anything without a URL scheme
    /// is a file path.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::Invalid(
                "remote store must not be empty".to_string(),
            ));
        }

        if let Some(host) = raw.strip_prefix("libsql://") {
            return Ok(Self::Url(format!("https://{}", host.trim_end_matches('/'))));
        }
        if is_http_url(raw) {
            return Ok(Self::Url(raw.trim_end_matches('/').to_string()));
        }
        if raw.contains("://") {
            return Err(ConfigError::Invalid(format!(
                "unsupported remote scheme in `{raw}` (expected libsql://, https:// or a file path)"
            )));
        }
        Ok(Self::File(PathBuf::from(raw)))
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub target: RemoteTarget,
    pub auth_token: Option<String>,
    pub timeout: Duration,
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("target", &self.target)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Local store file; `None` falls back to the platform data directory
    pub db_path: Option<PathBuf>,
    /// Raw `EVENTIDE_REMOTE` (or `TURSO_DATABASE_URL`) value
    pub remote: Option<String>,
    pub remote_auth_token: Option<String>,
    pub remote_timeout: Duration,
    pub fuzzy_threshold: f64,
    pub invalid_titles: Vec<String>,
    pub backup_dir: Option<PathBuf>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("db_path", &self.db_path)
            .field("remote", &self.remote)
            .field(
                "remote_auth_token",
                &self.remote_auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("remote_timeout", &self.remote_timeout)
            .field("fuzzy_threshold", &self.fuzzy_threshold)
            .field("invalid_titles", &self.invalid_titles)
            .field("backup_dir", &self.backup_dir)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            remote: None,
            remote_auth_token: None,
            remote_timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            invalid_titles: DEFAULT_INVALID_TITLES
                .iter()
                .map(|title| (*title).to_string())
                .collect(),
            backup_dir: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_path = optional_trimmed(&lookup, "EVENTIDE_DB_PATH").map(PathBuf::from);
        let remote = optional_trimmed(&lookup, "EVENTIDE_REMOTE")
            .or_else(|| optional_trimmed(&lookup, "TURSO_DATABASE_URL"));
        let remote_auth_token = optional_trimmed(&lookup, "TURSO_AUTH_TOKEN");

        let timeout_secs = value_or_default(
            &lookup,
            "EVENTIDE_REMOTE_TIMEOUT_SECS",
            &DEFAULT_REMOTE_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|_| {
            ConfigError::Invalid(
                "EVENTIDE_REMOTE_TIMEOUT_SECS must be an integer in [1, 600]".to_string(),
            )
        })?;
        if !(1..=600).contains(&timeout_secs) {
            return Err(ConfigError::Invalid(
                "EVENTIDE_REMOTE_TIMEOUT_SECS must be in [1, 600]".to_string(),
            ));
        }

        let fuzzy_threshold = match optional_trimmed(&lookup, "EVENTIDE_FUZZY_THRESHOLD") {
            Some(raw) => raw.parse::<f64>().map_err(|_| {
                ConfigError::Invalid(
                    "EVENTIDE_FUZZY_THRESHOLD must be a number in (0, 1]".to_string(),
                )
            })?,
            None => DEFAULT_FUZZY_THRESHOLD,
        };
        if !(fuzzy_threshold > 0.0 && fuzzy_threshold <= 1.0) {
            return Err(ConfigError::Invalid(
                "EVENTIDE_FUZZY_THRESHOLD must be in (0, 1]".to_string(),
            ));
        }

        let invalid_titles = match optional_trimmed(&lookup, "EVENTIDE_INVALID_TITLES") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|title| !title.is_empty())
                .map(str::to_string)
                .collect(),
            None => Self::default().invalid_titles,
        };

        let backup_dir = optional_trimmed(&lookup, "EVENTIDE_BACKUP_DIR").map(PathBuf::from);

        Ok(Self {
            db_path,
            remote,
            remote_auth_token,
            remote_timeout: Duration::from_secs(timeout_secs),
            fuzzy_threshold,
            invalid_titles,
            backup_dir,
        })
    }

    /// Resolve the authoritative store, preferring `override_target` over the
    /// configured one. URL remotes require `TURSO_AUTH_TOKEN`.
    pub fn remote_config(&self, override_target: Option<&str>) -> Result<RemoteConfig, ConfigError> {
        let raw = override_target
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .or(self.remote.as_deref())
            .ok_or(ConfigError::MissingVar("EVENTIDE_REMOTE"))?;

        let target = RemoteTarget::parse(raw)?;
        if matches!(target, RemoteTarget::Url(_)) && self.remote_auth_token.is_none() {
            return Err(ConfigError::MissingVar("TURSO_AUTH_TOKEN"));
        }

        Ok(RemoteConfig {
            target,
            auth_token: self.remote_auth_token.clone(),
            timeout: self.remote_timeout,
        })
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::default().with_threshold(self.fuzzy_threshold)
    }

    pub fn invalid_filter(&self) -> InvalidRecordFilter {
        InvalidRecordFilter::new(&self.invalid_titles)
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
