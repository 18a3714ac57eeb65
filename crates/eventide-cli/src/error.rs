use std::io;

use eventide_core::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] eventide_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid --since value `{0}` (expected RFC 3339 or YYYY-MM-DD)")]
    InvalidSince(String),
    #[error("Invalid week identifier `{0}` (expected YYYY-MM-DD_to_YYYY-MM-DD)")]
    InvalidWeek(String),
}
