//! Error taxonomy.
//!
//! Only configuration-level failures ever reach the process boundary.
//! Per-target probe failures are absorbed by the strategies and turned into
//! `(Timeout, 100%)` outcomes.

use thiserror::Error;

/// Fatal configuration problems. Raised before any probing starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid mode selection: {0:?} (expected 1, 2 or 3)")]
    InvalidMode(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("invalid log level: {0}. Valid levels are: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("invalid cron expression {expr:?}: {reason}")]
    InvalidSchedule { expr: String, reason: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that abort a whole probe cycle.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no targets found in {0}")]
    EmptyRun(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-target failures inside a probe strategy. Never escapes the strategy.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out")]
    Timeout,

    #[error("probe facility unavailable: {0}")]
    ToolUnavailable(String),

    #[error("could not resolve host {0}")]
    Resolve(String),

    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
}
