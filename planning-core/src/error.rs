//! Error types for the planning updater.

use thiserror::Error;

/// Errors raised while loading or validating the configuration.
///
/// All of them are fatal at startup, never during a cycle.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not load configuration: {0}")]
    Load(String),

    #[error("Invalid value at {path}: {reason}")]
    Invalid { path: String, reason: String },

    #[error("Unknown parser mode '{mode}' at {path}")]
    UnknownParserMode { path: String, mode: String },

    #[error("Malformed pattern '{pattern}' at {path}: {reason}")]
    InvalidPattern {
        path: String,
        pattern: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Per-address fetch failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    #[error("Request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("Request to {url} failed with HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("Could not reach {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Response from {url} is not an iCalendar document")]
    NotCalendar { url: String },
}

/// Failure to read a whole calendar payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed calendar: {0}")]
    Malformed(String),

    #[error("Event {index} is missing required property {property}")]
    MissingProperty { index: usize, property: &'static str },

    #[error("Event {event_id} has an invalid {property}: {value}")]
    InvalidDate {
        event_id: String,
        property: &'static str,
        value: String,
    },
}

/// Store failures. Any of them aborts the reconciliation of the branch.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Record {id} not found in {collection}")]
    NotFound { collection: String, id: String },

    #[error("Branch '{0}' is already being reconciled")]
    Busy(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error for updater operations.
#[derive(Error, Debug)]
pub enum UpdaterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Error tolerance exceeded: {consecutive} failing cycles in a row (tolerance {tolerance})")]
    ToleranceExceeded { consecutive: u32, tolerance: u32 },
}

/// Result type alias for updater operations.
pub type UpdaterResult<T> = Result<T, UpdaterError>;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
