use thiserror::Error;

/// Rejected user-facing values (CLI arguments, config strings).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid interval '{value}', expected one of monthly, quarterly, annual")]
    InvalidInterval { value: String },
    #[error("unknown currency code '{value}'")]
    InvalidCurrency { value: String },
    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: String, end: String },
}

/// Failures talking to the capture archive. Absence of captures is not an error.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("archive returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("malformed archive payload: {0}")]
    Payload(String),
}

/// Failures talking to the inference service. The fallback stage turns these into
/// "no candidates" plus an entry in the result's error list.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("inference service returned HTTP {0}")]
    Status(u16),
}

/// Top-level error for library entry points.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
