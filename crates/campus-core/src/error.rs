// crates/campus-core/src/error.rs

use thiserror::Error;

/// Reasons a single payload item is rejected by the validator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidRecord {
    #[error("item must be a JSON object")]
    NotAnObject,

    #[error("title must be a non-empty string")]
    MissingTitle,

    #[error("price must be a finite number >= 0 (got {0})")]
    InvalidPrice(String),
}

/// Failures that abort an ingestion run before any write happens.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("document serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document '{0}' not found")]
    NotFound(String),

    #[error("report '{0}' already has a narrative attached")]
    NarrativeAlreadyAttached(String),

    #[error("write rejected: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum NarrativeError {
    #[error("narrative generator is not configured: {0}")]
    Configuration(String),

    #[error("narrative request failed: {0}")]
    Request(String),

    #[error("narrative response could not be parsed: {0}")]
    Unparseable(String),
}

impl From<reqwest::Error> for NarrativeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
