//! Error types for mqtt-mockd

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("MQTT error: {0}")]
    Mqtt(#[from] MqttError),

    #[error("responses error: {0}")]
    Responses(#[from] ResponsesError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while parsing or evaluating a rule condition
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("invalid condition format: {0}")]
    InvalidFormat(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid literal: {0}")]
    InvalidLiteral(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("cannot compare non-numeric values with {operator}: {actual}")]
    NonNumericComparison { operator: String, actual: String },

    #[error("contains is not supported on {0}")]
    UnsupportedType(String),
}

/// Errors related to MQTT operations
#[derive(Error, Debug)]
pub enum MqttError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("publish failed: {0}")]
    PublishFailed(String),

    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    #[error("publish timed out after {0} seconds")]
    Timeout(u64),
}

/// Aggregated configuration-time problems for a rule or response definition
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", problems.join("; "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

impl ValidationError {
    pub fn new(problems: Vec<String>) -> Self {
        Self { problems }
    }
}

/// Errors loading a responses file
#[derive(Error, Debug)]
pub enum ResponsesError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
