//! Error taxonomy for the runner.
//!
//! Only [`ConfigError`] aborts a run, and it always does so before the first
//! request goes out. Transport and parse failures are captured per case and
//! end up as failed outcomes inside a [`TestResult`](crate::testing::TestResult).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Malformed runner configuration or case definition.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("parallel worker count must be greater than zero")]
    ZeroWorkers,

    #[error("case `{case}`: missing required field `{field}`")]
    MissingField { case: String, field: &'static str },

    #[error("case `{case}`: expected status {status} is not a valid HTTP status code")]
    InvalidStatus { case: String, status: u16 },

    #[error("case `{case}`: expected status line `{line}`: {reason}")]
    InvalidStatusLine {
        case: String,
        line: String,
        reason: String,
    },

    #[error("case `{case}`: assertion on `{path}`: {reason}")]
    InvalidMatcher {
        case: String,
        path: String,
        reason: String,
    },

    #[error("invalid header `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("invalid variable override `{0}`, expected KEY=VALUE")]
    InvalidVariable(String),

    #[error("failed to read suite file `{}`: {source}", .path.display())]
    ReadSuite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse suite file `{}`: {reason}", .path.display())]
    ParseSuite { path: PathBuf, reason: String },

    #[error("suite has no cases")]
    EmptySuite,

    #[error("no cases matched filter `{0}`")]
    NoMatchingCases(String),
}

/// Failure to obtain a complete response from the service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    ReadBody(String),
}

impl TransportError {
    /// Classifies a reqwest failure into the runner's transport taxonomy.
    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return TransportError::Timeout(timeout);
        }
        if err.is_connect() {
            return TransportError::Connect(err.to_string());
        }
        if err.is_body() || err.is_decode() {
            return TransportError::ReadBody(err.to_string());
        }
        TransportError::Request(err.to_string())
    }
}

/// Response body could not be interpreted for a body assertion.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::InvalidJson(err.to_string())
    }
}
