use crate::config::ConfigError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Malformed or unreadable event input. Aborts the whole run.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to open results file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read results: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed test event on line {line}: {source}")]
    Malformed {
        line: usize,
        source: serde_json::Error,
    },
}

/// Case management HTTP client errors.
#[derive(Debug, Error)]
pub enum QaseError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("JSON deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Request rejected by API: {0}")]
    ApiRejected(String),
}

impl QaseError {
    /// HTTP status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            QaseError::RequestFailed { status, .. } => Some(*status),
            QaseError::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the service asked the caller to back off (HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }
}

/// Classification of a failed submission attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmissionError {
    /// Retried under the bounded poll policy.
    #[error("Rate limited by case management service")]
    RateLimited,

    /// Aborts the run immediately.
    #[error("Submission failed: {0}")]
    Fatal(String),
}

impl From<QaseError> for SubmissionError {
    fn from(err: QaseError) -> Self {
        if err.is_rate_limited() {
            SubmissionError::RateLimited
        } else {
            SubmissionError::Fatal(err.to_string())
        }
    }
}

/// Slack notification errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Webhook returned status {status}: {body}")]
    RequestFailed { status: u16, body: String },
}

/// Top-level reporter errors.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("Results not reported within {0:?}")]
    Timeout(Duration),

    #[error("Failed to notify: {0}")]
    Notify(#[from] NotifyError),
}
