//! Error types for the test harness

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Registration failed: {status} {body}")]
    Registration { status: u16, body: String },

    #[error("Login failed: {status} {body}")]
    Authentication { status: u16, body: String },

    #[error("Timeout after {after:?}: {operation}")]
    Timeout { operation: String, after: Duration },

    #[error("Condition still pending after {attempts} attempts ({interval:?} apart)")]
    PollTimeout { attempts: u32, interval: Duration },

    #[error("Disposal failed: {0}")]
    Disposal(String),

    #[error("Request context used after disposal")]
    ContextDisposed,

    #[error("Unexpected status {actual} (expected one of {expected:?}): {body}")]
    UnexpectedStatus {
        expected: Vec<u16>,
        actual: u16,
        body: String,
    },

    #[error("Contract violation: {0}")]
    Contract(String),

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Skipped: {0}")]
    Skipped(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Fixture '{name}' failed: {reason}")]
    Fixture { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl HarnessError {
    /// Map a transport error, turning deadline expiry into [`HarnessError::Timeout`].
    pub fn from_transport(err: reqwest::Error, operation: impl Into<String>, after: Duration) -> Self {
        if err.is_timeout() {
            HarnessError::Timeout {
                operation: operation.into(),
                after,
            }
        } else {
            HarnessError::Http(err)
        }
    }

    /// True when the error means the test chose not to run.
    pub fn is_skip(&self) -> bool {
        matches!(self, HarnessError::Skipped(_))
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Fail the current test unless `cond` holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::HarnessError::Assertion(format!($($arg)+)));
        }
    };
}
