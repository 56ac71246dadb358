// src/error.rs
//! Application error types with structured error handling.
//!
//! Two vocabularies live here. [`ProxyFailure`] describes why a single page
//! fetch through a single proxy went wrong; workers handle it by rotating
//! proxies and it never reaches the caller. [`AppError`] describes run-level
//! failures that do propagate: configuration, I/O, upstream quote data and
//! worker crashes.

use std::time::Duration;
use thiserror::Error;

/// Why a page fetch through a particular proxy failed.
///
/// Every variant is treated the same way by the dispatcher: the proxy is
/// considered unusable for the rest of the run and the task is retried
/// through another one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyFailure {
    /// Connection refused, reset, DNS failure, TLS failure...
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The fetch did not finish within its time budget.
    #[error("fetch timed out after {after:?}")]
    Timeout { after: Duration },

    /// The upstream answered, but not with a success status.
    #[error("upstream rejected the request with HTTP {status}")]
    Rejected { status: u16 },

    /// The response arrived but the trade table was not in it.
    #[error("expected trade table is missing from the response")]
    MissingTable,
}

impl ProxyFailure {
    /// Classifies a transport-level reqwest error.
    pub fn from_transport(err: &reqwest::Error, budget: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout { after: budget }
        } else if let Some(status) = err.status() {
            Self::Rejected {
                status: status.as_u16(),
            }
        } else {
            Self::Transport {
                message: err.to_string(),
            }
        }
    }

    /// Short machine-friendly label for log lines and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Timeout { .. } => "timeout",
            Self::Rejected { .. } => "rejected",
            Self::MissingTable => "missing_table",
        }
    }
}

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Network failure: {0}")]
    NetworkFailure(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status} for {url}")]
    UpstreamStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Filesystem IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Proxy list {path} could not be read: {source}")]
    ProxyListUnreadable {
        path: String,
        source: std::io::Error,
    },

    #[error("Worker {worker} crashed: {message}")]
    WorkerPanicked { worker: usize, message: String },

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error(transparent)]
    ValidationError(#[from] crate::types::ValidationError),
}

// Allow converting from anyhow::Error, preserving the message
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalError {
            message: err.to_string(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MalformedResponse(err.to_string())
    }
}

impl AppError {
    /// Whether retrying the same request later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::NetworkFailure(_) => true,
            AppError::UpstreamStatus { status, .. } => {
                status.is_server_error() || status.as_u16() == 429
            }
            AppError::MalformedResponse(_) => true,
            _ => false,
        }
    }
}

/// Result type alias for convenience
pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidationError;

    #[test]
    fn test_proxy_failure_display() {
        let err = ProxyFailure::Timeout {
            after: Duration::from_secs(12),
        };
        assert_eq!(err.to_string(), "fetch timed out after 12s");
        assert_eq!(
            ProxyFailure::MissingTable.to_string(),
            "expected trade table is missing from the response"
        );
        assert_eq!(ProxyFailure::Rejected { status: 403 }.kind(), "rejected");
    }

    #[test]
    fn test_app_error_transience() {
        assert!(AppError::MalformedResponse("truncated".into()).is_transient());
        assert!(AppError::UpstreamStatus {
            url: "https://example.test".into(),
            status: reqwest::StatusCode::TOO_MANY_REQUESTS,
        }
        .is_transient());
        assert!(!AppError::UpstreamStatus {
            url: "https://example.test".into(),
            status: reqwest::StatusCode::NOT_FOUND,
        }
        .is_transient());
        assert!(!AppError::from(ValidationError::EmptyField("symbol")).is_transient());
    }

    #[test]
    fn test_anyhow_conversion_keeps_message() {
        let err: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "Internal error: boom");
    }
}
