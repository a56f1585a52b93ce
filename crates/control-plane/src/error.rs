//! Error types for the control-plane adapter.

use std::time::Duration;

use monitor::{RetryPolicy, ServiceError};
use reqwest::StatusCode;

/// Result type alias using [`ControlPlaneError`].
pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;

/// Errors raised while talking to the control plane or the object store.
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// Response status code.
        status: StatusCode,
        /// Response body, truncated for display.
        body: String,
        /// Delay requested through `Retry-After`, if any.
        retry_after: Option<Duration>,
    },

    /// The stack is unknown to the control plane.
    #[error("stack not found: {0}")]
    StackNotFound(String),

    /// The response could not be interpreted.
    #[error("invalid response: {0}")]
    Decode(String),

    /// The client could not be constructed from its configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ControlPlaneError {
    /// Whether the failed call may be retried, and after what delay.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Http(err) if err.is_timeout() || err.is_connect() || err.is_request() => {
                RetryPolicy::Retryable { after: None }
            }
            Self::Status {
                status,
                retry_after,
                ..
            } if is_transient(*status) => RetryPolicy::Retryable {
                after: *retry_after,
            },
            _ => RetryPolicy::NonRetryable,
        }
    }

    /// Converts into the port-level error reported for `operation`.
    pub fn into_service_error(self, operation: &'static str) -> ServiceError {
        ServiceError {
            operation,
            retry: self.retry_policy(),
            message: self.to_string(),
        }
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}
