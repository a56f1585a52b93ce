//! Error and retry-policy types for stack operations.
//!
//! [`MonitorError`] covers every way a monitoring session can end other than
//! success or cancellation. [`ServiceError`] is the port-level error that every
//! infrastructure adapter maps its own failures into.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error that participates in
//! retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ResourceStatus, StackName};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by infrastructure error types to let callers decide whether to
/// re-invoke an operation.
///
/// - `Retryable` errors: request timeouts, connection failures, throttling and
///   server-side errors.
/// - `NonRetryable` errors: unknown stacks, rejected requests, malformed
///   responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt (e.g. derived from a
        /// `Retry-After` header). `None` means apply the caller's own delay.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failure of an external collaborator (control plane, object store).
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{operation} failed: {message}")]
pub struct ServiceError {
    /// Name of the port operation that failed (e.g. `"fetch_events"`).
    pub operation: &'static str,
    /// Human-readable description of the failure.
    pub message: String,
    /// Whether the caller may retry.
    pub retry: RetryPolicy,
}

impl ServiceError {
    /// Creates an error that may be retried.
    pub fn retryable(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
            retry: RetryPolicy::Retryable { after: None },
        }
    }

    /// Creates an error that must not be retried.
    pub fn fatal(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
            retry: RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Monitor errors
// ---------------------------------------------------------------------------

/// Errors that end a monitoring session.
///
/// None of these are retried inside the monitor; the caller decides whether to
/// start a new session.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A caller-supplied argument was rejected before monitoring started.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument.
        message: String,
    },

    /// A resource reached a failure terminal state.
    ///
    /// `reason` is the last status reason observed on any failed event of the
    /// session, which may belong to a different resource than `status`.
    #[error("Stack {stack} action failed with {status}: {}", .reason.as_deref().unwrap_or("no reason reported"))]
    OperationFailed {
        /// Stack whose operation failed.
        stack: StackName,
        /// Terminal status reported for the stack itself.
        status: ResourceStatus,
        /// Last failure reason observed during the session.
        reason: Option<String>,
    },

    /// No new event arrived within the configured idle window.
    #[error("Monitoring stack, and received no updates for {} seconds", .idle.as_secs())]
    TimedOut {
        /// How long the feed was idle when monitoring gave up.
        idle: Duration,
    },

    /// The event source failed and the failure was not recovered.
    #[error("Event source error: {0}")]
    EventSource(#[source] ServiceError),
}
