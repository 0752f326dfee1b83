//! Error and retry-policy types shared by every client layer.
//!
//! [`ClientError`] keeps the three failure families a caller must be able to
//! tell apart distinct: the backend could not be reached at all, the backend
//! answered with an application failure, or the backend answered with a body
//! that does not have the expected shape.
//!
//! The absence of a host-native capability is *not* represented here. It is a
//! routing decision made once at construction time, never a failure.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry.
///
/// The client never retries on its own; this is advice for the caller, who
/// applies its own back-off schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable,
    /// Retrying the same request will produce the same failure.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Client errors
// ---------------------------------------------------------------------------

/// Result alias used by every client operation.
pub type ClientResult<T> = Result<T, ClientError>;

/// Typed failure of a client operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// No backend could be reached at the transport level (connection refused,
    /// DNS failure, no live transport detected).
    #[error("Backend unreachable at {url}: {reason}")]
    NetworkUnreachable {
        /// URL that was being contacted, or the configured base when no
        /// transport is live.
        url: String,
        /// Underlying transport failure.
        reason: String,
    },

    /// The backend was reached and answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    HttpApplicationError {
        /// HTTP status code.
        status: u16,
        /// Message from the structured error body, or the status text.
        message: String,
    },

    /// The backend answered successfully but the body could not be parsed into
    /// the expected shape.
    #[error("Malformed response from {context}: {reason}")]
    MalformedResponse {
        /// Operation or path whose response was malformed.
        context: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The request did not complete within its deadline.
    #[error("Request to {url} timed out after {after:?}")]
    Timeout {
        url: String,
        after: Duration,
    },

    /// The request was aborted by the caller before it completed.
    #[error("Request to {url} was cancelled")]
    Cancelled {
        url: String,
    },

    /// The host never became ready within the configured number of attempts.
    #[error("Host did not become ready after {attempts} attempts")]
    HostNotReady {
        attempts: u32,
    },

    /// A configuration value (base URL, mount point) is invalid.
    #[error("Configuration error: {message}")]
    InvalidConfiguration {
        message: String,
    },
}

impl ClientError {
    /// Convenience constructor for [`ClientError::MalformedResponse`].
    pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` when the backend itself could not be reached (as opposed
    /// to reached-and-refused).
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::NetworkUnreachable { .. } | Self::Timeout { .. })
    }

    /// Returns `true` for an HTTP 404 from the backend.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HttpApplicationError { status: 404, .. })
    }

    /// Advises the caller whether repeating the operation can succeed.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::NetworkUnreachable { .. } | Self::Timeout { .. } => {
                RetryPolicy::Retryable
            }
            Self::HttpApplicationError { status, .. } if *status == 429 || *status >= 500 => {
                RetryPolicy::Retryable
            }
            Self::HttpApplicationError { .. }
            | Self::MalformedResponse { .. }
            | Self::Cancelled { .. }
            | Self::HostNotReady { .. }
            | Self::InvalidConfiguration { .. } => RetryPolicy::NonRetryable,
        }
    }
}
