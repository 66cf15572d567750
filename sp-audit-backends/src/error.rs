//! Error types for backend clients.
//!
//! A `BackendError` never escapes the auditor: it is converted into a
//! recorded [`BackendFailure`] at the client boundary.

use std::time::Duration;

use sp_audit_core::{BackendFailure, FailureKind};
use thiserror::Error;

/// Errors a backend call can produce.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Transport failure: refused, reset, non-2xx status, closed socket.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The call did not complete within the configured timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Credentials were rejected or could not be loaded.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The backend answered with something we cannot interpret.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The backend does not serve this height.
    #[error("Block {height} not available: {reason}")]
    UnsupportedHeight {
        /// Requested height
        height: u64,
        /// Backend-provided reason
        reason: String,
    },
}

impl BackendError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BackendError::Connection(_) => FailureKind::ConnectionError,
            BackendError::Timeout(_) => FailureKind::TimeoutError,
            BackendError::Auth(_) => FailureKind::AuthError,
            BackendError::Malformed(_) => FailureKind::MalformedResponseError,
            BackendError::UnsupportedHeight { .. } => FailureKind::UnsupportedHeightError,
        }
    }

    pub fn unsupported(height: u64, reason: impl Into<String>) -> Self {
        BackendError::UnsupportedHeight {
            height,
            reason: reason.into(),
        }
    }

    /// Classify a `reqwest` transport error.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(timeout)
        } else if err.is_decode() {
            BackendError::Malformed(err.to_string())
        } else {
            BackendError::Connection(err.to_string())
        }
    }
}

impl From<BackendError> for BackendFailure {
    fn from(err: BackendError) -> Self {
        BackendFailure::new(err.kind(), err.to_string())
    }
}

impl From<sp_audit_core::AuditError> for BackendError {
    fn from(err: sp_audit_core::AuditError) -> Self {
        BackendError::Malformed(err.to_string())
    }
}

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
