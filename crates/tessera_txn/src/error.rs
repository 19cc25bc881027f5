//! Error types for transaction coordination.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for transaction operations.
pub type TxnResult<T> = Result<T, TxnError>;

/// Errors surfaced by transactions and their participants.
///
/// Errors are cheap to clone so that the same failure can be recorded as a
/// transaction's abort cause and returned to the caller.
#[derive(Debug, Clone, Error)]
pub enum TxnError {
    /// The operation violates the transaction protocol (wrong thread,
    /// double commit, re-entry while aborting).
    #[error("illegal state: {message}")]
    IllegalState {
        /// Description of the violation.
        message: String,
    },

    /// The transaction has already been aborted or committed.
    #[error("transaction is not active: {message}")]
    NotActive {
        /// Description of the state mismatch.
        message: String,
        /// The cause of the abort, if the transaction was aborted.
        cause: Option<AbortCause>,
        /// Whether the unit of work may be retried.
        retryable: bool,
    },

    /// The transaction was aborted.
    ///
    /// Retryable when no cause was recorded, otherwise exactly when the
    /// cause is.
    #[error("transaction aborted: {reason}")]
    Aborted {
        /// Reason for the abort.
        reason: String,
        /// The cause recorded on the transaction, if any.
        cause: Option<AbortCause>,
    },

    /// The transaction ran longer than its timeout.
    #[error("transaction timed out: {elapsed:?} exceeds {timeout:?}")]
    Timeout {
        /// Time elapsed since creation when the timeout was detected.
        elapsed: Duration,
        /// The configured timeout.
        timeout: Duration,
    },

    /// Lock contention with another transaction.
    #[error("transaction conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// The operation is not supported.
    #[error("unsupported operation: {message}")]
    Unsupported {
        /// Description of the unsupported operation.
        message: String,
    },

    /// An argument or configuration value is invalid.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid value.
        message: String,
    },

    /// A participant or listener failed.
    #[error("{message}")]
    Failed {
        /// Description of the failure.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },
}

impl TxnError {
    /// Creates an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Creates a not-active error carrying an optional abort cause.
    ///
    /// The error is retryable exactly when the cause is.
    pub fn not_active(message: impl Into<String>, cause: Option<AbortCause>) -> Self {
        let retryable = cause.as_ref().is_some_and(AbortCause::is_retryable);
        Self::NotActive {
            message: message.into(),
            cause,
            retryable,
        }
    }

    /// Creates an aborted error with no recorded cause.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
            cause: None,
        }
    }

    /// Creates an aborted error wrapping the cause recorded on a transaction.
    pub fn aborted_by(cause: Option<AbortCause>) -> Self {
        let reason = cause
            .as_ref()
            .map_or_else(|| "no cause recorded".to_string(), ToString::to_string);
        Self::Aborted { reason, cause }
    }

    /// Creates a timeout error.
    pub fn timeout(elapsed: Duration, timeout: Duration) -> Self {
        Self::Timeout { elapsed, timeout }
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a failure with only a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a failure wrapping another error.
    pub fn failed_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Failed {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// Returns the abort cause carried by this error, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&AbortCause> {
        match self {
            Self::NotActive { cause, .. } | Self::Aborted { cause, .. } => cause.as_ref(),
            _ => None,
        }
    }

    /// Returns true if this is a timeout, directly or as the recorded cause.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            _ => self.cause().is_some_and(|c| c.error().is_timeout()),
        }
    }

    /// Returns true if this is a protocol violation.
    #[must_use]
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Self::IllegalState { .. })
    }
}

/// Reports whether a failed unit of work should be retried.
pub trait RetryStatus {
    /// Returns true if retrying the unit of work may succeed.
    fn is_retryable(&self) -> bool;
}

impl RetryStatus for TxnError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Aborted { cause, .. } => cause.as_ref().map_or(true, AbortCause::is_retryable),
            Self::Timeout { .. } | Self::Conflict { .. } => true,
            Self::NotActive { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

/// The first error a transaction was aborted with.
///
/// Clones share the same underlying error, so identity can be checked with
/// [`AbortCause::same_as`].
#[derive(Debug, Clone)]
pub struct AbortCause(Arc<TxnError>);

impl AbortCause {
    /// Creates an abort cause from an error.
    pub fn new(error: TxnError) -> Self {
        Self(Arc::new(error))
    }

    /// Returns the underlying error.
    #[must_use]
    pub fn error(&self) -> &TxnError {
        &self.0
    }

    /// Returns true if the cause permits retrying the unit of work.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.0.is_retryable()
    }

    /// Returns true if both causes refer to the same recorded error.
    #[must_use]
    pub fn same_as(&self, other: &AbortCause) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<TxnError> for AbortCause {
    fn from(error: TxnError) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for AbortCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
