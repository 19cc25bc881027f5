//! Error types for store operations.

use crate::id::ObjectId;
use tessera_txn::{RetryStatus, TxnError};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The object does not exist or was destroyed.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// No object is bound to the name.
    #[error("name not bound: {0}")]
    NameNotBound(String),

    /// The name is already bound to an object.
    #[error("name already bound: {0}")]
    NameAlreadyBound(String),

    /// The enclosing transaction failed or is no longer active.
    #[error(transparent)]
    Txn(#[from] TxnError),
}

impl RetryStatus for StoreError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Txn(error) => error.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_follows_transaction_error() {
        assert!(StoreError::from(TxnError::conflict("locked")).is_retryable());
        assert!(!StoreError::NotFound(ObjectId::new()).is_retryable());
        assert!(!StoreError::NameNotBound("x".into()).is_retryable());
    }
}
