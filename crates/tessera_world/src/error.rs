//! Error types for world operations.

use crate::types::CharacterId;
use tessera_store::{ObjectId, StoreError};
use tessera_txn::{RetryStatus, TxnError};
use thiserror::Error;

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;

/// Errors that can occur while working with boards, levels and characters.
///
/// Coordinates outside a board are not reported here: they are programming
/// errors and panic.
#[derive(Debug, Clone, Error)]
pub enum WorldError {
    /// The enclosing transaction failed or is no longer active.
    #[error(transparent)]
    Txn(#[from] TxnError),

    /// The object store rejected the operation.
    #[error(transparent)]
    Store(StoreError),

    /// No character with this id exists.
    #[error("unknown character: {0}")]
    UnknownCharacter(CharacterId),

    /// The character has no position on the level.
    #[error("character {character} is not on level {level}")]
    NotOnBoard {
        /// The character.
        character: CharacterId,
        /// The level that expected it.
        level: String,
    },

    /// A stored object has a different type than the caller expected.
    #[error("object {id} is not a {expected}")]
    WrongObjectKind {
        /// The object.
        id: ObjectId,
        /// The expected kind.
        expected: &'static str,
    },

    /// Random placement found no free space.
    #[error("no free space on level {level} after {attempts} attempts")]
    BoardFull {
        /// The level.
        level: String,
        /// Number of positions tried.
        attempts: u32,
    },

    /// A board description is inconsistent.
    #[error("invalid board: {0}")]
    InvalidBoard(String),

    /// No level is registered under this name.
    #[error("unknown level: {0}")]
    UnknownLevel(String),

    /// A level with this name is already registered.
    #[error("level already exists: {0}")]
    DuplicateLevel(String),
}

impl WorldError {
    /// Creates an invalid board error.
    pub fn invalid_board(message: impl Into<String>) -> Self {
        Self::InvalidBoard(message.into())
    }
}

impl From<StoreError> for WorldError {
    fn from(error: StoreError) -> Self {
        // Keep transaction failures at the top level so callers match one variant.
        match error {
            StoreError::Txn(error) => Self::Txn(error),
            other => Self::Store(other),
        }
    }
}

impl RetryStatus for WorldError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Txn(error) => error.is_retryable(),
            Self::Store(error) => error.is_retryable(),
            _ => false,
        }
    }
}
