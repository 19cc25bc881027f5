//! Core type definitions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction.
///
/// Identifiers handed out by [`TransactionId::next`] come from one
/// process-wide counter, so transactions of different coordinators sharing
/// a store never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates an identifier that no other transaction in this process has.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the opaque byte form of the ID (8 bytes, big-endian).
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// State of a transaction.
///
/// Transitions are monotonic: once a transaction leaves `Active` it never
/// returns to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Accepting participants and work.
    Active,
    /// Participants are being prepared.
    Preparing,
    /// Participants are being aborted.
    Aborting,
    /// Aborted; no further work is possible.
    Aborted,
    /// Prepared participants are being committed.
    Committing,
    /// Committed; no further work is possible.
    Committed,
}

impl TransactionState {
    /// Returns true if the transaction reached a final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Aborted | Self::Committed)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "ACTIVE",
            Self::Preparing => "PREPARING",
            Self::Aborting => "ABORTING",
            Self::Aborted => "ABORTED",
            Self::Committing => "COMMITTING",
            Self::Committed => "COMMITTED",
        };
        f.write_str(name)
    }
}

/// Whether a participant represents durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Durability {
    /// Persistent storage. At most one per transaction.
    Durable,
    /// Volatile side effects such as buffered messages.
    NonDurable,
}

/// Timeout policy requested when creating a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutPolicy {
    /// Uses the coordinator's bounded timeout.
    Bounded,
    /// Uses the coordinator's unbounded timeout, for background work.
    Unbounded,
}
