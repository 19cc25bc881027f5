//! # Tessera Transactions
//!
//! A single-process transaction coordinator with two-phase commit semantics.
//!
//! This crate provides:
//! - [`TransactionCoordinator`] for creating transactions with bounded or
//!   unbounded timeouts
//! - [`Transaction`] with join/abort/check-timeout operations bound to the
//!   creating thread
//! - [`TransactionHandle`] which drives the prepare/commit sequence
//! - [`TransactionParticipant`] and [`TransactionListener`] capabilities
//! - [`TransactionScheduler`] for running units of work with retry
//!
//! ## Example
//!
//! ```rust
//! use tessera_txn::{CoordinatorConfig, TimeoutPolicy, TransactionCoordinator};
//!
//! let coordinator = TransactionCoordinator::new(CoordinatorConfig::default()).unwrap();
//! let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
//! assert!(handle.transaction().is_active());
//! handle.commit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod participant;
mod scheduler;
mod stats;
mod transaction;
mod types;

pub use config::{
    CoordinatorConfig, SchedulerConfig, DISABLE_PREPARE_AND_COMMIT_PROPERTY, TIMEOUT_PROPERTY,
    UNBOUNDED_TIMEOUT_PROPERTY,
};
pub use error::{AbortCause, RetryStatus, TxnError, TxnResult};
pub use participant::{same_participant, TransactionListener, TransactionParticipant};
pub use scheduler::{PeriodicTaskHandle, TransactionScheduler};
pub use stats::{StatsSnapshot, TransactionStats};
pub use transaction::{Transaction, TransactionCoordinator, TransactionHandle};
pub use types::{Durability, TimeoutPolicy, TransactionId, TransactionState};
