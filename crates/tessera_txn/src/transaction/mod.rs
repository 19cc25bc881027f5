//! Transactions with two-phase commit.
//!
//! A transaction collects participants while it is active. Committing it runs
//! the listeners' `before_completion` callbacks, prepares every participant,
//! then commits those that have changes. Any prepare failure aborts the whole
//! transaction. Once the first participant is told to commit, the transaction
//! is committed regardless of later participant failures.

mod coordinator;
mod state;

pub use coordinator::{TransactionCoordinator, TransactionHandle};
pub use state::Transaction;
