//! Transaction coordinator.

use super::state::Transaction;
use crate::config::CoordinatorConfig;
use crate::error::{TxnError, TxnResult};
use crate::stats::TransactionStats;
use crate::types::{TimeoutPolicy, TransactionId};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Creates transactions.
///
/// The coordinator assigns timeouts. Identifiers are unique across every
/// coordinator in the process. Transactions created by the same coordinator
/// share its [`TransactionStats`].
pub struct TransactionCoordinator {
    config: CoordinatorConfig,
    stats: Arc<TransactionStats>,
}

impl TransactionCoordinator {
    /// Creates a coordinator.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a configured timeout is zero.
    pub fn new(config: CoordinatorConfig) -> TxnResult<Self> {
        Self::with_stats(config, Arc::new(TransactionStats::new()))
    }

    /// Creates a coordinator that records into existing statistics.
    pub fn with_stats(config: CoordinatorConfig, stats: Arc<TransactionStats>) -> TxnResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stats,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Returns the shared statistics.
    #[must_use]
    pub fn stats(&self) -> &Arc<TransactionStats> {
        &self.stats
    }

    /// Creates an active transaction owned by the calling thread.
    pub fn create_transaction(&self, policy: TimeoutPolicy) -> TransactionHandle {
        let timeout = match policy {
            TimeoutPolicy::Bounded => self.config.bounded_timeout,
            TimeoutPolicy::Unbounded => self.config.unbounded_timeout,
        };
        self.build(timeout)
    }

    /// Creates an active transaction with an explicit timeout.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the timeout is zero.
    pub fn create_transaction_with_timeout(&self, timeout: Duration) -> TxnResult<TransactionHandle> {
        if timeout.is_zero() {
            return Err(TxnError::invalid_argument(
                "transaction timeout must be greater than zero",
            ));
        }
        Ok(self.build(timeout))
    }

    fn build(&self, timeout: Duration) -> TransactionHandle {
        let id = TransactionId::next();
        let txn = Transaction::new(
            id,
            timeout,
            !self.config.disable_prepare_and_commit,
            Arc::clone(&self.stats),
        );
        TransactionHandle { txn: Arc::new(txn) }
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

/// The handle that commits a transaction.
///
/// Only the handle can commit. The transaction itself can be shared with the
/// code doing the work through [`TransactionHandle::shared`].
///
/// Dropping the handle on its owner thread while the transaction is still
/// active aborts it, so locks and buffered work never outlive the handle.
#[derive(Debug)]
pub struct TransactionHandle {
    txn: Arc<Transaction>,
}

impl TransactionHandle {
    /// Returns the transaction.
    #[must_use]
    pub fn transaction(&self) -> &Transaction {
        &self.txn
    }

    /// Returns a shared reference to the transaction.
    #[must_use]
    pub fn shared(&self) -> Arc<Transaction> {
        Arc::clone(&self.txn)
    }

    /// Prepares and commits the transaction.
    ///
    /// # Errors
    ///
    /// - `IllegalState` on a second call, from another thread, or while the
    ///   transaction is preparing, aborting or committing
    /// - `NotActive` if the transaction was already aborted
    /// - `Aborted` if a participant or listener aborted the transaction
    ///   without failing
    /// - The error returned by a failing `prepare`, `prepare_and_commit` or
    ///   `before_completion`, after the transaction was aborted with it
    pub fn commit(&self) -> TxnResult<()> {
        self.txn.commit()
    }
}

impl Drop for TransactionHandle {
    fn drop(&mut self) {
        if !self.txn.is_active() {
            return;
        }
        if thread::current().id() != self.txn.owner() {
            warn!(txn = %self.txn.id(), "handle dropped off its owner thread, transaction left active");
            return;
        }
        if let Err(error) = self
            .txn
            .abort(TxnError::illegal_state("transaction handle dropped before commit"))
        {
            warn!(txn = %self.txn.id(), %error, "abort on drop failed");
        }
    }
}
