//! Participant and listener capabilities.
//!
//! A participant is a unit of work that joins a transaction and is asked to
//! prepare, commit or abort. A listener is notified around completion.

use crate::error::TxnResult;
use crate::transaction::Transaction;
use crate::types::Durability;
use std::sync::Arc;

/// A unit of work that takes part in a transaction.
///
/// # Invariants
///
/// - At most one durable participant joins a given transaction
/// - A participant that prepared read-only is never committed
/// - `commit` is only called after a successful `prepare` that returned false
/// - Implementations must not join, commit or abort the transaction from
///   within `abort`
pub trait TransactionParticipant: Send + Sync {
    /// Returns whether this participant represents durable storage.
    fn durability(&self) -> Durability {
        Durability::Durable
    }

    /// Prepares to commit.
    ///
    /// Returns `true` if the participant has nothing to commit (read-only),
    /// in which case it will not be asked to commit.
    ///
    /// # Errors
    ///
    /// Any error aborts the transaction and is returned from commit.
    fn prepare(&self, txn: &Transaction) -> TxnResult<bool>;

    /// Commits prepared changes.
    ///
    /// Errors are logged and ignored by the coordinator.
    fn commit(&self, txn: &Transaction) -> TxnResult<()>;

    /// Prepares and commits in one step.
    ///
    /// Only called on the last durable participant. The default prepares and
    /// then commits unless the prepare was read-only.
    fn prepare_and_commit(&self, txn: &Transaction) -> TxnResult<()> {
        if !self.prepare(txn)? {
            self.commit(txn)?;
        }
        Ok(())
    }

    /// Discards any changes made on behalf of the transaction.
    ///
    /// Errors are logged and ignored by the coordinator.
    fn abort(&self, txn: &Transaction) -> TxnResult<()>;

    /// Returns a name used in diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Receives notifications around transaction completion.
pub trait TransactionListener: Send + Sync {
    /// Called before the transaction starts preparing participants.
    ///
    /// The listener may abort the transaction, which makes the commit fail.
    /// Returning an error also aborts the transaction.
    fn before_completion(&self, txn: &Transaction) -> TxnResult<()>;

    /// Called once the transaction reached a final state.
    fn after_completion(&self, committed: bool);

    /// Returns a name used in diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Returns true if both handles point at the same object.
///
/// Used to make joining and listener registration idempotent.
pub fn same_participant<A, B>(a: &Arc<A>, b: &Arc<B>) -> bool
where
    A: ?Sized,
    B: ?Sized,
{
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}
