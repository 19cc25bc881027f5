//! Transaction statistics.
//!
//! A single [`TransactionStats`] is shared by a coordinator and every
//! transaction it creates.
//!
//! ```rust
//! use tessera_txn::{CoordinatorConfig, TimeoutPolicy, TransactionCoordinator};
//!
//! let coordinator = TransactionCoordinator::new(CoordinatorConfig::default()).unwrap();
//! coordinator.create_transaction(TimeoutPolicy::Bounded).commit().unwrap();
//!
//! let snapshot = coordinator.stats().snapshot();
//! assert_eq!(snapshot.created, 1);
//! assert_eq!(snapshot.committed, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Transaction counters.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct TransactionStats {
    created: AtomicU64,
    committed: AtomicU64,
    aborted: AtomicU64,
    timed_out: AtomicU64,
    read_only_prepares: AtomicU64,
    prepare_and_commits: AtomicU64,
    commit_failures: AtomicU64,
    abort_failures: AtomicU64,
}

impl TransactionStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    // === Increment methods (internal use) ===

    pub(crate) fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_committed(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_aborted(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read_only_prepare(&self) {
        self.read_only_prepares.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_prepare_and_commit(&self) {
        self.prepare_and_commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit_failure(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abort_failure(&self) {
        self.abort_failures.fetch_add(1, Ordering::Relaxed);
    }

    // === Getter methods (public API) ===

    /// Returns the number of transactions created.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions committed.
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions aborted.
    pub fn aborted(&self) -> u64 {
        self.aborted.load(Ordering::Relaxed)
    }

    /// Returns the number of transactions aborted by a timeout check.
    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Returns the number of participants that prepared read-only.
    pub fn read_only_prepares(&self) -> u64 {
        self.read_only_prepares.load(Ordering::Relaxed)
    }

    /// Returns the number of prepare-and-commit shortcuts taken.
    pub fn prepare_and_commits(&self) -> u64 {
        self.prepare_and_commits.load(Ordering::Relaxed)
    }

    /// Returns the number of participant commit failures that were swallowed.
    ///
    /// These happen after the point of no return and never fail a commit.
    pub fn commit_failures(&self) -> u64 {
        self.commit_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of participant abort failures that were swallowed.
    pub fn abort_failures(&self) -> u64 {
        self.abort_failures.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            created: self.created(),
            committed: self.committed(),
            aborted: self.aborted(),
            timed_out: self.timed_out(),
            read_only_prepares: self.read_only_prepares(),
            prepare_and_commits: self.prepare_and_commits(),
            commit_failures: self.commit_failures(),
            abort_failures: self.abort_failures(),
        }
    }
}

/// A point-in-time snapshot of transaction statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Transactions created.
    pub created: u64,
    /// Transactions committed.
    pub committed: u64,
    /// Transactions aborted.
    pub aborted: u64,
    /// Transactions aborted by a timeout check.
    pub timed_out: u64,
    /// Participants that prepared read-only.
    pub read_only_prepares: u64,
    /// Prepare-and-commit shortcuts taken.
    pub prepare_and_commits: u64,
    /// Swallowed participant commit failures.
    pub commit_failures: u64,
    /// Swallowed participant abort failures.
    pub abort_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = TransactionStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn record_outcomes() {
        let stats = TransactionStats::new();
        stats.record_created();
        stats.record_created();
        stats.record_committed();
        stats.record_aborted();
        stats.record_timed_out();
        stats.record_commit_failure();

        let snap = stats.snapshot();
        assert_eq!(snap.created, 2);
        assert_eq!(snap.committed, 1);
        assert_eq!(snap.aborted, 1);
        assert_eq!(snap.timed_out, 1);
        assert_eq!(snap.commit_failures, 1);
        assert_eq!(snap.abort_failures, 0);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(TransactionStats::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let s = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    s.record_created();
                    s.record_committed();
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(stats.created(), 1000);
        assert_eq!(stats.committed(), 1000);
    }
}
