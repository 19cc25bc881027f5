//! Running units of work inside transactions.
//!
//! The scheduler creates a transaction, runs the unit of work, commits, and
//! retries the whole unit when the failure is retryable. Periodic tasks run
//! on a background thread until their handle is cancelled or dropped.

use crate::config::SchedulerConfig;
use crate::error::{RetryStatus, TxnError, TxnResult};
use crate::transaction::{Transaction, TransactionCoordinator};
use crate::types::TransactionState;
use parking_lot::{Condvar, Mutex};
use std::fmt::Display;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Runs units of work in transactions.
#[derive(Debug, Clone)]
pub struct TransactionScheduler {
    coordinator: Arc<TransactionCoordinator>,
    config: SchedulerConfig,
}

impl TransactionScheduler {
    /// Creates a scheduler over a coordinator.
    pub fn new(coordinator: Arc<TransactionCoordinator>, config: SchedulerConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    /// Returns the coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &Arc<TransactionCoordinator> {
        &self.coordinator
    }

    /// Runs `task` in a new transaction on the calling thread and commits.
    ///
    /// A failed attempt aborts its transaction. Retryable failures are
    /// retried in a fresh transaction up to `max_attempts` times in total.
    ///
    /// # Errors
    ///
    /// Returns the last failure from the task or from commit.
    pub fn run_task<T, E, F>(&self, mut task: F) -> Result<T, E>
    where
        F: FnMut(&Transaction) -> Result<T, E>,
        E: From<TxnError> + RetryStatus + Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let handle = self
                .coordinator
                .create_transaction(self.config.timeout_policy);
            let txn = handle.transaction();

            let error = match task(txn) {
                Ok(value) => match handle.commit() {
                    Ok(()) => return Ok(value),
                    Err(error) => E::from(error),
                },
                Err(error) => error,
            };

            if txn.state() == TransactionState::Active {
                if let Err(abort_error) = txn.abort(TxnError::failed(error.to_string())) {
                    warn!(txn = %txn.id(), %abort_error, "failed to abort after task failure");
                }
            }

            if error.is_retryable() && attempt < max_attempts {
                debug!(txn = %txn.id(), attempt, %error, "retrying task");
                continue;
            }
            return Err(error);
        }
    }

    /// Runs `task` repeatedly on a background thread.
    ///
    /// The first run starts after `initial_delay`, later runs every `period`.
    /// Each run goes through [`run_task`](Self::run_task); failures are
    /// logged and do not stop the schedule.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a zero period, or `Failed` if the
    /// thread cannot be spawned.
    pub fn schedule_periodic<E, F>(
        &self,
        name: impl Into<String>,
        mut task: F,
        initial_delay: Duration,
        period: Duration,
    ) -> TxnResult<PeriodicTaskHandle>
    where
        F: FnMut(&Transaction) -> Result<(), E> + Send + 'static,
        E: From<TxnError> + RetryStatus + Display + 'static,
    {
        if period.is_zero() {
            return Err(TxnError::invalid_argument("period must be greater than zero"));
        }
        let name = name.into();
        let token = Arc::new(CancelToken::default());
        let scheduler = self.clone();
        let thread_token = Arc::clone(&token);
        let thread_name = name.clone();

        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                if thread_token.wait(initial_delay) {
                    return;
                }
                loop {
                    if let Err(error) = scheduler.run_task(&mut task) {
                        warn!(task = %thread_name, %error, "periodic task failed");
                    }
                    if thread_token.wait(period) {
                        return;
                    }
                }
            })
            .map_err(|e| TxnError::failed_with(format!("cannot spawn {name}"), e))?;

        Ok(PeriodicTaskHandle {
            name,
            token,
            thread: Some(thread),
        })
    }
}

/// Cancellation flag shared with a periodic task thread.
#[derive(Debug, Default)]
struct CancelToken {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

impl CancelToken {
    fn cancel(&self) {
        *self.cancelled.lock() = true;
        self.condvar.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.lock()
    }

    /// Waits up to `timeout`. Returns true if cancelled.
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut cancelled = self.cancelled.lock();
        while !*cancelled {
            match deadline {
                Some(deadline) => {
                    if self.condvar.wait_until(&mut cancelled, deadline).timed_out() {
                        break;
                    }
                }
                None => self.condvar.wait(&mut cancelled),
            }
        }
        *cancelled
    }
}

/// Handle to a periodic task.
///
/// Dropping the handle cancels the task and waits for its thread.
#[derive(Debug)]
pub struct PeriodicTaskHandle {
    name: String,
    token: Arc<CancelToken>,
    thread: Option<JoinHandle<()>>,
}

impl PeriodicTaskHandle {
    /// Returns the task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops further runs. A run in progress completes.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true if the task was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for PeriodicTaskHandle {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(task = %self.name, "periodic task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::participant::TransactionParticipant;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn create_scheduler(max_attempts: u32) -> TransactionScheduler {
        let coordinator =
            Arc::new(TransactionCoordinator::new(CoordinatorConfig::default()).unwrap());
        TransactionScheduler::new(
            coordinator,
            SchedulerConfig::new().with_max_attempts(max_attempts),
        )
    }

    struct FailingPrepare;

    impl TransactionParticipant for FailingPrepare {
        fn prepare(&self, _txn: &Transaction) -> TxnResult<bool> {
            Err(TxnError::failed("prepare refused"))
        }

        fn commit(&self, _txn: &Transaction) -> TxnResult<()> {
            Ok(())
        }

        fn abort(&self, _txn: &Transaction) -> TxnResult<()> {
            Ok(())
        }
    }

    #[test]
    fn task_commits() {
        let scheduler = create_scheduler(3);
        let value: TxnResult<u32> = scheduler.run_task(|txn| {
            assert!(txn.is_active());
            Ok(42)
        });
        assert_eq!(value.unwrap(), 42);
        assert_eq!(scheduler.coordinator().stats().committed(), 1);
    }

    #[test]
    fn retryable_failure_retried() {
        let scheduler = create_scheduler(3);
        let mut calls = 0;
        let result: TxnResult<()> = scheduler.run_task(|_txn| {
            calls += 1;
            if calls < 3 {
                Err(TxnError::conflict("busy"))
            } else {
                Ok(())
            }
        });
        assert!(result.is_ok());
        assert_eq!(calls, 3);
        assert_eq!(scheduler.coordinator().stats().aborted(), 2);
    }

    #[test]
    fn attempts_are_bounded() {
        let scheduler = create_scheduler(2);
        let mut calls = 0;
        let result: TxnResult<()> = scheduler.run_task(|_txn| {
            calls += 1;
            Err(TxnError::conflict("busy"))
        });
        assert!(matches!(result, Err(TxnError::Conflict { .. })));
        assert_eq!(calls, 2);
    }

    #[test]
    fn permanent_failure_not_retried() {
        let scheduler = create_scheduler(5);
        let mut calls = 0;
        let result: TxnResult<()> = scheduler.run_task(|_txn| {
            calls += 1;
            Err(TxnError::invalid_argument("bad"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn commit_failure_returned() {
        let scheduler = create_scheduler(5);
        let result: TxnResult<()> = scheduler.run_task(|txn| txn.join(Arc::new(FailingPrepare)));
        assert!(matches!(result, Err(TxnError::Failed { .. })));
        assert_eq!(scheduler.coordinator().stats().aborted(), 1);
    }

    #[test]
    fn periodic_task_runs_until_cancelled() {
        let scheduler = create_scheduler(1);
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        let handle = scheduler
            .schedule_periodic(
                "counter",
                move |_txn: &Transaction| -> TxnResult<()> {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
                Duration::ZERO,
                Duration::from_millis(5),
            )
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while runs.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        handle.cancel();
        assert!(handle.is_cancelled());
        drop(handle);

        let after_stop = runs.load(Ordering::SeqCst);
        assert!(after_stop >= 3);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(runs.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn zero_period_rejected() {
        let scheduler = create_scheduler(1);
        let result = scheduler.schedule_periodic(
            "bad",
            |_txn: &Transaction| -> TxnResult<()> { Ok(()) },
            Duration::ZERO,
            Duration::ZERO,
        );
        assert!(result.is_err());
    }
}
