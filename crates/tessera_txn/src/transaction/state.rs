//! Transaction state machine.

use crate::error::{AbortCause, TxnError, TxnResult};
use crate::participant::{same_participant, TransactionListener, TransactionParticipant};
use crate::stats::TransactionStats;
use crate::types::{Durability, TransactionId, TransactionState};
use parking_lot::Mutex;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, trace, warn};

/// Mutable part of a transaction.
struct Inner {
    state: TransactionState,
    /// Joined participants. The durable participant, if any, is kept last.
    participants: Vec<Arc<dyn TransactionParticipant>>,
    has_durable: bool,
    listeners: Vec<Arc<dyn TransactionListener>>,
    abort_cause: Option<AbortCause>,
}

/// A single attempt at an atomic unit of work.
///
/// Every operation that changes the transaction must be issued from the
/// thread that created it. Locks are never held while participants or
/// listeners are called, so callbacks may query the transaction, check its
/// timeout, or abort it.
pub struct Transaction {
    id: TransactionId,
    created_at: SystemTime,
    started: Instant,
    timeout: Duration,
    owner: ThreadId,
    prepare_and_commit: bool,
    stats: Arc<TransactionStats>,
    inner: Mutex<Inner>,
}

impl Transaction {
    pub(crate) fn new(
        id: TransactionId,
        timeout: Duration,
        prepare_and_commit: bool,
        stats: Arc<TransactionStats>,
    ) -> Self {
        stats.record_created();
        let txn = Self {
            id,
            created_at: SystemTime::now(),
            started: Instant::now(),
            timeout,
            owner: thread::current().id(),
            prepare_and_commit,
            stats,
            inner: Mutex::new(Inner {
                state: TransactionState::Active,
                participants: Vec::new(),
                has_durable: false,
                listeners: Vec::new(),
                abort_cause: None,
            }),
        };
        debug!(txn = %txn.id, timeout = ?timeout, "transaction created");
        txn
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the opaque byte form of the transaction ID.
    #[must_use]
    pub fn id_bytes(&self) -> [u8; 8] {
        self.id.to_bytes()
    }

    /// Returns the wall-clock time the transaction was created.
    #[must_use]
    pub fn creation_time(&self) -> SystemTime {
        self.created_at
    }

    /// Returns the timeout of this transaction.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the time elapsed since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Returns the thread that owns this transaction.
    #[must_use]
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.inner.lock().state
    }

    /// Returns true if the transaction is still accepting work.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    /// Returns true if the transaction is aborting or aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(
            self.state(),
            TransactionState::Aborting | TransactionState::Aborted
        )
    }

    /// Returns the cause the transaction was aborted with, if any.
    #[must_use]
    pub fn abort_cause(&self) -> Option<AbortCause> {
        self.inner.lock().abort_cause.clone()
    }

    /// Returns the number of joined participants.
    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.inner.lock().participants.len()
    }

    /// Adds a participant.
    ///
    /// Joining the same participant twice has no effect.
    ///
    /// # Errors
    ///
    /// - `IllegalState` if called from another thread or after the
    ///   transaction started completing
    /// - `NotActive` if the transaction was aborted
    /// - `Unsupported` if a second durable participant joins
    pub fn join(&self, participant: Arc<dyn TransactionParticipant>) -> TxnResult<()> {
        self.check_thread("join")?;
        trace!(txn = %self.id, participant = participant.type_name(), "join");

        let mut inner = self.inner.lock();
        Self::ensure_active(&inner)?;
        if inner
            .participants
            .iter()
            .any(|p| same_participant(p, &participant))
        {
            return Ok(());
        }
        match participant.durability() {
            Durability::NonDurable if inner.has_durable => {
                let index = inner.participants.len() - 1;
                inner.participants.insert(index, participant);
            }
            Durability::NonDurable => inner.participants.push(participant),
            Durability::Durable if inner.has_durable => {
                return Err(TxnError::unsupported(
                    "attempt to add multiple durable participants",
                ));
            }
            Durability::Durable => {
                inner.has_durable = true;
                inner.participants.push(participant);
            }
        }
        Ok(())
    }

    /// Registers a listener to be notified around completion.
    ///
    /// Listeners are called in registration order. Registering the same
    /// listener twice has no effect.
    ///
    /// # Errors
    ///
    /// Fails like [`join`](Self::join) when the transaction is not active.
    pub fn register_listener(&self, listener: Arc<dyn TransactionListener>) -> TxnResult<()> {
        self.check_thread("register_listener")?;
        let mut inner = self.inner.lock();
        Self::ensure_active(&inner)?;
        if !inner.listeners.iter().any(|l| same_participant(l, &listener)) {
            inner.listeners.push(listener);
        }
        Ok(())
    }

    /// Aborts the transaction.
    ///
    /// Only the first cause is recorded. Aborting while an abort is already
    /// in progress has no effect. Participant abort failures are logged and
    /// ignored.
    ///
    /// # Errors
    ///
    /// - `NotActive` carrying the original cause if already aborted
    /// - `IllegalState` if called from another thread, or once committing
    ///   has started
    pub fn abort(&self, cause: TxnError) -> TxnResult<()> {
        self.check_thread("abort")?;

        let (participants, listeners) = {
            let mut inner = self.inner.lock();
            match inner.state {
                TransactionState::Active | TransactionState::Preparing => {}
                TransactionState::Aborting => return Ok(()),
                TransactionState::Aborted => {
                    return Err(TxnError::not_active(
                        "transaction is not active",
                        inner.abort_cause.clone(),
                    ));
                }
                state @ (TransactionState::Committing | TransactionState::Committed) => {
                    return Err(TxnError::illegal_state(format!(
                        "transaction is not active: {state}"
                    )));
                }
            }
            inner.state = TransactionState::Aborting;
            inner.abort_cause = Some(AbortCause::new(cause));
            (inner.participants.clone(), inner.listeners.clone())
        };
        debug!(txn = %self.id, cause = ?self.abort_cause().map(|c| c.to_string()), "abort");

        for participant in &participants {
            trace!(txn = %self.id, participant = participant.type_name(), "abort participant");
            if let Err(error) = participant.abort(self) {
                self.stats.record_abort_failure();
                warn!(
                    txn = %self.id,
                    participant = participant.type_name(),
                    %error,
                    "participant abort failed"
                );
            }
        }

        self.inner.lock().state = TransactionState::Aborted;
        self.stats.record_aborted();
        Self::notify_after_completion(&listeners, false);
        Ok(())
    }

    /// Checks whether the transaction has run longer than its timeout.
    ///
    /// Expiry is only observed here: an expired active or preparing
    /// transaction is aborted with a timeout cause and the timeout is
    /// returned. Checks made while aborting or committing always succeed.
    ///
    /// # Errors
    ///
    /// - `Timeout` if the transaction just expired
    /// - `NotActive` if the transaction was already aborted or committed
    pub fn check_timeout(&self) -> TxnResult<()> {
        self.check_thread("check_timeout")?;
        let state = {
            let inner = self.inner.lock();
            match inner.state {
                TransactionState::Aborted => {
                    return Err(TxnError::not_active(
                        "transaction is not active: ABORTED",
                        inner.abort_cause.clone(),
                    ));
                }
                TransactionState::Committed => {
                    return Err(TxnError::not_active(
                        "transaction is not active: COMMITTED",
                        None,
                    ));
                }
                state => state,
            }
        };
        if matches!(
            state,
            TransactionState::Aborting | TransactionState::Committing
        ) {
            return Ok(());
        }

        let elapsed = self.elapsed();
        if elapsed > self.timeout {
            let error = TxnError::timeout(elapsed, self.timeout);
            self.stats.record_timed_out();
            self.abort(error.clone())?;
            return Err(error);
        }
        Ok(())
    }

    /// Runs the commit sequence. Called through the transaction handle.
    pub(crate) fn commit(&self) -> TxnResult<()> {
        self.check_thread("commit")?;
        Self::ensure_active(&self.inner.lock())?;
        debug!(txn = %self.id, "commit");

        self.notify_before_completion()?;

        let participants = {
            let mut inner = self.inner.lock();
            Self::ensure_active(&inner)?;
            inner.state = TransactionState::Preparing;
            inner.participants.clone()
        };

        let count = participants.len();
        let mut to_commit = Vec::with_capacity(count);
        for (index, participant) in participants.into_iter().enumerate() {
            let shortcut = index + 1 == count
                && self.prepare_and_commit
                && participant.durability() == Durability::Durable;

            let outcome = if shortcut {
                participant.prepare_and_commit(self).map(|()| true)
            } else {
                participant.prepare(self)
            };

            match outcome {
                Ok(finished) => {
                    trace!(
                        txn = %self.id,
                        participant = participant.type_name(),
                        shortcut,
                        finished,
                        "prepared"
                    );
                    if shortcut {
                        self.stats.record_prepare_and_commit();
                    } else if finished {
                        self.stats.record_read_only_prepare();
                    }
                    if finished {
                        self.inner
                            .lock()
                            .participants
                            .retain(|p| !same_participant(p, &participant));
                    } else {
                        to_commit.push(participant);
                    }
                }
                Err(error) => {
                    trace!(
                        txn = %self.id,
                        participant = participant.type_name(),
                        %error,
                        "prepare failed"
                    );
                    self.abort_unless_aborted(&error);
                    return Err(error);
                }
            }

            if self.state() == TransactionState::Aborted {
                return Err(TxnError::aborted_by(self.abort_cause()));
            }
        }

        let listeners = {
            let mut inner = self.inner.lock();
            inner.state = TransactionState::Committing;
            inner.listeners.clone()
        };
        for participant in &to_commit {
            trace!(txn = %self.id, participant = participant.type_name(), "commit participant");
            if let Err(error) = participant.commit(self) {
                self.stats.record_commit_failure();
                warn!(
                    txn = %self.id,
                    participant = participant.type_name(),
                    %error,
                    "participant commit failed"
                );
            }
        }

        self.inner.lock().state = TransactionState::Committed;
        self.stats.record_committed();
        debug!(txn = %self.id, "committed");
        Self::notify_after_completion(&listeners, true);
        Ok(())
    }

    // === Internal helpers ===

    fn check_thread(&self, operation: &str) -> TxnResult<()> {
        if thread::current().id() == self.owner {
            Ok(())
        } else {
            Err(TxnError::illegal_state(format!(
                "{operation} called from a thread that does not own {}",
                self.id
            )))
        }
    }

    fn ensure_active(inner: &Inner) -> TxnResult<()> {
        match inner.state {
            TransactionState::Active => Ok(()),
            TransactionState::Aborted => Err(TxnError::not_active(
                "transaction is not active",
                inner.abort_cause.clone(),
            )),
            state => Err(TxnError::illegal_state(format!(
                "transaction is not active: {state}"
            ))),
        }
    }

    fn abort_unless_aborted(&self, error: &TxnError) {
        if self.state() == TransactionState::Aborted {
            return;
        }
        if let Err(abort_error) = self.abort(error.clone()) {
            warn!(txn = %self.id, %abort_error, "abort after failure did not complete");
        }
    }

    /// Calls `before_completion` on each listener, including listeners
    /// registered by earlier callbacks.
    fn notify_before_completion(&self) -> TxnResult<()> {
        let mut index = 0;
        loop {
            let listener = match self.inner.lock().listeners.get(index) {
                Some(listener) => Arc::clone(listener),
                None => return Ok(()),
            };
            index += 1;

            if let Err(error) = listener.before_completion(self) {
                trace!(
                    txn = %self.id,
                    listener = listener.type_name(),
                    %error,
                    "before_completion failed"
                );
                self.abort_unless_aborted(&error);
                return Err(error);
            }
            if self.state() == TransactionState::Aborted {
                return Err(TxnError::aborted_by(self.abort_cause()));
            }
        }
    }

    fn notify_after_completion(listeners: &[Arc<dyn TransactionListener>], committed: bool) {
        for listener in listeners {
            listener.after_completion(committed);
        }
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Transaction {}

impl Hash for Transaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("timeout", &self.timeout)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
