//! Scriptable transaction participants that record what happened to them.

use parking_lot::Mutex;
use std::sync::Arc;
use tessera_txn::{Durability, Transaction, TransactionParticipant, TxnResult};

/// Observable state of a [`RecordingParticipant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    /// Joined, nothing else happened.
    Active,
    /// Prepared and not read-only.
    Prepared,
    /// Committed.
    Committed,
    /// Aborted.
    Aborted,
}

type PrepareHook = Box<dyn Fn(&Transaction) -> TxnResult<bool> + Send + Sync>;
type ActionHook = Box<dyn Fn(&Transaction) -> TxnResult<()> + Send + Sync>;

/// A participant whose callbacks can be scripted.
///
/// Every callback is recorded when it is entered. A hook that returns an
/// error leaves the state unchanged; otherwise the state advances. Prepare
/// and prepare-and-commit only advance from [`ParticipantState::Active`],
/// so a participant aborted from inside its own hook stays aborted.
pub struct RecordingParticipant {
    durability: Durability,
    read_only: bool,
    on_prepare: Option<PrepareHook>,
    on_prepare_and_commit: Option<ActionHook>,
    on_commit: Option<ActionHook>,
    on_abort: Option<ActionHook>,
    state: Mutex<ParticipantState>,
    prepared_read_only: Mutex<bool>,
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingParticipant {
    fn new(durability: Durability) -> Self {
        Self {
            durability,
            read_only: false,
            on_prepare: None,
            on_prepare_and_commit: None,
            on_commit: None,
            on_abort: None,
            state: Mutex::new(ParticipantState::Active),
            prepared_read_only: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates a durable participant.
    pub fn durable() -> Self {
        Self::new(Durability::Durable)
    }

    /// Creates a non-durable participant.
    pub fn non_durable() -> Self {
        Self::new(Durability::NonDurable)
    }

    /// Makes prepare report read-only unless a prepare hook says otherwise.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Runs `hook` as prepare.
    #[must_use]
    pub fn on_prepare<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Transaction) -> TxnResult<bool> + Send + Sync + 'static,
    {
        self.on_prepare = Some(Box::new(hook));
        self
    }

    /// Runs `hook` as prepare-and-commit.
    #[must_use]
    pub fn on_prepare_and_commit<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Transaction) -> TxnResult<()> + Send + Sync + 'static,
    {
        self.on_prepare_and_commit = Some(Box::new(hook));
        self
    }

    /// Runs `hook` as commit.
    #[must_use]
    pub fn on_commit<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Transaction) -> TxnResult<()> + Send + Sync + 'static,
    {
        self.on_commit = Some(Box::new(hook));
        self
    }

    /// Runs `hook` as abort.
    #[must_use]
    pub fn on_abort<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Transaction) -> TxnResult<()> + Send + Sync + 'static,
    {
        self.on_abort = Some(Box::new(hook));
        self
    }

    /// Wraps the participant for joining.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ParticipantState {
        *self.state.lock()
    }

    /// Returns true if prepare reported read-only.
    #[must_use]
    pub fn prepare_returned_true(&self) -> bool {
        *self.prepared_read_only.lock()
    }

    /// Returns the callbacks entered so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().push(call);
    }

    fn advance_from_active(&self, next: ParticipantState) {
        let mut state = self.state.lock();
        if *state == ParticipantState::Active {
            *state = next;
        }
    }

    fn set_state(&self, next: ParticipantState) {
        *self.state.lock() = next;
    }
}

impl TransactionParticipant for RecordingParticipant {
    fn durability(&self) -> Durability {
        self.durability
    }

    fn prepare(&self, txn: &Transaction) -> TxnResult<bool> {
        self.record("prepare");
        let read_only = match &self.on_prepare {
            Some(hook) => hook(txn)?,
            None => self.read_only,
        };
        *self.prepared_read_only.lock() = read_only;
        if !read_only {
            self.advance_from_active(ParticipantState::Prepared);
        }
        Ok(read_only)
    }

    fn commit(&self, txn: &Transaction) -> TxnResult<()> {
        self.record("commit");
        if let Some(hook) = &self.on_commit {
            hook(txn)?;
        }
        self.set_state(ParticipantState::Committed);
        Ok(())
    }

    fn prepare_and_commit(&self, txn: &Transaction) -> TxnResult<()> {
        self.record("prepare_and_commit");
        if let Some(hook) = &self.on_prepare_and_commit {
            hook(txn)?;
        }
        self.advance_from_active(ParticipantState::Committed);
        Ok(())
    }

    fn abort(&self, txn: &Transaction) -> TxnResult<()> {
        self.record("abort");
        if let Some(hook) = &self.on_abort {
            hook(txn)?;
        }
        self.set_state(ParticipantState::Aborted);
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "RecordingParticipant"
    }
}

impl std::fmt::Debug for RecordingParticipant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingParticipant")
            .field("durability", &self.durability)
            .field("state", &self.state())
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}
