//! Messages from levels to the characters on them.

use crate::board::{BoardSnapshot, BoardSpace};
use crate::error::WorldResult;
use crate::types::CharacterId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tessera_txn::{
    Durability, Transaction, TransactionId, TransactionParticipant, TxnError, TxnResult,
};
use tracing::trace;

/// A message a level sends to characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LevelMessage {
    /// The whole board, sent to a character joining the level.
    Board {
        /// The level.
        level: String,
        /// The board.
        board: BoardSnapshot,
    },
    /// Cells that changed.
    Update {
        /// The level.
        level: String,
        /// The changed cells.
        spaces: Vec<BoardSpace>,
    },
}

/// Sends messages on behalf of a transaction.
pub trait Channel: Send + Sync {
    /// Sends `message` to every character in `recipients`.
    ///
    /// Messages must not be seen by anyone unless `txn` commits.
    fn send(&self, txn: &Transaction, recipients: &[CharacterId], message: LevelMessage)
        -> WorldResult<()>;

    /// Discards whatever is still waiting for `character` once `txn`
    /// commits. Messages sent to it later start a fresh mailbox.
    fn close(&self, txn: &Transaction, character: CharacterId) -> WorldResult<()>;
}

enum Outgoing {
    Send {
        recipients: Vec<CharacterId>,
        message: LevelMessage,
    },
    Close(CharacterId),
}

/// A channel that holds messages back until their transaction commits.
///
/// The channel joins each sending transaction as a non-durable participant.
/// On commit the buffered messages go into per-character mailboxes and
/// closed mailboxes are emptied, in the order the transaction asked for;
/// on abort everything buffered is dropped.
pub struct TransactionalChannel {
    this: Weak<TransactionalChannel>,
    pending: Mutex<HashMap<TransactionId, Vec<Outgoing>>>,
    mailboxes: Mutex<HashMap<CharacterId, Vec<LevelMessage>>>,
    delivered: AtomicU64,
}

impl TransactionalChannel {
    /// Creates a channel with empty mailboxes.
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            pending: Mutex::new(HashMap::new()),
            mailboxes: Mutex::new(HashMap::new()),
            delivered: AtomicU64::new(0),
        })
    }

    /// Removes and returns the messages delivered to `character`.
    pub fn take_messages(&self, character: CharacterId) -> Vec<LevelMessage> {
        self.mailboxes.lock().remove(&character).unwrap_or_default()
    }

    /// Returns the number of characters with undrained messages.
    #[must_use]
    pub fn open_mailboxes(&self) -> usize {
        self.mailboxes.lock().len()
    }

    /// Returns the number of messages delivered so far, counting a message
    /// sent to several characters once.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    fn participant(&self) -> TxnResult<Arc<Self>> {
        self.this
            .upgrade()
            .ok_or_else(|| TxnError::illegal_state("channel dropped"))
    }

    fn enqueue(&self, txn: &Transaction, outgoing: Outgoing) -> WorldResult<()> {
        txn.join(self.participant()?)?;
        self.pending
            .lock()
            .entry(txn.id())
            .or_default()
            .push(outgoing);
        Ok(())
    }
}

impl Channel for TransactionalChannel {
    fn send(
        &self,
        txn: &Transaction,
        recipients: &[CharacterId],
        message: LevelMessage,
    ) -> WorldResult<()> {
        if recipients.is_empty() {
            return Ok(());
        }
        self.enqueue(
            txn,
            Outgoing::Send {
                recipients: recipients.to_vec(),
                message,
            },
        )
    }

    fn close(&self, txn: &Transaction, character: CharacterId) -> WorldResult<()> {
        self.enqueue(txn, Outgoing::Close(character))
    }
}

impl TransactionParticipant for TransactionalChannel {
    fn durability(&self) -> Durability {
        Durability::NonDurable
    }

    fn prepare(&self, txn: &Transaction) -> TxnResult<bool> {
        let mut pending = self.pending.lock();
        let read_only = pending.get(&txn.id()).map_or(true, Vec::is_empty);
        if read_only {
            pending.remove(&txn.id());
        }
        Ok(read_only)
    }

    fn commit(&self, txn: &Transaction) -> TxnResult<()> {
        let Some(outgoing) = self.pending.lock().remove(&txn.id()) else {
            return Ok(());
        };
        trace!(txn = %txn.id(), entries = outgoing.len(), "deliver");
        let mut count = 0;
        let mut mailboxes = self.mailboxes.lock();
        for entry in outgoing {
            match entry {
                Outgoing::Send {
                    recipients,
                    message,
                } => {
                    for recipient in recipients {
                        mailboxes.entry(recipient).or_default().push(message.clone());
                    }
                    count += 1;
                }
                Outgoing::Close(character) => {
                    mailboxes.remove(&character);
                }
            }
        }
        self.delivered.fetch_add(count, Ordering::Relaxed);
        Ok(())
    }

    fn abort(&self, txn: &Transaction) -> TxnResult<()> {
        if let Some(outgoing) = self.pending.lock().remove(&txn.id()) {
            trace!(txn = %txn.id(), entries = outgoing.len(), "discard");
        }
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "TransactionalChannel"
    }
}

impl std::fmt::Debug for TransactionalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionalChannel")
            .field("pending", &self.pending.lock().len())
            .field("delivered", &self.delivered())
            .finish_non_exhaustive()
    }
}
