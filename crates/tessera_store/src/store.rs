//! Transactional object store.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::id::ObjectId;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tessera_txn::{Durability, Transaction, TransactionId, TransactionParticipant, TxnError, TxnResult};
use tracing::trace;

/// Committed state of one object.
struct SlotState<T> {
    /// `None` until the creating transaction commits, and after destruction.
    value: Option<T>,
    /// Transaction holding the exclusive lock.
    owner: Option<TransactionId>,
}

struct Slot<T> {
    state: Mutex<SlotState<T>>,
    released: Condvar,
}

impl<T> Slot<T> {
    fn release(&self, value: Option<Option<T>>) {
        let mut state = self.state.lock();
        if let Some(value) = value {
            state.value = value;
        }
        state.owner = None;
        self.released.notify_all();
    }
}

/// Pending change to one object.
enum Write<T> {
    Update(T),
    Destroy,
}

/// Changes a transaction made to the store.
struct TxnContext<T> {
    writes: HashMap<ObjectId, Write<T>>,
    created: HashSet<ObjectId>,
    /// Pending name changes; `None` removes the binding.
    bindings: HashMap<String, Option<ObjectId>>,
}

impl<T> TxnContext<T> {
    fn new() -> Self {
        Self {
            writes: HashMap::new(),
            created: HashSet::new(),
            bindings: HashMap::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.bindings.is_empty()
    }
}

/// A transactional store of objects of type `T`.
///
/// Reads through [`peek`](Self::peek) never block. Mutations lock the object
/// exclusively until the transaction commits or aborts; a transaction waits
/// at most [`StoreConfig::lock_wait`] for a lock held by another transaction
/// and then fails with a retryable `Conflict`.
///
/// All operations check the transaction's timeout first.
pub struct ObjectStore<T> {
    config: StoreConfig,
    this: Weak<ObjectStore<T>>,
    objects: RwLock<HashMap<ObjectId, Arc<Slot<T>>>>,
    bindings: RwLock<HashMap<String, ObjectId>>,
    contexts: Mutex<HashMap<TransactionId, TxnContext<T>>>,
}

impl<T> ObjectStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an empty store.
    pub fn new(config: StoreConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            config,
            this: this.clone(),
            objects: RwLock::new(HashMap::new()),
            bindings: RwLock::new(HashMap::new()),
            contexts: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the number of objects, including uncommitted creations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Creates an object, optionally binding it to a name.
    ///
    /// The new object is locked by `txn` until it completes.
    pub fn create(&self, txn: &Transaction, value: T, name: Option<&str>) -> StoreResult<ObjectId> {
        txn.check_timeout()?;
        if let Some(name) = name {
            if self.resolve(txn.id(), name).is_some() {
                return Err(StoreError::NameAlreadyBound(name.to_string()));
            }
        }
        self.join(txn)?;

        let id = ObjectId::new();
        let slot = Arc::new(Slot {
            state: Mutex::new(SlotState {
                value: None,
                owner: Some(txn.id()),
            }),
            released: Condvar::new(),
        });
        self.objects.write().insert(id, slot);

        let mut contexts = self.contexts.lock();
        let context = contexts.entry(txn.id()).or_insert_with(TxnContext::new);
        context.writes.insert(id, Write::Update(value));
        context.created.insert(id);
        if let Some(name) = name {
            context.bindings.insert(name.to_string(), Some(id));
        }
        trace!(txn = %txn.id(), object = %id, "create");
        Ok(id)
    }

    /// Locks an object for mutation and returns the transaction's copy.
    ///
    /// Blocks while another transaction holds the lock.
    pub fn lock(&self, txn: &Transaction, id: ObjectId) -> StoreResult<T> {
        txn.check_timeout()?;
        if let Some(write) = self.contexts.lock().get(&txn.id()).and_then(|c| c.writes.get(&id)) {
            return match write {
                Write::Update(value) => Ok(value.clone()),
                Write::Destroy => Err(StoreError::NotFound(id)),
            };
        }

        let slot = self.slot(id)?;
        self.join(txn)?;
        let value = self.acquire(txn, id, &slot)?;
        self.contexts
            .lock()
            .entry(txn.id())
            .or_insert_with(TxnContext::new)
            .writes
            .insert(id, Write::Update(value.clone()));
        trace!(txn = %txn.id(), object = %id, "lock");
        Ok(value)
    }

    /// Replaces the transaction's copy of an object.
    pub fn update(&self, txn: &Transaction, id: ObjectId, value: T) -> StoreResult<()> {
        self.lock(txn, id)?;
        self.set_working(txn.id(), id, Write::Update(value));
        Ok(())
    }

    /// Locks an object and applies `f` to the transaction's copy.
    pub fn modify<R>(&self, txn: &Transaction, id: ObjectId, f: impl FnOnce(&mut T) -> R) -> StoreResult<R> {
        let mut value = self.lock(txn, id)?;
        let result = f(&mut value);
        self.set_working(txn.id(), id, Write::Update(value));
        Ok(result)
    }

    /// Reads an object without locking it.
    ///
    /// Returns the transaction's own copy if it changed the object, otherwise
    /// the last committed value.
    pub fn peek(&self, txn: &Transaction, id: ObjectId) -> StoreResult<T> {
        txn.check_timeout()?;
        if let Some(write) = self.contexts.lock().get(&txn.id()).and_then(|c| c.writes.get(&id)) {
            return match write {
                Write::Update(value) => Ok(value.clone()),
                Write::Destroy => Err(StoreError::NotFound(id)),
            };
        }
        let slot = self.slot(id)?;
        let state = slot.state.lock();
        state.value.clone().ok_or(StoreError::NotFound(id))
    }

    /// Destroys an object when the transaction commits.
    pub fn destroy(&self, txn: &Transaction, id: ObjectId) -> StoreResult<()> {
        self.lock(txn, id)?;
        self.set_working(txn.id(), id, Write::Destroy);
        trace!(txn = %txn.id(), object = %id, "destroy");
        Ok(())
    }

    /// Returns the object bound to `name`.
    pub fn lookup(&self, txn: &Transaction, name: &str) -> StoreResult<ObjectId> {
        txn.check_timeout()?;
        self.resolve(txn.id(), name)
            .ok_or_else(|| StoreError::NameNotBound(name.to_string()))
    }

    /// Binds `name` to an object, replacing any previous binding.
    pub fn bind(&self, txn: &Transaction, name: &str, id: ObjectId) -> StoreResult<()> {
        self.peek(txn, id)?;
        self.join(txn)?;
        self.contexts
            .lock()
            .entry(txn.id())
            .or_insert_with(TxnContext::new)
            .bindings
            .insert(name.to_string(), Some(id));
        Ok(())
    }

    /// Removes the binding for `name`.
    pub fn unbind(&self, txn: &Transaction, name: &str) -> StoreResult<()> {
        self.lookup(txn, name)?;
        self.join(txn)?;
        self.contexts
            .lock()
            .entry(txn.id())
            .or_insert_with(TxnContext::new)
            .bindings
            .insert(name.to_string(), None);
        Ok(())
    }

    // === Internal helpers ===

    fn join(&self, txn: &Transaction) -> StoreResult<()> {
        if self.contexts.lock().contains_key(&txn.id()) {
            return Ok(());
        }
        let this = self
            .this
            .upgrade()
            .ok_or_else(|| TxnError::illegal_state("object store was dropped"))?;
        txn.join(this)?;
        self.contexts.lock().entry(txn.id()).or_insert_with(TxnContext::new);
        Ok(())
    }

    fn slot(&self, id: ObjectId) -> StoreResult<Arc<Slot<T>>> {
        self.objects
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn resolve(&self, txn: TransactionId, name: &str) -> Option<ObjectId> {
        if let Some(pending) = self.contexts.lock().get(&txn).and_then(|c| c.bindings.get(name)) {
            return *pending;
        }
        self.bindings.read().get(name).copied()
    }

    fn set_working(&self, txn: TransactionId, id: ObjectId, write: Write<T>) {
        if let Some(context) = self.contexts.lock().get_mut(&txn) {
            context.writes.insert(id, write);
        }
    }

    /// Waits for the object's lock and takes it.
    fn acquire(&self, txn: &Transaction, id: ObjectId, slot: &Slot<T>) -> StoreResult<T> {
        let deadline = Instant::now().checked_add(self.config.lock_wait);
        let mut state = slot.state.lock();
        while let Some(owner) = state.owner {
            if owner == txn.id() {
                break;
            }
            let timed_out = match deadline {
                Some(deadline) => slot.released.wait_until(&mut state, deadline).timed_out(),
                None => {
                    slot.released.wait(&mut state);
                    false
                }
            };
            if timed_out && state.owner.is_some_and(|o| o != txn.id()) {
                return Err(TxnError::conflict(format!(
                    "{} could not lock {id} held by {owner}",
                    txn.id()
                ))
                .into());
            }
        }
        let value = state.value.clone().ok_or(StoreError::NotFound(id))?;
        state.owner = Some(txn.id());
        Ok(value)
    }

    fn take_context(&self, txn: &Transaction) -> Option<TxnContext<T>> {
        self.contexts.lock().remove(&txn.id())
    }
}

impl<T> TransactionParticipant for ObjectStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn durability(&self) -> Durability {
        Durability::Durable
    }

    fn prepare(&self, txn: &Transaction) -> TxnResult<bool> {
        let read_only = self
            .contexts
            .lock()
            .get(&txn.id())
            .map_or(true, TxnContext::is_empty);
        if read_only {
            self.take_context(txn);
        }
        Ok(read_only)
    }

    fn commit(&self, txn: &Transaction) -> TxnResult<()> {
        let Some(context) = self.take_context(txn) else {
            return Ok(());
        };
        for (id, write) in context.writes {
            let Ok(slot) = self.slot(id) else { continue };
            match write {
                Write::Update(value) => slot.release(Some(Some(value))),
                Write::Destroy => {
                    self.objects.write().remove(&id);
                    slot.release(Some(None));
                }
            }
        }
        let mut bindings = self.bindings.write();
        for (name, target) in context.bindings {
            match target {
                Some(id) => bindings.insert(name, id),
                None => bindings.remove(&name),
            };
        }
        trace!(txn = %txn.id(), "store committed");
        Ok(())
    }

    fn abort(&self, txn: &Transaction) -> TxnResult<()> {
        let Some(context) = self.take_context(txn) else {
            return Ok(());
        };
        for id in context.writes.keys() {
            let slot = if context.created.contains(id) {
                self.objects.write().remove(id)
            } else {
                self.objects.read().get(id).cloned()
            };
            if let Some(slot) = slot {
                slot.release(None);
            }
        }
        trace!(txn = %txn.id(), "store aborted");
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "ObjectStore"
    }
}

impl<T> std::fmt::Debug for ObjectStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("objects", &self.objects.read().len())
            .field("bindings", &self.bindings.read().len())
            .field("active_transactions", &self.contexts.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tessera_txn::{CoordinatorConfig, TimeoutPolicy, TransactionCoordinator};

    fn create_store() -> (TransactionCoordinator, Arc<ObjectStore<u32>>) {
        let coordinator = TransactionCoordinator::new(CoordinatorConfig::default()).unwrap();
        let store = ObjectStore::new(StoreConfig::new().lock_wait(Duration::from_millis(20)));
        (coordinator, store)
    }

    #[test]
    fn create_visible_after_commit() {
        let (coordinator, store) = create_store();
        let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
        let id = store.create(handle.transaction(), 5, None).unwrap();
        assert_eq!(store.peek(handle.transaction(), id).unwrap(), 5);
        handle.commit().unwrap();

        let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
        assert_eq!(store.peek(handle.transaction(), id).unwrap(), 5);
    }

    #[test]
    fn create_discarded_on_abort() {
        let (coordinator, store) = create_store();
        let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
        let id = store.create(handle.transaction(), 5, Some("five")).unwrap();
        handle.transaction().abort(TxnError::failed("stop")).unwrap();

        let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
        assert!(matches!(
            store.peek(handle.transaction(), id),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.lookup(handle.transaction(), "five"),
            Err(StoreError::NameNotBound(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn read_only_transaction_prepares_read_only() {
        let (coordinator, store) = create_store();
        let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
        store.create(handle.transaction(), 1, Some("one")).unwrap();
        handle.commit().unwrap();

        let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
        let id = store.lookup(handle.transaction(), "one").unwrap();
        store.peek(handle.transaction(), id).unwrap();
        assert_eq!(handle.transaction().participant_count(), 0);
        handle.commit().unwrap();
    }

    #[test]
    fn uncommitted_changes_are_private() {
        let (coordinator, store) = create_store();
        let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
        let id = store.create(handle.transaction(), 1, None).unwrap();
        handle.commit().unwrap();

        let writer = coordinator.create_transaction(TimeoutPolicy::Bounded);
        store.modify(writer.transaction(), id, |v| *v = 2).unwrap();
        let reader = coordinator.create_transaction(TimeoutPolicy::Bounded);
        assert_eq!(store.peek(reader.transaction(), id).unwrap(), 1);
        assert_eq!(store.peek(writer.transaction(), id).unwrap(), 2);

        writer.commit().unwrap();
        assert_eq!(store.peek(reader.transaction(), id).unwrap(), 2);
    }

    #[test]
    fn destroy_removes_object() {
        let (coordinator, store) = create_store();
        let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
        let id = store.create(handle.transaction(), 1, None).unwrap();
        handle.commit().unwrap();

        let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
        store.destroy(handle.transaction(), id).unwrap();
        assert!(store.peek(handle.transaction(), id).is_err());
        handle.commit().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn duplicate_name_rejected() {
        let (coordinator, store) = create_store();
        let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
        store.create(handle.transaction(), 1, Some("a")).unwrap();
        let result = store.create(handle.transaction(), 2, Some("a"));
        assert!(matches!(result, Err(StoreError::NameAlreadyBound(_))));
    }

    #[test]
    fn bind_and_unbind() {
        let (coordinator, store) = create_store();
        let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
        let id = store.create(handle.transaction(), 1, None).unwrap();
        store.bind(handle.transaction(), "alias", id).unwrap();
        handle.commit().unwrap();

        let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
        assert_eq!(store.lookup(handle.transaction(), "alias").unwrap(), id);
        store.unbind(handle.transaction(), "alias").unwrap();
        assert!(store.lookup(handle.transaction(), "alias").is_err());
        handle.commit().unwrap();
    }
}
