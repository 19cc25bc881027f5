//! Per-object isolation across concurrent transactions.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use tessera_store::{ObjectId, ObjectStore, StoreConfig, StoreError, StoreResult};
use tessera_txn::{
    CoordinatorConfig, RetryStatus, SchedulerConfig, TimeoutPolicy, TransactionCoordinator,
    TransactionScheduler, TxnError,
};

fn setup(lock_wait: Duration) -> (Arc<TransactionCoordinator>, Arc<ObjectStore<u64>>) {
    let coordinator = Arc::new(
        TransactionCoordinator::new(
            CoordinatorConfig::new().bounded_timeout(Duration::from_secs(5)),
        )
        .unwrap(),
    );
    let store = ObjectStore::new(StoreConfig::new().lock_wait(lock_wait));
    (coordinator, store)
}

fn seed(coordinator: &TransactionCoordinator, store: &ObjectStore<u64>, value: u64) -> ObjectId {
    let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
    let id = store.create(handle.transaction(), value, None).unwrap();
    handle.commit().unwrap();
    id
}

#[test]
fn contended_lock_times_out_with_conflict() {
    let (coordinator, store) = setup(Duration::from_millis(30));
    let id = seed(&coordinator, &store, 0);

    let holder = coordinator.create_transaction(TimeoutPolicy::Bounded);
    store.modify(holder.transaction(), id, |v| *v = 1).unwrap();

    let other_coordinator = Arc::clone(&coordinator);
    let other_store = Arc::clone(&store);
    let result = thread::spawn(move || {
        let handle = other_coordinator.create_transaction(TimeoutPolicy::Bounded);
        let result = other_store.lock(handle.transaction(), id);
        handle.transaction().abort(TxnError::failed("done")).unwrap();
        result
    })
    .join()
    .unwrap();

    let error = result.unwrap_err();
    assert!(matches!(error, StoreError::Txn(TxnError::Conflict { .. })));
    assert!(error.is_retryable());

    holder.commit().unwrap();
    let reader = coordinator.create_transaction(TimeoutPolicy::Bounded);
    assert_eq!(store.peek(reader.transaction(), id).unwrap(), 1);
}

#[test]
fn waiter_proceeds_after_release() {
    let (coordinator, store) = setup(Duration::from_secs(5));
    let id = seed(&coordinator, &store, 10);
    let locked = Arc::new(Barrier::new(2));

    let holder = {
        let coordinator = Arc::clone(&coordinator);
        let store = Arc::clone(&store);
        let locked = Arc::clone(&locked);
        thread::spawn(move || {
            let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
            store.modify(handle.transaction(), id, |v| *v += 1).unwrap();
            locked.wait();
            thread::sleep(Duration::from_millis(30));
            handle.commit().unwrap();
        })
    };

    locked.wait();
    let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
    let seen = store.lock(handle.transaction(), id).unwrap();
    assert_eq!(seen, 11);
    store.update(handle.transaction(), id, seen + 1).unwrap();
    handle.commit().unwrap();
    holder.join().unwrap();

    let reader = coordinator.create_transaction(TimeoutPolicy::Bounded);
    assert_eq!(store.peek(reader.transaction(), id).unwrap(), 12);
}

#[test]
fn aborted_changes_released() {
    let (coordinator, store) = setup(Duration::from_millis(30));
    let id = seed(&coordinator, &store, 3);

    let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
    store.update(handle.transaction(), id, 99).unwrap();
    handle.transaction().abort(TxnError::failed("rollback")).unwrap();

    let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
    assert_eq!(store.lock(handle.transaction(), id).unwrap(), 3);
    handle.commit().unwrap();
}

#[test]
fn disjoint_objects_do_not_contend() {
    let (coordinator, store) = setup(Duration::from_millis(30));
    let a = seed(&coordinator, &store, 0);
    let b = seed(&coordinator, &store, 0);
    let both_locked = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [a, b]
        .into_iter()
        .map(|id| {
            let coordinator = Arc::clone(&coordinator);
            let store = Arc::clone(&store);
            let both_locked = Arc::clone(&both_locked);
            thread::spawn(move || {
                let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
                store.modify(handle.transaction(), id, |v| *v = 7).unwrap();
                both_locked.wait();
                handle.commit().unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let reader = coordinator.create_transaction(TimeoutPolicy::Bounded);
    assert_eq!(store.peek(reader.transaction(), a).unwrap(), 7);
    assert_eq!(store.peek(reader.transaction(), b).unwrap(), 7);
}

#[test]
fn concurrent_increments_are_serialized() {
    let (coordinator, store) = setup(Duration::from_millis(20));
    let id = seed(&coordinator, &store, 0);
    let scheduler = TransactionScheduler::new(
        Arc::clone(&coordinator),
        SchedulerConfig::new().with_max_attempts(1000),
    );

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let scheduler = scheduler.clone();
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..25 {
                    let result: StoreResult<()> =
                        scheduler.run_task(|txn| store.modify(txn, id, |v| *v += 1));
                    result.unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let reader = coordinator.create_transaction(TimeoutPolicy::Bounded);
    assert_eq!(store.peek(reader.transaction(), id).unwrap(), 100);
}

#[test]
fn timed_out_transaction_cannot_read() {
    let (_, store) = setup(Duration::from_millis(30));
    let coordinator = TransactionCoordinator::new(
        CoordinatorConfig::new().bounded_timeout(Duration::from_millis(50)),
    )
    .unwrap();
    let id = seed(&coordinator, &store, 1);

    let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
    thread::sleep(Duration::from_millis(100));
    let error = store.peek(handle.transaction(), id).unwrap_err();
    assert!(matches!(error, StoreError::Txn(TxnError::Timeout { .. })));
}

#[test]
fn transactions_of_separate_coordinators_contend() {
    let (first, store) = setup(Duration::from_millis(30));
    let second = TransactionCoordinator::new(
        CoordinatorConfig::new().bounded_timeout(Duration::from_secs(5)),
    )
    .unwrap();
    let id = seed(&first, &store, 0);

    let holder = first.create_transaction(TimeoutPolicy::Bounded);
    let intruder = second.create_transaction(TimeoutPolicy::Bounded);
    assert_ne!(holder.transaction().id(), intruder.transaction().id());

    store.update(holder.transaction(), id, 1).unwrap();
    let error = store.update(intruder.transaction(), id, 2).unwrap_err();
    assert!(matches!(error, StoreError::Txn(TxnError::Conflict { .. })));
    assert!(error.is_retryable());
    intruder
        .transaction()
        .abort(TxnError::failed("lost the lock"))
        .unwrap();

    holder.commit().unwrap();
    let reader = second.create_transaction(TimeoutPolicy::Bounded);
    assert_eq!(store.peek(reader.transaction(), id).unwrap(), 1);
}

#[test]
fn dropped_handle_releases_locks() {
    let (coordinator, store) = setup(Duration::from_millis(30));
    let id = seed(&coordinator, &store, 5);

    {
        let forgotten = coordinator.create_transaction(TimeoutPolicy::Bounded);
        store.update(forgotten.transaction(), id, 50).unwrap();
    }

    let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
    assert_eq!(store.lock(handle.transaction(), id).unwrap(), 5);
    store.update(handle.transaction(), id, 6).unwrap();
    handle.commit().unwrap();

    let reader = coordinator.create_transaction(TimeoutPolicy::Bounded);
    assert_eq!(store.peek(reader.transaction(), id).unwrap(), 6);
}
