//! Committed and aborted write batches against a plain map.

use std::collections::HashMap;
use std::time::Duration;

use proptest::prelude::*;
use tessera_store::{ObjectStore, StoreConfig};
use tessera_txn::{CoordinatorConfig, TimeoutPolicy, TransactionCoordinator, TxnError};

const SLOTS: usize = 4;

fn batch_strategy() -> impl Strategy<Value = (Vec<(usize, u64)>, bool)> {
    (
        prop::collection::vec((0..SLOTS, any::<u64>()), 1..6),
        any::<bool>(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn only_committed_batches_survive(batches in prop::collection::vec(batch_strategy(), 1..12)) {
        let coordinator = TransactionCoordinator::new(
            CoordinatorConfig::new().bounded_timeout(Duration::from_secs(5)),
        )
        .unwrap();
        let store = ObjectStore::new(StoreConfig::new().lock_wait(Duration::from_millis(10)));

        let setup = coordinator.create_transaction(TimeoutPolicy::Bounded);
        let ids: Vec<_> = (0..SLOTS)
            .map(|_| store.create(setup.transaction(), 0u64, None).unwrap())
            .collect();
        setup.commit().unwrap();
        let mut model: HashMap<usize, u64> = (0..SLOTS).map(|slot| (slot, 0)).collect();

        for (writes, commit) in batches {
            let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
            for &(slot, value) in &writes {
                store.update(handle.transaction(), ids[slot], value).unwrap();
                prop_assert_eq!(store.peek(handle.transaction(), ids[slot]).unwrap(), value);
            }
            if commit {
                handle.commit().unwrap();
                for (slot, value) in writes {
                    model.insert(slot, value);
                }
            } else {
                handle.transaction().abort(TxnError::failed("discard")).unwrap();
            }
        }

        let reader = coordinator.create_transaction(TimeoutPolicy::Bounded);
        for (slot, id) in ids.iter().enumerate() {
            prop_assert_eq!(store.peek(reader.transaction(), *id).unwrap(), model[&slot]);
        }
    }
}
