//! # Tessera Store
//!
//! A transactional object store.
//!
//! Objects are addressed by [`ObjectId`] and can be bound to names. Every
//! object is its own unit of isolation: locking an object for mutation inside
//! a transaction blocks other transactions that want the same object until
//! the first one commits or aborts, while work on other objects proceeds in
//! parallel. Changes are made on private working copies and published on
//! commit.
//!
//! The store joins each transaction that mutates it as the transaction's
//! durable participant.
//!
//! ## Example
//!
//! ```rust
//! use tessera_store::{ObjectStore, StoreConfig};
//! use tessera_txn::{CoordinatorConfig, TimeoutPolicy, TransactionCoordinator};
//!
//! let coordinator = TransactionCoordinator::new(CoordinatorConfig::default()).unwrap();
//! let store = ObjectStore::<String>::new(StoreConfig::default());
//!
//! let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
//! let id = store
//!     .create(handle.transaction(), "hello".to_string(), Some("greeting"))
//!     .unwrap();
//! handle.commit().unwrap();
//!
//! let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
//! assert_eq!(store.lookup(handle.transaction(), "greeting").unwrap(), id);
//! assert_eq!(store.peek(handle.transaction(), id).unwrap(), "hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod id;
mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use id::ObjectId;
pub use store::ObjectStore;
