//! # Tessera World
//!
//! Tile boards, levels and connectors whose state lives in a transactional
//! object store.
//!
//! Each tile of a [`Board`] is its own stored object. Movement, joining,
//! leaving and picking up items all run inside a caller-supplied
//! transaction, so two characters racing for the same tile are serialized
//! by the store while characters on different tiles move in parallel.
//! Messages to the characters on a [`Level`] are buffered by a
//! [`TransactionalChannel`] and delivered only when the transaction
//! commits.
//!
//! ## Example
//!
//! ```rust
//! use tessera_store::StoreConfig;
//! use tessera_txn::{CoordinatorConfig, TimeoutPolicy, TransactionCoordinator};
//! use tessera_world::{BoardSpec, CharacterKind, Direction, SpriteId, World, WorldConfig};
//!
//! let coordinator = TransactionCoordinator::new(CoordinatorConfig::default()).unwrap();
//! let world = World::new(WorldConfig::default(), StoreConfig::default());
//!
//! let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
//! let level = world
//!     .add_level(handle.transaction(), "cave", &BoardSpec::open(3, 3, SpriteId(1)))
//!     .unwrap();
//! let hero = world
//!     .create_character(handle.transaction(), "hero", CharacterKind::Player)
//!     .unwrap();
//! assert!(level.add_character_at(handle.transaction(), hero, 1, 1).unwrap());
//! handle.commit().unwrap();
//!
//! let handle = coordinator.create_transaction(TimeoutPolicy::Bounded);
//! assert!(level.move_character(handle.transaction(), hero, Direction::Up).unwrap());
//! handle.commit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod board;
mod channel;
mod character;
mod collision;
mod config;
mod connector;
mod error;
mod level;
mod object;
mod tile;
mod types;
mod world;

pub use board::{Board, BoardSnapshot, BoardSpace, BoardSpec};
pub use channel::{Channel, LevelMessage, TransactionalChannel};
pub use character::CharacterState;
pub use collision::{BlockingResolver, CollisionResolver};
pub use config::WorldConfig;
pub use connector::{Connector, Endpoint, OneWayConnector, PlayerConnector, SimpleConnector};
pub use error::{WorldError, WorldResult};
pub use level::Level;
pub use object::{Roster, WorldObject, WorldStore};
pub use tile::{Tile, TileKind};
pub use types::{ActionResult, CharacterId, CharacterKind, Direction, ItemId, SpriteId};
pub use world::{Location, World};
