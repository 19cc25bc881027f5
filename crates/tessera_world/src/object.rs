//! Typed access to the shared object store.
//!
//! Every tile, level roster and character of a world lives in one
//! [`ObjectStore`], so a transaction touching several of them still has a
//! single durable participant.

use crate::character::CharacterState;
use crate::error::{WorldError, WorldResult};
use crate::tile::Tile;
use crate::types::{CharacterId, CharacterKind};
use std::collections::BTreeSet;
use std::sync::Arc;
use tessera_store::{ObjectId, ObjectStore, StoreConfig, StoreError};
use tessera_txn::Transaction;

/// The characters present on a level.
pub type Roster = BTreeSet<CharacterId>;

/// Anything a world keeps in its store.
#[derive(Debug, Clone)]
pub enum WorldObject {
    /// One board cell.
    Tile(Tile),
    /// The characters on a level.
    Roster(Roster),
    /// A character.
    Character(CharacterState),
}

/// A value that can be kept in the world store.
pub(crate) trait StoredObject: Clone + Sized {
    const KIND: &'static str;

    fn into_object(self) -> WorldObject;

    fn from_object(object: WorldObject) -> Option<Self>;

    fn from_object_mut(object: &mut WorldObject) -> Option<&mut Self>;
}

macro_rules! stored_object {
    ($ty:ty, $variant:ident, $kind:literal) => {
        impl StoredObject for $ty {
            const KIND: &'static str = $kind;

            fn into_object(self) -> WorldObject {
                WorldObject::$variant(self)
            }

            fn from_object(object: WorldObject) -> Option<Self> {
                match object {
                    WorldObject::$variant(value) => Some(value),
                    _ => None,
                }
            }

            fn from_object_mut(object: &mut WorldObject) -> Option<&mut Self> {
                match object {
                    WorldObject::$variant(value) => Some(value),
                    _ => None,
                }
            }
        }
    };
}

stored_object!(Tile, Tile, "tile");
stored_object!(Roster, Roster, "roster");
stored_object!(CharacterState, Character, "character");

/// The store behind a world.
#[derive(Debug, Clone)]
pub struct WorldStore {
    objects: Arc<ObjectStore<WorldObject>>,
}

impl WorldStore {
    /// Creates an empty store.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            objects: ObjectStore::new(config),
        }
    }

    /// Returns the underlying object store.
    #[must_use]
    pub fn objects(&self) -> &Arc<ObjectStore<WorldObject>> {
        &self.objects
    }

    /// Creates a character that is not on any level yet.
    ///
    /// # Errors
    ///
    /// Fails if the transaction is no longer active.
    pub fn create_character(
        &self,
        txn: &Transaction,
        name: &str,
        kind: CharacterKind,
    ) -> WorldResult<CharacterId> {
        let id = self.create(txn, CharacterState::new(name, kind), None)?;
        Ok(CharacterId::from_object(id))
    }

    /// Reads a character without locking it.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCharacter` if no such character exists.
    pub fn character(&self, txn: &Transaction, id: CharacterId) -> WorldResult<CharacterState> {
        self.peek(txn, id.object_id())
            .map_err(|error| unknown_character(error, id))
    }

    /// Locks a character and applies `f` to its working copy.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCharacter` if no such character exists, or a
    /// retryable conflict if another transaction holds it.
    pub fn update_character<R>(
        &self,
        txn: &Transaction,
        id: CharacterId,
        f: impl FnOnce(&mut CharacterState) -> R,
    ) -> WorldResult<R> {
        self.modify(txn, id.object_id(), f)
            .map_err(|error| unknown_character(error, id))
    }

    pub(crate) fn create<T: StoredObject>(
        &self,
        txn: &Transaction,
        value: T,
        name: Option<&str>,
    ) -> WorldResult<ObjectId> {
        Ok(self.objects.create(txn, value.into_object(), name)?)
    }

    pub(crate) fn peek<T: StoredObject>(&self, txn: &Transaction, id: ObjectId) -> WorldResult<T> {
        T::from_object(self.objects.peek(txn, id)?).ok_or(WorldError::WrongObjectKind {
            id,
            expected: T::KIND,
        })
    }

    pub(crate) fn modify<T: StoredObject, R>(
        &self,
        txn: &Transaction,
        id: ObjectId,
        f: impl FnOnce(&mut T) -> R,
    ) -> WorldResult<R> {
        self.objects
            .modify(txn, id, |object| T::from_object_mut(object).map(f))?
            .ok_or(WorldError::WrongObjectKind {
                id,
                expected: T::KIND,
            })
    }

    pub(crate) fn replace<T: StoredObject>(
        &self,
        txn: &Transaction,
        id: ObjectId,
        value: T,
    ) -> WorldResult<()> {
        Ok(self.objects.update(txn, id, value.into_object())?)
    }
}

fn unknown_character(error: WorldError, id: CharacterId) -> WorldError {
    match error {
        WorldError::Store(StoreError::NotFound(_)) => WorldError::UnknownCharacter(id),
        other => other,
    }
}
