//! Identifiers and small value types shared across the world.

use serde::{Deserialize, Serialize};
use std::fmt;
use tessera_store::ObjectId;

/// Identifier of a character.
///
/// A character is stored as an object; its id is the object's id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(ObjectId);

impl CharacterId {
    /// Wraps the id of a stored character object.
    #[must_use]
    pub const fn from_object(id: ObjectId) -> Self {
        Self(id)
    }

    /// Returns the id of the stored character object.
    #[must_use]
    pub const fn object_id(&self) -> ObjectId {
        self.0
    }
}

impl fmt::Debug for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CharacterId({})", self.0)
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "char:{}", self.0)
    }
}

/// Identifier of an item lying on a tile or carried by a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item:{}", self.0)
    }
}

/// Sprite shown for a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpriteId(pub u32);

/// Whether a character is driven by a player or by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterKind {
    /// Controlled by a connected player.
    Player,
    /// Controlled by the server.
    Ai,
}

/// A one-step movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards row 0.
    Up,
    /// Away from row 0.
    Down,
    /// Towards column 0.
    Left,
    /// Away from column 0.
    Right,
}

impl Direction {
    /// All directions.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Returns the cell one step from `(x, y)`, or `None` if it would leave a
    /// `width` by `height` board.
    #[must_use]
    pub fn step(self, x: usize, y: usize, width: usize, height: usize) -> Option<(usize, usize)> {
        let (x, y) = match self {
            Direction::Up => (Some(x), y.checked_sub(1)),
            Direction::Down => (Some(x), y.checked_add(1)),
            Direction::Left => (x.checked_sub(1), Some(y)),
            Direction::Right => (x.checked_add(1), Some(y)),
        };
        match (x, y) {
            (Some(x), Some(y)) if x < width && y < height => Some((x, y)),
            _ => None,
        }
    }
}

/// Outcome of a movement or pick-up attempt on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionResult {
    /// The action happened.
    Success,
    /// Nothing changed.
    Fail,
    /// The character was relocated elsewhere by a connector.
    CharacterLeft,
}
