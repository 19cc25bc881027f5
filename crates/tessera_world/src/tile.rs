//! Tiles: the cells of a board.

use crate::board::BoardSpace;
use crate::connector::Connector;
use crate::types::{CharacterId, ItemId, SpriteId};
use std::sync::Arc;

/// How a tile treats characters stepping onto it.
#[derive(Debug, Clone)]
pub enum TileKind {
    /// Nothing can enter.
    Impassable,
    /// Holds at most one character.
    Passable,
    /// Relocates characters that step onto it.
    Connector(Arc<dyn Connector>),
}

/// One cell of a board.
///
/// A tile is stored as its own object, so two transactions changing the
/// same tile are serialized while changes to different tiles proceed in
/// parallel. All checks here are made against the copy the caller holds;
/// callers that mutate must hold the tile's lock.
#[derive(Debug, Clone)]
pub struct Tile {
    sprite: SpriteId,
    kind: TileKind,
    occupants: Vec<CharacterId>,
    item: Option<ItemId>,
}

impl Tile {
    /// Creates an empty tile.
    pub fn new(sprite: SpriteId, kind: TileKind) -> Self {
        Self {
            sprite,
            kind,
            occupants: Vec::new(),
            item: None,
        }
    }

    /// Creates an empty passable tile.
    pub fn passable(sprite: SpriteId) -> Self {
        Self::new(sprite, TileKind::Passable)
    }

    /// Creates an impassable tile.
    pub fn impassable(sprite: SpriteId) -> Self {
        Self::new(sprite, TileKind::Impassable)
    }

    /// Returns the sprite.
    #[must_use]
    pub fn sprite(&self) -> SpriteId {
        self.sprite
    }

    /// Returns the kind.
    #[must_use]
    pub fn kind(&self) -> &TileKind {
        &self.kind
    }

    /// Returns the connector, if this is a connector tile.
    #[must_use]
    pub fn connector(&self) -> Option<&Arc<dyn Connector>> {
        match &self.kind {
            TileKind::Connector(connector) => Some(connector),
            _ => None,
        }
    }

    /// Turns this tile into a connector, keeping its sprite, occupants and item.
    pub fn set_connector(&mut self, connector: Arc<dyn Connector>) {
        self.kind = TileKind::Connector(connector);
    }

    /// Returns true unless the tile is a wall.
    #[must_use]
    pub fn is_passable(&self) -> bool {
        !matches!(self.kind, TileKind::Impassable)
    }

    /// Returns true if a character could be added right now.
    #[must_use]
    pub fn can_occupy(&self) -> bool {
        match self.kind {
            TileKind::Impassable => false,
            TileKind::Passable => self.occupants.is_empty(),
            TileKind::Connector(_) => true,
        }
    }

    /// Returns the first character on the tile.
    #[must_use]
    pub fn occupant(&self) -> Option<CharacterId> {
        self.occupants.first().copied()
    }

    /// Returns every character on the tile.
    #[must_use]
    pub fn occupants(&self) -> &[CharacterId] {
        &self.occupants
    }

    /// Returns true if `character` is on the tile.
    #[must_use]
    pub fn contains(&self, character: CharacterId) -> bool {
        self.occupants.contains(&character)
    }

    /// Adds a character. Returns false if the tile cannot take it.
    pub fn add_character(&mut self, character: CharacterId) -> bool {
        if !self.can_occupy() || self.contains(character) {
            return false;
        }
        self.occupants.push(character);
        true
    }

    /// Removes a character. Returns false if it was not on the tile.
    pub fn remove_character(&mut self, character: CharacterId) -> bool {
        match self.occupants.iter().position(|c| *c == character) {
            Some(index) => {
                self.occupants.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns the item lying on the tile.
    #[must_use]
    pub fn item(&self) -> Option<ItemId> {
        self.item
    }

    /// Places an item. Walls and tiles that already hold an item refuse.
    pub fn add_item(&mut self, item: ItemId) -> bool {
        if !self.is_passable() || self.item.is_some() {
            return false;
        }
        self.item = Some(item);
        true
    }

    /// Removes `item`. Returns false if a different item, or none, lies here.
    pub fn remove_item(&mut self, item: ItemId) -> bool {
        if self.item == Some(item) {
            self.item = None;
            true
        } else {
            false
        }
    }

    /// Takes whatever item lies on the tile.
    pub fn take_item(&mut self) -> Option<ItemId> {
        self.item.take()
    }

    /// Describes the tile as seen by clients.
    #[must_use]
    pub fn space(&self, x: usize, y: usize) -> BoardSpace {
        BoardSpace {
            x,
            y,
            sprite: self.sprite,
            character: self.occupant(),
            item: self.item,
        }
    }
}
