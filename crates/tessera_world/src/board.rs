//! Boards: rectangular grids of transactional tiles.

use crate::collision::{BlockingResolver, CollisionResolver};
use crate::connector::Connector;
use crate::error::{WorldError, WorldResult};
use crate::object::WorldStore;
use crate::tile::{Tile, TileKind};
use crate::types::{ActionResult, CharacterId, ItemId, SpriteId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tessera_store::ObjectId;
use tessera_txn::Transaction;
use tracing::trace;

/// A board cell as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSpace {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
    /// Tile sprite.
    pub sprite: SpriteId,
    /// Character standing on the cell.
    pub character: Option<CharacterId>,
    /// Item lying on the cell.
    pub item: Option<ItemId>,
}

/// A whole board as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    /// Whether clients only see what is near them.
    pub dark: bool,
    /// Every cell in row-major order.
    pub spaces: Vec<BoardSpace>,
}

/// Description of a board to build.
#[derive(Debug, Clone)]
pub struct BoardSpec {
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    /// Whether the board is dark.
    pub dark: bool,
    /// Sprite of every cell in row-major order.
    pub sprites: Vec<SpriteId>,
    /// Sprites that make a cell impassable.
    pub impassable: HashSet<SpriteId>,
}

impl BoardSpec {
    /// Describes a board covered in one passable sprite.
    #[must_use]
    pub fn open(width: usize, height: usize, floor: SpriteId) -> Self {
        Self {
            width,
            height,
            dark: false,
            sprites: vec![floor; width.saturating_mul(height)],
            impassable: HashSet::new(),
        }
    }

    /// Sets the sprite of one cell.
    ///
    /// # Panics
    ///
    /// Panics if the cell lies outside the board.
    #[must_use]
    pub fn with_sprite(mut self, x: usize, y: usize, sprite: SpriteId) -> Self {
        assert!(
            x < self.width && y < self.height,
            "cell ({x}, {y}) outside {}x{} board",
            self.width,
            self.height
        );
        self.sprites[y * self.width + x] = sprite;
        self
    }

    /// Marks a sprite as impassable.
    #[must_use]
    pub fn with_impassable(mut self, sprite: SpriteId) -> Self {
        self.impassable.insert(sprite);
        self
    }

    /// Sets whether the board is dark.
    #[must_use]
    pub fn dark(mut self, dark: bool) -> Self {
        self.dark = dark;
        self
    }

    /// Checks that the description is consistent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBoard` for an empty board or a sprite count that does
    /// not match the dimensions.
    pub fn validate(&self) -> WorldResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(WorldError::invalid_board(format!(
                "{}x{} board has no cells",
                self.width, self.height
            )));
        }
        let cells = self.width.checked_mul(self.height).ok_or_else(|| {
            WorldError::invalid_board(format!("{}x{} board is too large", self.width, self.height))
        })?;
        if self.sprites.len() != cells {
            return Err(WorldError::invalid_board(format!(
                "{} sprites for {} cells",
                self.sprites.len(),
                cells
            )));
        }
        Ok(())
    }

    fn tile(&self, index: usize) -> Tile {
        let sprite = self.sprites[index];
        if self.impassable.contains(&sprite) {
            Tile::impassable(sprite)
        } else {
            Tile::passable(sprite)
        }
    }
}

/// A grid of tiles.
///
/// Each tile is its own stored object, so concurrent transactions touching
/// different tiles do not contend while two transactions adding a character
/// to the same tile are serialized. The grid itself never changes shape.
///
/// Coordinates outside the board are programming errors and panic.
pub struct Board {
    name: String,
    width: usize,
    height: usize,
    dark: bool,
    tiles: Vec<ObjectId>,
    store: WorldStore,
    resolver: Arc<dyn CollisionResolver>,
}

impl Board {
    /// Builds a board inside `txn`, with occupied tiles blocking movement.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBoard` if the description is inconsistent, or a
    /// transaction error if the tiles cannot be created.
    pub fn create(
        txn: &Transaction,
        name: impl Into<String>,
        store: &WorldStore,
        spec: &BoardSpec,
    ) -> WorldResult<Self> {
        Self::with_resolver(txn, name, store, spec, Arc::new(BlockingResolver))
    }

    /// Builds a board with a collision resolver.
    ///
    /// # Errors
    ///
    /// See [`create`](Self::create).
    pub fn with_resolver(
        txn: &Transaction,
        name: impl Into<String>,
        store: &WorldStore,
        spec: &BoardSpec,
        resolver: Arc<dyn CollisionResolver>,
    ) -> WorldResult<Self> {
        spec.validate()?;
        let tiles = (0..spec.sprites.len())
            .map(|index| store.create(txn, spec.tile(index), None))
            .collect::<WorldResult<Vec<_>>>()?;
        Ok(Self {
            name: name.into(),
            width: spec.width,
            height: spec.height,
            dark: spec.dark,
            tiles,
            store: store.clone(),
            resolver,
        })
    }

    /// Returns the name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns true if the board is dark.
    #[must_use]
    pub fn is_dark(&self) -> bool {
        self.dark
    }

    /// Returns true if `(x, y)` lies on the board.
    #[must_use]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    fn tile_id(&self, x: usize, y: usize) -> ObjectId {
        assert!(
            self.contains(x, y),
            "cell ({x}, {y}) outside {}x{} board {}",
            self.width,
            self.height,
            self.name
        );
        self.tiles[y * self.width + x]
    }

    /// Reads a tile without locking it.
    pub fn tile(&self, txn: &Transaction, x: usize, y: usize) -> WorldResult<Tile> {
        self.store.peek(txn, self.tile_id(x, y))
    }

    fn modify_tile<R>(
        &self,
        txn: &Transaction,
        x: usize,
        y: usize,
        f: impl FnOnce(&mut Tile) -> R,
    ) -> WorldResult<R> {
        self.store.modify(txn, self.tile_id(x, y), f)
    }

    /// Returns true if a character could be added at `(x, y)` right now.
    ///
    /// Reads without locking, so the answer may be stale by the time the
    /// character is added.
    pub fn test_move(&self, txn: &Transaction, x: usize, y: usize) -> WorldResult<bool> {
        Ok(self.tile(txn, x, y)?.can_occupy())
    }

    /// Adds a character to a tile. Returns false if the tile refuses.
    pub fn add_character_at(
        &self,
        txn: &Transaction,
        x: usize,
        y: usize,
        character: CharacterId,
    ) -> WorldResult<bool> {
        self.modify_tile(txn, x, y, |tile| tile.add_character(character))
    }

    /// Removes a character from a tile. Returns false if it was not there.
    pub fn remove_character_at(
        &self,
        txn: &Transaction,
        x: usize,
        y: usize,
        character: CharacterId,
    ) -> WorldResult<bool> {
        self.modify_tile(txn, x, y, |tile| tile.remove_character(character))
    }

    /// Places an item on a tile. Returns false if the tile refuses.
    pub fn add_item_at(&self, txn: &Transaction, x: usize, y: usize, item: ItemId) -> WorldResult<bool> {
        if self.tile(txn, x, y)?.item().is_some() {
            return Ok(false);
        }
        self.modify_tile(txn, x, y, |tile| tile.add_item(item))
    }

    /// Removes an item from a tile. Returns false if it was not there.
    pub fn remove_item_at(&self, txn: &Transaction, x: usize, y: usize, item: ItemId) -> WorldResult<bool> {
        self.modify_tile(txn, x, y, |tile| tile.remove_item(item))
    }

    /// Moves a character from where it stands to `(x, y)`.
    ///
    /// The character's recorded position is taken as the origin. On
    /// [`ActionResult::Success`] the character has left the origin tile and
    /// occupies the target. On [`ActionResult::CharacterLeft`] a connector
    /// has placed it elsewhere and it has left the origin tile. On
    /// [`ActionResult::Fail`] nothing changed on this board.
    ///
    /// # Errors
    ///
    /// Returns `NotOnBoard` if the character has no recorded position, or a
    /// transaction error, in which case the caller's transaction should be
    /// aborted.
    pub fn move_to(
        &self,
        txn: &Transaction,
        x: usize,
        y: usize,
        character: CharacterId,
    ) -> WorldResult<ActionResult> {
        let target = self.tile(txn, x, y)?;
        if !target.is_passable() {
            return Ok(ActionResult::Fail);
        }
        let (ox, oy) = self
            .store
            .character(txn, character)?
            .position
            .ok_or_else(|| WorldError::NotOnBoard {
                character,
                level: self.name.clone(),
            })?;

        let result = self.enter(txn, &target, x, y, character)?;
        trace!(board = %self.name, %character, from = ?(ox, oy), to = ?(x, y), ?result, "move");
        match result {
            ActionResult::Fail => Ok(ActionResult::Fail),
            ActionResult::CharacterLeft => {
                self.remove_character_at(txn, ox, oy, character)?;
                Ok(ActionResult::CharacterLeft)
            }
            ActionResult::Success => {
                let left = self.remove_character_at(txn, ox, oy, character)?;
                if self.add_character_at(txn, x, y, character)? {
                    return Ok(ActionResult::Success);
                }
                if left {
                    self.add_character_at(txn, ox, oy, character)?;
                }
                Ok(ActionResult::Fail)
            }
        }
    }

    fn enter(
        &self,
        txn: &Transaction,
        target: &Tile,
        x: usize,
        y: usize,
        character: CharacterId,
    ) -> WorldResult<ActionResult> {
        match target.kind() {
            TileKind::Impassable => Ok(ActionResult::Fail),
            TileKind::Connector(connector) => {
                let left = connector.enter(txn, character, &self.name, x, y)?;
                Ok(if left {
                    ActionResult::CharacterLeft
                } else {
                    ActionResult::Fail
                })
            }
            TileKind::Passable => match target.occupant() {
                Some(defender) if defender != character => {
                    self.resolver.resolve(txn, character, defender)
                }
                _ => Ok(ActionResult::Success),
            },
        }
    }

    /// Lets a character pick up the item at `(x, y)`.
    ///
    /// On a connector tile the connector is entered instead and the
    /// character leaves the tile if it succeeds.
    pub fn get_item(
        &self,
        txn: &Transaction,
        x: usize,
        y: usize,
        character: CharacterId,
    ) -> WorldResult<ActionResult> {
        let tile = self.tile(txn, x, y)?;
        if let Some(connector) = tile.connector() {
            if !connector.enter(txn, character, &self.name, x, y)? {
                return Ok(ActionResult::Fail);
            }
            self.remove_character_at(txn, x, y, character)?;
            return Ok(ActionResult::CharacterLeft);
        }
        if tile.item().is_none() {
            return Ok(ActionResult::Fail);
        }
        match self.modify_tile(txn, x, y, Tile::take_item)? {
            Some(item) => {
                self.store
                    .update_character(txn, character, |state| state.items.push(item))?;
                Ok(ActionResult::Success)
            }
            None => Ok(ActionResult::Fail),
        }
    }

    /// Turns the tile at `(x, y)` into a connector.
    pub fn set_as_connector(
        &self,
        txn: &Transaction,
        x: usize,
        y: usize,
        connector: Arc<dyn Connector>,
    ) -> WorldResult<()> {
        self.modify_tile(txn, x, y, |tile| tile.set_connector(connector))
    }

    /// Replaces the tile at `(x, y)`. Whatever stood on the old tile is gone.
    pub fn replace_tile(&self, txn: &Transaction, x: usize, y: usize, tile: Tile) -> WorldResult<()> {
        self.store.replace(txn, self.tile_id(x, y), tile)
    }

    /// Describes one cell.
    pub fn space_at(&self, txn: &Transaction, x: usize, y: usize) -> WorldResult<BoardSpace> {
        Ok(self.tile(txn, x, y)?.space(x, y))
    }

    /// Describes every cell.
    pub fn snapshot(&self, txn: &Transaction) -> WorldResult<BoardSnapshot> {
        let mut spaces = Vec::with_capacity(self.tiles.len());
        for y in 0..self.height {
            for x in 0..self.width {
                spaces.push(self.space_at(txn, x, y)?);
            }
        }
        Ok(BoardSnapshot {
            width: self.width,
            height: self.height,
            dark: self.dark,
            spaces,
        })
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("dark", &self.dark)
            .finish_non_exhaustive()
    }
}
