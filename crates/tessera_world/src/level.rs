//! Levels: a board plus the characters on it.

use crate::board::{Board, BoardSnapshot, BoardSpace};
use crate::channel::{Channel, LevelMessage};
use crate::character::CharacterState;
use crate::config::WorldConfig;
use crate::error::{WorldError, WorldResult};
use crate::object::{Roster, WorldStore};
use crate::types::{ActionResult, CharacterId, Direction, ItemId};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use tessera_store::ObjectId;
use tessera_txn::Transaction;
use tracing::{debug, warn};

/// A board, the characters on it and the channel they listen on.
///
/// Every operation runs inside the caller's transaction. Changes to the
/// board, the roster and the characters become visible, and the resulting
/// messages are delivered, only when that transaction commits.
pub struct Level {
    name: String,
    board: Board,
    roster: ObjectId,
    store: WorldStore,
    channel: Arc<dyn Channel>,
    config: WorldConfig,
}

impl Level {
    /// Creates a level around `board`, named after it.
    ///
    /// # Errors
    ///
    /// Fails if the roster cannot be created, for instance because another
    /// level with the same name exists.
    pub fn create(
        txn: &Transaction,
        board: Board,
        store: &WorldStore,
        channel: Arc<dyn Channel>,
        config: WorldConfig,
    ) -> WorldResult<Arc<Self>> {
        let name = board.name().to_string();
        let roster = store.create(txn, Roster::new(), Some(&roster_binding(&name)))?;
        debug!(level = %name, width = board.width(), height = board.height(), "level created");
        Ok(Arc::new(Self {
            name,
            board,
            roster,
            store: store.clone(),
            channel,
            config,
        }))
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the board.
    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Returns the store holding the level's objects.
    #[must_use]
    pub fn store(&self) -> &WorldStore {
        &self.store
    }

    /// Returns the characters on the level.
    pub fn roster(&self, txn: &Transaction) -> WorldResult<Vec<CharacterId>> {
        Ok(self.peek_roster(txn)?.into_iter().collect())
    }

    /// Returns true if `character` is on the level.
    pub fn contains(&self, txn: &Transaction, character: CharacterId) -> WorldResult<bool> {
        Ok(self.peek_roster(txn)?.contains(&character))
    }

    fn peek_roster(&self, txn: &Transaction) -> WorldResult<Roster> {
        self.store.peek(txn, self.roster)
    }

    /// Places a character on a random free cell and returns the cell.
    ///
    /// # Errors
    ///
    /// Returns `BoardFull` if no cell accepted the character within the
    /// configured number of attempts.
    pub fn add_character<R>(
        &self,
        txn: &Transaction,
        character: CharacterId,
        rng: &mut R,
    ) -> WorldResult<(usize, usize)>
    where
        R: Rng + ?Sized,
    {
        for _ in 0..self.config.max_placement_attempts {
            let (x, y) = self.random_cell(rng);
            if self.board.test_move(txn, x, y)? && self.add_character_at(txn, character, x, y)? {
                return Ok((x, y));
            }
        }
        Err(self.board_full())
    }

    /// Places a character at `(x, y)`.
    ///
    /// The character's level and position are recorded before the board is
    /// asked to take it, so that a connector under `(x, y)` sees where the
    /// character is going. If the board refuses, the previous level and
    /// position are restored and false is returned.
    ///
    /// On success the joining character is sent the whole board and the
    /// other characters are sent the changed cell.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is outside the board.
    pub fn add_character_at(
        &self,
        txn: &Transaction,
        character: CharacterId,
        x: usize,
        y: usize,
    ) -> WorldResult<bool> {
        let (previous_level, previous_position) =
            self.store.update_character(txn, character, |state| {
                let previous = (state.level.take(), state.position.take());
                state.place(&self.name, x, y);
                previous
            })?;

        if !self.board.add_character_at(txn, x, y, character)? {
            warn!(level = %self.name, %character, x, y, "could not add character");
            self.store.update_character(txn, character, |state| {
                state.level = previous_level;
                state.position = previous_position;
            })?;
            return Ok(false);
        }

        self.store
            .modify(txn, self.roster, |roster: &mut Roster| roster.insert(character))?;
        self.channel.send(
            txn,
            &[character],
            LevelMessage::Board {
                level: self.name.clone(),
                board: self.board.snapshot(txn)?,
            },
        )?;
        let except = (!self.config.broadcast_to_joiner).then_some(character);
        self.broadcast(txn, vec![self.board.space_at(txn, x, y)?], except)?;
        debug!(level = %self.name, %character, x, y, "character joined");
        Ok(true)
    }

    /// Takes a character off the level, for instance when it logs out or dies.
    ///
    /// Messages still waiting for the character are discarded when the
    /// transaction commits. Returns false if the character was not on the
    /// level.
    pub fn remove_character(&self, txn: &Transaction, character: CharacterId) -> WorldResult<bool> {
        if !self.contains(txn, character)? {
            return Ok(false);
        }
        self.store
            .modify(txn, self.roster, |roster: &mut Roster| roster.remove(&character))?;

        let state = self.store.character(txn, character)?;
        if let (true, Some((x, y))) = (state.is_on(&self.name), state.position) {
            self.board.remove_character_at(txn, x, y, character)?;
            self.store
                .update_character(txn, character, CharacterState::clear_placement)?;
            self.broadcast(txn, vec![self.board.space_at(txn, x, y)?], None)?;
        }
        self.channel.close(txn, character)?;
        debug!(level = %self.name, %character, "character removed");
        Ok(true)
    }

    /// Moves a character one cell.
    ///
    /// Returns true if the character now stands on the neighbouring cell of
    /// this level. Moving off the board, into a wall or into another
    /// character returns false. Stepping onto a connector also returns
    /// false: the character has been placed elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `NotOnBoard` if the character is not on this level.
    pub fn move_character(
        &self,
        txn: &Transaction,
        character: CharacterId,
        direction: Direction,
    ) -> WorldResult<bool> {
        let (x, y) = self.position_of(txn, character)?;
        let Some((to_x, to_y)) = direction.step(x, y, self.board.width(), self.board.height())
        else {
            return Ok(false);
        };

        match self.board.move_to(txn, to_x, to_y, character)? {
            ActionResult::Fail => Ok(false),
            ActionResult::CharacterLeft => {
                self.leave_level(txn, character, x, y)?;
                Ok(false)
            }
            ActionResult::Success => {
                self.store
                    .update_character(txn, character, |state| state.position = Some((to_x, to_y)))?;
                let spaces = vec![
                    self.board.space_at(txn, x, y)?,
                    self.board.space_at(txn, to_x, to_y)?,
                ];
                self.broadcast(txn, spaces, None)?;
                Ok(true)
            }
        }
    }

    /// Picks up the item under a character.
    ///
    /// Returns true if an item was picked up.
    ///
    /// # Errors
    ///
    /// Returns `NotOnBoard` if the character is not on this level.
    pub fn take(&self, txn: &Transaction, character: CharacterId) -> WorldResult<bool> {
        let (x, y) = self.position_of(txn, character)?;
        match self.board.get_item(txn, x, y, character)? {
            ActionResult::Fail => Ok(false),
            ActionResult::CharacterLeft => {
                self.leave_level(txn, character, x, y)?;
                Ok(false)
            }
            ActionResult::Success => {
                self.broadcast(txn, vec![self.board.space_at(txn, x, y)?], None)?;
                Ok(true)
            }
        }
    }

    /// Drops an item on a random cell and returns the cell.
    ///
    /// # Errors
    ///
    /// Returns `BoardFull` if no cell accepted the item within the
    /// configured number of attempts.
    pub fn add_item<R>(&self, txn: &Transaction, item: ItemId, rng: &mut R) -> WorldResult<(usize, usize)>
    where
        R: Rng + ?Sized,
    {
        for _ in 0..self.config.max_placement_attempts {
            let (x, y) = self.random_cell(rng);
            if self.add_item_at(txn, item, x, y)? {
                return Ok((x, y));
            }
        }
        Err(self.board_full())
    }

    /// Drops an item at `(x, y)`. Returns false if the cell refuses it.
    pub fn add_item_at(&self, txn: &Transaction, item: ItemId, x: usize, y: usize) -> WorldResult<bool> {
        if !self.board.tile(txn, x, y)?.is_passable() || !self.board.add_item_at(txn, x, y, item)? {
            return Ok(false);
        }
        self.broadcast(txn, vec![self.board.space_at(txn, x, y)?], None)?;
        Ok(true)
    }

    /// Returns the whole board.
    pub fn board_snapshot(&self, txn: &Transaction) -> WorldResult<BoardSnapshot> {
        self.board.snapshot(txn)
    }

    /// Bookkeeping after `character` was taken off `(x, y)` by a connector
    /// or a collision.
    ///
    /// The character stays in the roster only if it stands on the tile at
    /// its recorded position on this level. Otherwise it is dropped from the
    /// roster, and a placement still naming this level is cleared.
    fn leave_level(&self, txn: &Transaction, character: CharacterId, x: usize, y: usize) -> WorldResult<()> {
        let state = self.store.character(txn, character)?;
        let on_level = state.is_on(&self.name);
        let standing = match state.position {
            Some((px, py)) if on_level => {
                self.board.tile(txn, px, py)?.occupants().contains(&character)
            }
            _ => false,
        };
        if !standing {
            self.store
                .modify(txn, self.roster, |roster: &mut Roster| roster.remove(&character))?;
            if on_level {
                self.store
                    .update_character(txn, character, CharacterState::clear_placement)?;
            }
            debug!(level = %self.name, %character, "character left");
        }
        self.broadcast(txn, vec![self.board.space_at(txn, x, y)?], None)
    }

    fn position_of(&self, txn: &Transaction, character: CharacterId) -> WorldResult<(usize, usize)> {
        let state = self.store.character(txn, character)?;
        match state.position {
            Some(position) if state.is_on(&self.name) => Ok(position),
            _ => Err(WorldError::NotOnBoard {
                character,
                level: self.name.clone(),
            }),
        }
    }

    fn broadcast(
        &self,
        txn: &Transaction,
        spaces: Vec<BoardSpace>,
        except: Option<CharacterId>,
    ) -> WorldResult<()> {
        let recipients: Vec<_> = self
            .peek_roster(txn)?
            .into_iter()
            .filter(|character| Some(*character) != except)
            .collect();
        self.channel.send(
            txn,
            &recipients,
            LevelMessage::Update {
                level: self.name.clone(),
                spaces,
            },
        )
    }

    fn random_cell<R: Rng + ?Sized>(&self, rng: &mut R) -> (usize, usize) {
        (
            rng.gen_range(0..self.board.width()),
            rng.gen_range(0..self.board.height()),
        )
    }

    fn board_full(&self) -> WorldError {
        WorldError::BoardFull {
            level: self.name.clone(),
            attempts: self.config.max_placement_attempts,
        }
    }
}

fn roster_binding(level: &str) -> String {
    format!("level.{level}.roster")
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Level")
            .field("name", &self.name)
            .field("board", &self.board)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
