//! Connectors: tiles that move characters to another place.
//!
//! A character stepping onto a connector tile never occupies it. The
//! connector adds the character at its destination instead, and the board
//! then takes the character off its origin tile.

use crate::error::{WorldError, WorldResult};
use crate::level::Level;
use crate::types::{CharacterId, CharacterKind};
use std::fmt;
use std::sync::{Arc, Weak};
use tessera_txn::Transaction;
use tracing::debug;

/// Relocates characters that step onto a connector tile.
pub trait Connector: Send + Sync + fmt::Debug {
    /// Adds `character`, which stepped onto the connector tile at `(x, y)`
    /// of `level`, at the destination.
    ///
    /// Returns true if the character was placed there, in which case the
    /// caller removes it from where it stood. Returns false if the
    /// destination refused it and nothing changed.
    fn enter(
        &self,
        txn: &Transaction,
        character: CharacterId,
        level: &str,
        x: usize,
        y: usize,
    ) -> WorldResult<bool>;
}

/// One end of a connector: a cell on a level.
#[derive(Clone)]
pub struct Endpoint {
    level: Weak<Level>,
    level_name: String,
    x: usize,
    y: usize,
}

impl Endpoint {
    /// Creates an endpoint at `(x, y)` on `level`.
    pub fn new(level: &Arc<Level>, x: usize, y: usize) -> Self {
        Self {
            level: Arc::downgrade(level),
            level_name: level.name().to_string(),
            x,
            y,
        }
    }

    /// Returns the name of the level.
    #[must_use]
    pub fn level_name(&self) -> &str {
        &self.level_name
    }

    /// Returns the cell.
    #[must_use]
    pub fn position(&self) -> (usize, usize) {
        (self.x, self.y)
    }

    fn level(&self) -> WorldResult<Arc<Level>> {
        self.level
            .upgrade()
            .ok_or_else(|| WorldError::UnknownLevel(self.level_name.clone()))
    }

    fn admit(&self, txn: &Transaction, character: CharacterId) -> WorldResult<bool> {
        let admitted = self.level()?.add_character_at(txn, character, self.x, self.y)?;
        debug!(level = %self.level_name, x = self.x, y = self.y, %character, admitted, "connector");
        Ok(admitted)
    }

    fn is_at(&self, level: &str, x: usize, y: usize) -> bool {
        self.level_name == level && (self.x, self.y) == (x, y)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", self.level_name, self.x, self.y)
    }
}

/// A two-way connection between two cells.
///
/// The character travels to the end opposite the tile it stepped onto.
#[derive(Debug, Clone)]
pub struct SimpleConnector {
    first: Endpoint,
    second: Endpoint,
}

impl SimpleConnector {
    /// Connects two cells.
    pub fn new(first: Endpoint, second: Endpoint) -> Self {
        Self { first, second }
    }

    /// Returns both ends.
    #[must_use]
    pub fn endpoints(&self) -> (&Endpoint, &Endpoint) {
        (&self.first, &self.second)
    }

    fn destination(&self, level: &str, x: usize, y: usize) -> &Endpoint {
        if self.first.is_at(level, x, y) {
            &self.second
        } else {
            &self.first
        }
    }
}

impl Connector for SimpleConnector {
    fn enter(
        &self,
        txn: &Transaction,
        character: CharacterId,
        level: &str,
        x: usize,
        y: usize,
    ) -> WorldResult<bool> {
        self.destination(level, x, y).admit(txn, character)
    }
}

/// A connection that only leads one way.
#[derive(Debug, Clone)]
pub struct OneWayConnector {
    target: Endpoint,
}

impl OneWayConnector {
    /// Creates a connector leading to `target`.
    pub fn new(target: Endpoint) -> Self {
        Self { target }
    }

    /// Returns the destination.
    #[must_use]
    pub fn target(&self) -> &Endpoint {
        &self.target
    }
}

impl Connector for OneWayConnector {
    fn enter(
        &self,
        txn: &Transaction,
        character: CharacterId,
        _level: &str,
        _x: usize,
        _y: usize,
    ) -> WorldResult<bool> {
        self.target.admit(txn, character)
    }
}

/// A two-way connection that only player characters may use.
#[derive(Debug, Clone)]
pub struct PlayerConnector {
    inner: SimpleConnector,
}

impl PlayerConnector {
    /// Connects two cells for players.
    pub fn new(first: Endpoint, second: Endpoint) -> Self {
        Self {
            inner: SimpleConnector::new(first, second),
        }
    }
}

impl Connector for PlayerConnector {
    fn enter(
        &self,
        txn: &Transaction,
        character: CharacterId,
        level: &str,
        x: usize,
        y: usize,
    ) -> WorldResult<bool> {
        let home = self.inner.first.level()?;
        if home.store().character(txn, character)?.kind != CharacterKind::Player {
            return Ok(false);
        }
        self.inner.enter(txn, character, level, x, y)
    }
}
