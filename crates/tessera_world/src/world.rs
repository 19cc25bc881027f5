//! The registry of levels and the connections between them.

use crate::board::{Board, BoardSpec};
use crate::channel::TransactionalChannel;
use crate::collision::{BlockingResolver, CollisionResolver};
use crate::config::WorldConfig;
use crate::connector::{Connector, Endpoint, OneWayConnector, PlayerConnector, SimpleConnector};
use crate::error::{WorldError, WorldResult};
use crate::level::Level;
use crate::object::WorldStore;
use crate::types::{CharacterId, CharacterKind};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tessera_store::StoreConfig;
use tessera_txn::Transaction;
use tracing::info;

/// A cell on a named level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    /// Level name.
    pub level: String,
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
}

impl Location {
    /// Creates a location.
    pub fn new(level: impl Into<String>, x: usize, y: usize) -> Self {
        Self {
            level: level.into(),
            x,
            y,
        }
    }
}

/// Levels sharing one store and one channel.
///
/// Registering a level is immediate: the registry is not transactional, so
/// levels should be created in a transaction that is expected to commit.
pub struct World {
    config: WorldConfig,
    store: WorldStore,
    channel: Arc<TransactionalChannel>,
    resolver: Arc<dyn CollisionResolver>,
    levels: RwLock<HashMap<String, Arc<Level>>>,
}

impl World {
    /// Creates an empty world.
    pub fn new(config: WorldConfig, store_config: StoreConfig) -> Self {
        Self {
            config,
            store: WorldStore::new(store_config),
            channel: TransactionalChannel::new(),
            resolver: Arc::new(BlockingResolver),
            levels: RwLock::new(HashMap::new()),
        }
    }

    /// Sets the collision resolver used by levels added afterwards.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn CollisionResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &WorldStore {
        &self.store
    }

    /// Returns the channel levels send their messages on.
    #[must_use]
    pub fn channel(&self) -> &Arc<TransactionalChannel> {
        &self.channel
    }

    /// Builds and registers a level.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateLevel` if the name is taken and `InvalidBoard` if
    /// the description is inconsistent.
    pub fn add_level(&self, txn: &Transaction, name: &str, spec: &BoardSpec) -> WorldResult<Arc<Level>> {
        if self.levels.read().contains_key(name) {
            return Err(WorldError::DuplicateLevel(name.to_string()));
        }
        let board = Board::with_resolver(txn, name, &self.store, spec, Arc::clone(&self.resolver))?;
        let level = Level::create(
            txn,
            board,
            &self.store,
            self.channel.clone(),
            self.config.clone(),
        )?;

        let mut levels = self.levels.write();
        if levels.contains_key(name) {
            return Err(WorldError::DuplicateLevel(name.to_string()));
        }
        levels.insert(name.to_string(), Arc::clone(&level));
        info!(level = name, "level added");
        Ok(level)
    }

    /// Returns a level by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownLevel` if no level has this name.
    pub fn level(&self, name: &str) -> WorldResult<Arc<Level>> {
        self.levels
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| WorldError::UnknownLevel(name.to_string()))
    }

    /// Returns the names of all levels, sorted.
    #[must_use]
    pub fn level_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.levels.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Creates a character that is not on any level yet.
    pub fn create_character(
        &self,
        txn: &Transaction,
        name: &str,
        kind: CharacterKind,
    ) -> WorldResult<CharacterId> {
        self.store.create_character(txn, name, kind)
    }

    /// Connects two cells both ways. Both cells become connector tiles.
    pub fn connect_two_way(&self, txn: &Transaction, a: &Location, b: &Location) -> WorldResult<()> {
        let (first, second) = (self.endpoint(a)?, self.endpoint(b)?);
        let connector: Arc<dyn Connector> = Arc::new(SimpleConnector::new(first, second));
        self.install(txn, a, Arc::clone(&connector))?;
        self.install(txn, b, connector)
    }

    /// Connects `from` to `to`. Only `from` becomes a connector tile.
    pub fn connect_one_way(&self, txn: &Transaction, from: &Location, to: &Location) -> WorldResult<()> {
        self.endpoint(from)?;
        let connector = Arc::new(OneWayConnector::new(self.endpoint(to)?));
        self.install(txn, from, connector)
    }

    /// Connects two cells both ways for player characters only.
    pub fn connect_player_only(&self, txn: &Transaction, a: &Location, b: &Location) -> WorldResult<()> {
        let (first, second) = (self.endpoint(a)?, self.endpoint(b)?);
        let connector: Arc<dyn Connector> = Arc::new(PlayerConnector::new(first, second));
        self.install(txn, a, Arc::clone(&connector))?;
        self.install(txn, b, connector)
    }

    fn endpoint(&self, location: &Location) -> WorldResult<Endpoint> {
        let level = self.level(&location.level)?;
        Ok(Endpoint::new(&level, location.x, location.y))
    }

    fn install(&self, txn: &Transaction, at: &Location, connector: Arc<dyn Connector>) -> WorldResult<()> {
        self.level(&at.level)?
            .board()
            .set_as_connector(txn, at.x, at.y, connector)
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("config", &self.config)
            .field("levels", &self.level_names())
            .finish_non_exhaustive()
    }
}
