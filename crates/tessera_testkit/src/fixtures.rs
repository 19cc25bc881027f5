//! World fixtures and helpers.
//!
//! Provides a coordinator, a scheduler and a world wired together, plus
//! shortcuts for running setup steps in committed transactions.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tessera_store::StoreConfig;
use tessera_txn::{
    CoordinatorConfig, SchedulerConfig, TimeoutPolicy, Transaction, TransactionCoordinator,
    TransactionScheduler,
};
use tessera_world::{
    BlockingResolver, BoardSpec, CharacterId, CharacterKind, CharacterState, CollisionResolver,
    Level, LevelMessage, SpriteId, Tile, World, WorldConfig, WorldResult,
};

/// Sprite of passable floor in fixtures.
pub const FLOOR: SpriteId = SpriteId(1);

/// Sprite of impassable wall in fixtures.
pub const WALL: SpriteId = SpriteId(2);

/// Returns a reproducible random number generator.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Describes an open board of floor tiles where [`WALL`] is impassable.
pub fn open_board(width: usize, height: usize) -> BoardSpec {
    BoardSpec::open(width, height, FLOOR).with_impassable(WALL)
}

/// A world ready for tests.
pub struct WorldFixture {
    /// The coordinator creating every transaction.
    pub coordinator: Arc<TransactionCoordinator>,
    /// Scheduler over the coordinator, retrying conflicts.
    pub scheduler: TransactionScheduler,
    /// The world.
    pub world: Arc<World>,
}

impl WorldFixture {
    /// Creates a fixture with generous timeouts and a short lock wait.
    pub fn new() -> Self {
        Self::with_config(
            CoordinatorConfig::new().bounded_timeout(Duration::from_secs(5)),
            StoreConfig::new().lock_wait(Duration::from_millis(50)),
            WorldConfig::default(),
        )
    }

    /// Creates a fixture whose levels settle collisions with `resolver`.
    pub fn with_resolver(resolver: Arc<dyn CollisionResolver>) -> Self {
        Self::build(
            CoordinatorConfig::new().bounded_timeout(Duration::from_secs(5)),
            StoreConfig::new().lock_wait(Duration::from_millis(50)),
            WorldConfig::default(),
            resolver,
        )
    }

    /// Creates a fixture from explicit configuration.
    pub fn with_config(
        coordinator: CoordinatorConfig,
        store: StoreConfig,
        world: WorldConfig,
    ) -> Self {
        Self::build(coordinator, store, world, Arc::new(BlockingResolver))
    }

    fn build(
        coordinator: CoordinatorConfig,
        store: StoreConfig,
        world: WorldConfig,
        resolver: Arc<dyn CollisionResolver>,
    ) -> Self {
        let coordinator = Arc::new(
            TransactionCoordinator::new(coordinator).expect("Invalid coordinator configuration"),
        );
        let scheduler = TransactionScheduler::new(
            Arc::clone(&coordinator),
            SchedulerConfig::new().with_max_attempts(1_000),
        );
        Self {
            coordinator,
            scheduler,
            world: Arc::new(World::new(world, store).with_resolver(resolver)),
        }
    }

    /// Runs `f` in a transaction and commits it.
    ///
    /// # Panics
    ///
    /// Panics if `f` or the commit fails.
    pub fn in_txn<T>(&self, f: impl FnOnce(&Transaction) -> WorldResult<T>) -> T {
        let handle = self.coordinator.create_transaction(TimeoutPolicy::Bounded);
        let value = f(handle.transaction()).expect("Transaction body failed");
        handle.commit().expect("Commit failed");
        value
    }

    /// Runs `f` in a transaction that is never committed.
    pub fn read<T>(&self, f: impl FnOnce(&Transaction) -> WorldResult<T>) -> T {
        let handle = self.coordinator.create_transaction(TimeoutPolicy::Bounded);
        f(handle.transaction()).expect("Read failed")
    }

    /// Adds a level.
    pub fn level(&self, name: &str, spec: &BoardSpec) -> Arc<Level> {
        self.in_txn(|txn| self.world.add_level(txn, name, spec))
    }

    /// Creates a character that is not on any level.
    pub fn character(&self, name: &str, kind: CharacterKind) -> CharacterId {
        self.in_txn(|txn| self.world.create_character(txn, name, kind))
    }

    /// Creates a player standing at `(x, y)` on `level`.
    ///
    /// # Panics
    ///
    /// Panics if the cell refuses the character.
    pub fn player_at(&self, level: &Level, name: &str, x: usize, y: usize) -> CharacterId {
        let id = self.character(name, CharacterKind::Player);
        let added = self.in_txn(|txn| level.add_character_at(txn, id, x, y));
        assert!(added, "cell ({x}, {y}) refused {name}");
        id
    }

    /// Replaces the tile at `(x, y)` with a wall.
    pub fn wall_at(&self, level: &Level, x: usize, y: usize) {
        self.in_txn(|txn| level.board().replace_tile(txn, x, y, Tile::impassable(WALL)));
    }

    /// Returns the character standing on `(x, y)`.
    pub fn occupant(&self, level: &Level, x: usize, y: usize) -> Option<CharacterId> {
        self.read(|txn| level.board().space_at(txn, x, y)).character
    }

    /// Returns the committed state of a character.
    pub fn state(&self, character: CharacterId) -> CharacterState {
        self.read(|txn| self.world.store().character(txn, character))
    }

    /// Drains the messages delivered to a character.
    pub fn messages(&self, character: CharacterId) -> Vec<LevelMessage> {
        self.world.channel().take_messages(character)
    }
}

impl Default for WorldFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks that the board and the characters on a level agree.
///
/// Every character in the roster stands on the tile at its recorded
/// position, no passable tile holds two characters, and no tile holds a
/// character that is not in the roster.
///
/// # Panics
///
/// Panics describing the first inconsistency found.
pub fn assert_level_consistent(fixture: &WorldFixture, level: &Level) {
    fixture.read(|txn| {
        let roster = level.roster(txn)?;
        let board = level.board();
        let mut seen: HashMap<CharacterId, (usize, usize)> = HashMap::new();

        for y in 0..board.height() {
            for x in 0..board.width() {
                let tile = board.tile(txn, x, y)?;
                if tile.connector().is_none() {
                    assert!(
                        tile.occupants().len() <= 1,
                        "({x}, {y}) holds {} characters",
                        tile.occupants().len()
                    );
                }
                for occupant in tile.occupants() {
                    assert!(roster.contains(occupant), "{occupant} at ({x}, {y}) not in roster");
                    let previous = seen.insert(*occupant, (x, y));
                    assert!(previous.is_none(), "{occupant} stands on two tiles");
                }
            }
        }

        for character in &roster {
            let state = fixture.world.store().character(txn, *character)?;
            assert!(state.is_on(level.name()), "{character} believes it is elsewhere");
            assert_eq!(
                state.position,
                seen.get(character).copied(),
                "{character} position disagrees with the board"
            );
        }
        Ok(())
    });
}
