//! Simulate command implementation.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tessera_store::StoreConfig;
use tessera_txn::{
    CoordinatorConfig, SchedulerConfig, StatsSnapshot, TimeoutPolicy, Transaction,
    TransactionCoordinator, TransactionScheduler,
};
use tessera_world::{
    BoardSpec, CharacterId, CharacterKind, Direction, Level, SpriteId, World, WorldConfig,
    WorldResult,
};
use tracing::{info, warn};

const FLOOR: SpriteId = SpriteId(1);

/// Parameters of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Board width.
    pub width: usize,
    /// Board height.
    pub height: usize,
    /// Number of player characters.
    pub players: usize,
    /// Number of server-driven characters.
    pub ai: usize,
    /// Moves per player character.
    pub moves: usize,
    /// Worker threads driving the players.
    pub threads: usize,
    /// Seed for placement and movement.
    pub seed: u64,
    /// Time between moves of a server-driven character.
    pub ai_period: Duration,
    /// Transaction timeout.
    pub timeout: Duration,
    /// Longest wait for a locked tile.
    pub lock_wait: Duration,
}

/// Outcome of a simulation run.
#[derive(Debug, Default, Serialize)]
pub struct SimulateResult {
    /// Board width.
    pub width: usize,
    /// Board height.
    pub height: usize,
    /// Player characters placed.
    pub players: usize,
    /// Server-driven characters placed.
    pub ai: usize,
    /// Player moves attempted.
    pub moves_attempted: usize,
    /// Player moves that changed the board.
    pub moves_succeeded: usize,
    /// Player moves refused by the board.
    pub moves_refused: usize,
    /// Player moves that failed with an error.
    pub moves_failed: usize,
    /// Turns taken by server-driven characters.
    pub ai_turns: u64,
    /// Messages read from player mailboxes.
    pub messages_received: usize,
    /// Characters on the level at the end.
    pub characters_on_level: usize,
    /// Wall-clock time of the movement phase in milliseconds.
    pub duration_ms: u64,
    /// Transaction counters.
    pub transactions: TransactionSummary,
}

/// Transaction counters reported by a run.
#[derive(Debug, Default, Serialize)]
pub struct TransactionSummary {
    /// Transactions created.
    pub created: u64,
    /// Transactions committed.
    pub committed: u64,
    /// Transactions aborted.
    pub aborted: u64,
    /// Transactions that timed out.
    pub timed_out: u64,
    /// Prepare-and-commit shortcuts taken.
    pub prepare_and_commits: u64,
}

impl From<StatsSnapshot> for TransactionSummary {
    fn from(stats: StatsSnapshot) -> Self {
        Self {
            created: stats.created,
            committed: stats.committed,
            aborted: stats.aborted,
            timed_out: stats.timed_out,
            prepare_and_commits: stats.prepare_and_commits,
        }
    }
}

#[derive(Default)]
struct WorkerTally {
    attempted: usize,
    succeeded: usize,
    refused: usize,
    failed: usize,
    messages: usize,
}

/// Runs the simulate command.
pub fn run(options: &SimulateOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = simulate(options)?;
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }
    Ok(())
}

/// Builds a world with one open level and drives it.
pub fn simulate(options: &SimulateOptions) -> Result<SimulateResult, Box<dyn std::error::Error>> {
    let cells = options.width.saturating_mul(options.height);
    if options.players + options.ai > cells {
        return Err(format!(
            "{} characters do not fit on a {}x{} board",
            options.players + options.ai,
            options.width,
            options.height
        )
        .into());
    }

    let coordinator = Arc::new(TransactionCoordinator::new(
        CoordinatorConfig::new().bounded_timeout(options.timeout),
    )?);
    let scheduler = TransactionScheduler::new(
        Arc::clone(&coordinator),
        SchedulerConfig::new().with_max_attempts(100),
    );
    let world = World::new(
        WorldConfig::default(),
        StoreConfig::new().lock_wait(options.lock_wait),
    );

    // Building a large board can outlast a bounded transaction.
    let setup = coordinator.create_transaction(TimeoutPolicy::Unbounded);
    let spec = BoardSpec::open(options.width, options.height, FLOOR);
    let level = world.add_level(setup.transaction(), "main", &spec)?;
    setup.commit()?;

    let mut rng = StdRng::seed_from_u64(options.seed);
    let players = spawn(
        &scheduler,
        &world,
        &level,
        "player",
        CharacterKind::Player,
        options.players,
        &mut rng,
    )?;
    let ai = spawn(&scheduler, &world, &level, "ai", CharacterKind::Ai, options.ai, &mut rng)?;
    info!(players = players.len(), ai = ai.len(), "characters placed");

    let ai_turns = Arc::new(AtomicU64::new(0));
    let start = Instant::now();
    let ai_tasks = ai
        .iter()
        .enumerate()
        .map(|(index, &character)| {
            let level = Arc::clone(&level);
            let channel = Arc::clone(world.channel());
            let turns = Arc::clone(&ai_turns);
            let mut rng = StdRng::seed_from_u64(options.seed ^ ((index as u64 + 1) << 32));
            scheduler.schedule_periodic(
                format!("ai-{index}"),
                move |txn: &Transaction| -> WorldResult<()> {
                    turns.fetch_add(1, Ordering::Relaxed);
                    // Nothing reads what AI characters are sent.
                    channel.take_messages(character);
                    level.move_character(txn, character, random_direction(&mut rng))?;
                    Ok(())
                },
                options.ai_period,
                options.ai_period,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let threads = options.threads.max(1);
    let tallies: Vec<WorkerTally> = thread::scope(|scope| {
        let workers: Vec<_> = (0..threads)
            .map(|index| {
                let mine: Vec<_> = players.iter().copied().skip(index).step_by(threads).collect();
                let (scheduler, world, level) = (&scheduler, &world, &level);
                let seed = options.seed.wrapping_add(index as u64 + 1);
                scope.spawn(move || drive_players(scheduler, world, level, &mine, options.moves, seed))
            })
            .collect();
        workers
            .into_iter()
            .filter_map(|worker| worker.join().ok())
            .collect()
    });
    let duration = start.elapsed();

    for task in &ai_tasks {
        task.cancel();
    }
    drop(ai_tasks);

    let mut result = SimulateResult {
        width: options.width,
        height: options.height,
        players: players.len(),
        ai: ai.len(),
        ai_turns: ai_turns.load(Ordering::Relaxed),
        duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        ..SimulateResult::default()
    };
    for tally in tallies {
        result.moves_attempted += tally.attempted;
        result.moves_succeeded += tally.succeeded;
        result.moves_refused += tally.refused;
        result.moves_failed += tally.failed;
        result.messages_received += tally.messages;
    }

    let reader = coordinator.create_transaction(TimeoutPolicy::Bounded);
    result.characters_on_level = level.roster(reader.transaction())?.len();
    reader.commit()?;
    result.transactions = coordinator.stats().snapshot().into();
    Ok(result)
}

fn spawn(
    scheduler: &TransactionScheduler,
    world: &World,
    level: &Level,
    prefix: &str,
    kind: CharacterKind,
    count: usize,
    rng: &mut StdRng,
) -> WorldResult<Vec<CharacterId>> {
    let mut placed = Vec::with_capacity(count);
    for index in 0..count {
        let name = format!("{prefix}-{index}");
        let id: WorldResult<CharacterId> = scheduler.run_task(|txn| {
            let id = world.create_character(txn, &name, kind)?;
            level.add_character(txn, id, &mut *rng)?;
            Ok(id)
        });
        placed.push(id?);
    }
    Ok(placed)
}

fn drive_players(
    scheduler: &TransactionScheduler,
    world: &World,
    level: &Level,
    players: &[CharacterId],
    moves: usize,
    seed: u64,
) -> WorkerTally {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tally = WorkerTally::default();
    for _ in 0..moves {
        for &character in players {
            let direction = random_direction(&mut rng);
            tally.attempted += 1;
            let result: WorldResult<bool> =
                scheduler.run_task(|txn| level.move_character(txn, character, direction));
            match result {
                Ok(true) => tally.succeeded += 1,
                Ok(false) => tally.refused += 1,
                Err(error) => {
                    warn!(%character, %error, "move failed");
                    tally.failed += 1;
                }
            }
            tally.messages += world.channel().take_messages(character).len();
        }
    }
    tally
}

fn random_direction(rng: &mut StdRng) -> Direction {
    Direction::ALL
        .choose(rng)
        .copied()
        .unwrap_or(Direction::Up)
}

fn print_text_output(result: &SimulateResult) {
    println!("Simulation");
    println!("==========");
    println!();
    println!("Board:              {}x{}", result.width, result.height);
    println!("Players:            {}", result.players);
    println!("AI characters:      {}", result.ai);
    println!("On level at end:    {}", result.characters_on_level);
    println!();
    println!("Moves attempted:    {}", result.moves_attempted);
    println!("  Succeeded:        {}", result.moves_succeeded);
    println!("  Refused:          {}", result.moves_refused);
    println!("  Failed:           {}", result.moves_failed);
    println!("AI turns:           {}", result.ai_turns);
    println!("Messages received:  {}", result.messages_received);
    println!("Duration:           {} ms", result.duration_ms);
    println!();
    println!("Transactions");
    println!("  Created:          {}", result.transactions.created);
    println!("  Committed:        {}", result.transactions.committed);
    println!("  Aborted:          {}", result.transactions.aborted);
    println!("  Timed out:        {}", result.transactions.timed_out);
    println!("  Shortcut commits: {}", result.transactions.prepare_and_commits);
}
