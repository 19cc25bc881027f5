//! Stress tests for levels.
//!
//! These runs drive many characters around one level from several threads
//! at once.

use crate::fixtures::WorldFixture;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tessera_world::{CharacterId, Direction, Level, WorldResult};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Moves that changed the board.
    pub successful_ops: usize,
    /// Moves that were refused or failed.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Moves per thread.
    pub moves: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Seed for the per-thread random number generators.
    pub seed: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            moves: 200,
            threads: 4,
            seed: 42,
        }
    }
}

/// Moves `characters` randomly around `level`, one scheduler task per move.
///
/// Characters are dealt round-robin to the threads; each thread moves one
/// of its characters per step.
pub fn stress_random_moves(
    fixture: &WorldFixture,
    level: &Arc<Level>,
    characters: &[CharacterId],
    config: &StressConfig,
) -> StressTestResult {
    let threads = config.threads.max(1);
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|index| {
            let mine: Vec<_> = characters
                .iter()
                .copied()
                .skip(index)
                .step_by(threads)
                .collect();
            let scheduler = fixture.scheduler.clone();
            let level = Arc::clone(level);
            let moves = config.moves;
            let seed = config.seed.wrapping_add(index as u64);
            thread::spawn(move || {
                let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
                let (mut successful, mut failed) = (0usize, 0usize);
                if mine.is_empty() {
                    return (successful, failed);
                }
                for step in 0..moves {
                    let character = mine[step % mine.len()];
                    let direction = *Direction::ALL.choose(&mut rng).unwrap_or(&Direction::Up);
                    let result: WorldResult<bool> = scheduler
                        .run_task(|txn| level.move_character(txn, character, direction));
                    match result {
                        Ok(true) => successful += 1,
                        _ => failed += 1,
                    }
                }
                (successful, failed)
            })
        })
        .collect();

    let (mut successful, mut failed) = (0, 0);
    for handle in handles {
        let (ok, err) = handle.join().expect("Stress thread panicked");
        successful += ok;
        failed += err;
    }

    StressTestResult::new(successful, failed, start.elapsed())
}
