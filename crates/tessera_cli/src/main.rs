//! Tessera CLI
//!
//! Command-line driver for Tessera worlds.
//!
//! # Commands
//!
//! - `simulate` - Run concurrent random movement over one level and report
//!   what happened

mod commands;

use clap::{Parser, Subcommand};
use commands::simulate::SimulateOptions;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Tessera command-line tools.
#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Move characters around a level from several threads
    Simulate {
        /// Board width
        #[arg(long, default_value = "16")]
        width: usize,

        /// Board height
        #[arg(long, default_value = "16")]
        height: usize,

        /// Number of player characters
        #[arg(short, long, default_value = "8")]
        characters: usize,

        /// Number of server-driven characters
        #[arg(long, default_value = "0")]
        ai: usize,

        /// Moves per player character
        #[arg(short, long, default_value = "100")]
        moves: usize,

        /// Worker threads driving the players
        #[arg(short, long, default_value = "4")]
        threads: usize,

        /// Seed for placement and movement
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Milliseconds between moves of a server-driven character
        #[arg(long, default_value = "10")]
        ai_period_ms: u64,

        /// Transaction timeout in milliseconds
        #[arg(long, default_value = "1000")]
        timeout_ms: u64,

        /// Longest wait for a tile held by another transaction, in milliseconds
        #[arg(long, default_value = "20")]
        lock_wait_ms: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Simulate {
            width,
            height,
            characters,
            ai,
            moves,
            threads,
            seed,
            ai_period_ms,
            timeout_ms,
            lock_wait_ms,
            format,
        } => {
            let options = SimulateOptions {
                width,
                height,
                players: characters,
                ai,
                moves,
                threads,
                seed,
                ai_period: Duration::from_millis(ai_period_ms),
                timeout: Duration::from_millis(timeout_ms),
                lock_wait: Duration::from_millis(lock_wait_ms),
            };
            commands::simulate::run(&options, &format)?;
        }
        Commands::Version => {
            println!("Tessera CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
