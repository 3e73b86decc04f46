//! Playcast CLI - Automated Game Boy playthroughs
//!
//! # Commands
//!
//! - `playcast run` - Play cycles, reading selections from stdin
//! - `playcast init` - Write a default playcast.toml
//!
//! # Usage
//!
//! ```bash
//! # Play the first ROM in ./roms, pressing Start before the first cycle
//! playcast run --core wasmboy.wasm start
//!
//! # Then type one selection per line: a, b, up, down, left, right,
//! # select, start, or a number to repeat the next press
//! ```

mod init;
mod run;
mod stdin;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Playcast - Automated Game Boy playthroughs
#[derive(Parser)]
#[command(name = "playcast")]
#[command(about = "Drive a Game Boy game by audience input and record it as GIFs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run playthrough cycles
    Run(run::RunArgs),

    /// Write a configuration file with every default spelled out
    Init(init::InitArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run::execute(args),
        Commands::Init(args) => init::execute(args),
    }
}
