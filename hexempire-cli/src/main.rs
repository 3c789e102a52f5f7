//! HEXEMPIRE CLI - Command-line interface
//!
//! Commands:
//! - play: Run an all-computer game from a scenario
//! - validate: Check a scenario file and summarize it

mod play_cmd;
mod validate_cmd;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "hexempire")]
#[command(about = "HEXEMPIRE headless simulation driver")]
struct Cli {
    /// Verbose logging (debug level) when RUST_LOG is unset
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a game with every faction under computer control
    Play(play_cmd::PlayArgs),
    /// Load a scenario and report what it contains
    Validate(validate_cmd::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Play(args) => play_cmd::run(args),
        Commands::Validate(args) => validate_cmd::run(args),
    }
}
