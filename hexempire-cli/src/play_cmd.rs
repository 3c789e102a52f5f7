//! Play command - run a game with every faction under computer control
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: load_scenario(), build_room(), play_game(), report_results()
//! - Level 3: EventLog, progress bar
//! - Level 4: formatting utilities

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use hexempire_core::{
    AiConfig, AiWeights, Control, Event, FactionId, FixedDelay, GameResult, GameRoom, GameSettings, Instant, Scenario,
    Standing, TurnEnd, TurnPacer,
};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct PlayArgs {
    /// Scenario JSON file (defaults to the built-in skirmish map)
    #[arg(long, value_name = "FILE")]
    pub scenario: Option<PathBuf>,

    /// Rounds before the game is called
    #[arg(long, default_value = "150")]
    pub max_turns: u32,

    /// Pause between AI moves in milliseconds
    #[arg(long, default_value = "0")]
    pub delay_ms: u64,

    /// AI difficulty level
    #[arg(long, default_value = "1")]
    pub difficulty: i32,

    /// AI weights JSON file
    #[arg(long, value_name = "FILE")]
    pub weights: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Write every event as one JSON line to this file
    #[arg(long, value_name = "FILE")]
    pub events: Option<PathBuf>,
}

/// Summary of a finished game
#[derive(Clone, Debug, Serialize)]
pub struct GameSummary {
    pub scenario: String,
    pub result: GameResult,
    pub rounds: u32,
    pub ai_turns: usize,
    pub aborted_turns: usize,
    pub events: usize,
    pub standings: Vec<Standing>,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run play command
///
/// 1. Load the scenario
/// 2. Build the room with every faction on computer control
/// 3. Play to the end
/// 4. Report standings
pub fn run(args: PlayArgs) -> Result<()> {
    let scenario = load_scenario(&args)?;
    let mut room = build_room(&scenario, &args)?;

    tracing::info!(
        "Starting game: {} ({} factions, limit {} rounds)",
        scenario.name,
        scenario.factions.len(),
        args.max_turns
    );

    let mut log = match &args.events {
        Some(path) => Some(EventLog::create(path)?),
        None => None,
    };
    let summary = play_game(&scenario.name, &mut room, pacer(&args).as_ref(), log.as_mut(), !args.json)?;
    if let Some(log) = log.as_mut() {
        log.flush()?;
    }

    report_results(&summary, &room, args.json)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn load_scenario(args: &PlayArgs) -> Result<Scenario> {
    match &args.scenario {
        Some(path) => Scenario::load(path),
        None => Ok(Scenario::skirmish()),
    }
}

fn build_room(scenario: &Scenario, args: &PlayArgs) -> Result<GameRoom> {
    let mut board = scenario
        .to_board()
        .with_context(|| format!("Invalid scenario '{}'", scenario.name))?;
    for faction in &mut board.factions {
        faction.control = Control::Computer;
    }

    let weights = match &args.weights {
        Some(path) => AiWeights::load(path)
            .with_context(|| format!("Failed to load AI weights: {}", path.display()))?,
        None => AiWeights::default(),
    };
    let ai = AiConfig::default()
        .with_weights(weights)
        .with_difficulty(args.difficulty);
    let settings = GameSettings::default()
        .with_turn_limit(args.max_turns)
        .with_ai(ai);

    Ok(GameRoom::new(board, settings))
}

fn pacer(args: &PlayArgs) -> Box<dyn TurnPacer> {
    if args.delay_ms > 0 {
        Box::new(FixedDelay::new(Duration::from_millis(args.delay_ms)))
    } else {
        Box::new(Instant)
    }
}

/// Drive the room until a result is reached
pub fn play_game(
    name: &str,
    room: &mut GameRoom,
    pacer: &dyn TurnPacer,
    mut log: Option<&mut EventLog>,
    show_progress: bool,
) -> Result<GameSummary> {
    let progress = progress_bar(room.settings().turn_limit, show_progress);

    let start_events = room.start();
    let mut event_count = start_events.len();
    if let Some(log) = log.as_deref_mut() {
        log.write_all(0, None, &start_events)?;
    }

    let mut ai_turns = 0;
    let mut aborted_turns = 0;
    while let Some(report) = room.run_ai_turn(pacer) {
        ai_turns += 1;
        if matches!(report.end, TurnEnd::Aborted(_)) {
            aborted_turns += 1;
        }
        event_count += report.events.len();
        if let Some(log) = log.as_deref_mut() {
            log.write_all(room.board().turn_number, Some(report.faction), &report.events)?;
        }

        progress.set_position(room.board().turn_number as u64);
        progress.set_message(room.board().faction(report.faction).name.clone());
    }
    progress.finish_and_clear();

    Ok(GameSummary {
        scenario: name.to_string(),
        result: room.result(),
        rounds: room.board().turn_number,
        ai_turns,
        aborted_turns,
        events: event_count,
        standings: room.standings(),
    })
}

fn report_results(summary: &GameSummary, room: &GameRoom, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        print_text_results(summary, room);
    }
    Ok(())
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

/// JSON-lines event sink
pub struct EventLog {
    writer: BufWriter<File>,
}

#[derive(Serialize)]
struct LoggedEvent<'a> {
    turn: u32,
    faction: Option<FactionId>,
    event: &'a Event,
}

impl EventLog {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create event log: {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn write_all(&mut self, turn: u32, faction: Option<FactionId>, events: &[Event]) -> Result<()> {
        for event in events {
            serde_json::to_writer(&mut self.writer, &LoggedEvent { turn, faction, event })?;
            writeln!(self.writer)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush event log")
    }
}

fn progress_bar(turn_limit: u32, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(turn_limit as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner} round {pos}/{len} [{bar:30}] {msg}") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

fn describe(result: GameResult, room: &GameRoom) -> String {
    match result {
        GameResult::Victory(f) => format!("{} has conquered the world", room.board().faction(f).name),
        GameResult::Defeat(f) => format!("{} was defeated", room.board().faction(f).name),
        GameResult::TurnLimit => "Turn limit reached".to_string(),
        GameResult::Ongoing => "Unfinished".to_string(),
    }
}

fn print_text_results(summary: &GameSummary, room: &GameRoom) {
    println!("\n=== {} ===", summary.scenario);
    println!("Result:  {}", describe(summary.result, room));
    println!("Rounds:  {}", summary.rounds);
    println!("AI turns: {} ({} aborted)", summary.ai_turns, summary.aborted_turns);
    println!("Events:  {}", summary.events);
    println!();
    println!(
        "{:<12} {:>6} {:>6} {:>8} {:>6} {:>5} {:>5} {:>5}",
        "Faction", "Status", "Armies", "Strength", "Morale", "Towns", "Ports", "Lands"
    );
    for row in &summary.standings {
        println!(
            "{:<12} {:>6} {:>6} {:>8} {:>6} {:>5} {:>5} {:>5}",
            row.name, row.status, row.armies, row.strength, row.morale, row.towns, row.ports, row.lands
        );
    }
}
