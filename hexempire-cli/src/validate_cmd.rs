//! Validate command - load a scenario and summarize it

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use hexempire_core::{Board, Bot, Posture, Scenario};

#[derive(Args)]
pub struct ValidateArgs {
    /// Scenario JSON file
    #[arg(long, value_name = "FILE")]
    pub scenario: PathBuf,

    /// Output the summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct FactionReport {
    name: String,
    capital: (i32, i32),
    towns: usize,
    ports: usize,
    lands: usize,
    armies: usize,
    strength: i32,
    posture: Posture,
}

#[derive(Serialize)]
struct ScenarioReport {
    name: String,
    width: i32,
    height: i32,
    land: usize,
    water: usize,
    factions: Vec<FactionReport>,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let board = scenario
        .to_board()
        .with_context(|| format!("Invalid scenario: {}", args.scenario.display()))?;
    let report = summarize(&scenario.name, &board);

    tracing::info!("Scenario '{}' is valid", report.name);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn summarize(name: &str, board: &Board) -> ScenarioReport {
    let bot = Bot::default();
    let water = board.cells().iter().filter(|c| c.is_water()).count();
    let factions = board
        .factions
        .iter()
        .map(|f| {
            let capital = board.hex_of(f.capital);
            FactionReport {
                name: f.name.clone(),
                capital: (capital.x, capital.y),
                towns: f.towns.len(),
                ports: f.ports.len(),
                lands: f.lands.len(),
                armies: f.units.len(),
                strength: f.total_strength,
                posture: bot.assess(board, f.id).posture,
            }
        })
        .collect();

    ScenarioReport {
        name: name.to_string(),
        width: board.width(),
        height: board.height(),
        land: board.cells().len() - water,
        water,
        factions,
    }
}

fn print_report(report: &ScenarioReport) {
    println!("Scenario: {}", report.name);
    println!("Map:      {}x{} ({} land, {} water)", report.width, report.height, report.land, report.water);
    for f in &report.factions {
        println!(
            "  {:<12} capital ({}, {})  towns {}  ports {}  lands {}  armies {} ({} soldiers)  {:?}",
            f.name, f.capital.0, f.capital.1, f.towns, f.ports, f.lands, f.armies, f.strength, f.posture
        );
    }
}
