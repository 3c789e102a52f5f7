//! Integration tests for the HEXEMPIRE simulation
//!
//! Tests the full stack: scenarios, engine, AI turns and the game room

use hexempire_core::{
    board::{Board, CellId, Estate, Hex, Terrain},
    engine::{execute_move, refresh_board},
    events::Event,
    faction::Control,
    game::{GameResult, GameRoom, GameSettings},
    turn::Instant,
    CommandError, Scenario, MAX_STRENGTH,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// ============================================================================
// TEST FIXTURES
// ============================================================================

fn id(board: &Board, x: i32, y: i32) -> CellId {
    board.cell_id(Hex::new(x, y)).unwrap()
}

/// Random island map with 2-4 computer factions
fn random_board(rng: &mut ChaCha8Rng) -> Board {
    let width = rng.gen_range(10..15);
    let height = rng.gen_range(8..13);
    let mut board = Board::new(width, height);

    for cell in board.cell_ids() {
        let hex = board.hex_of(cell);
        let edge = hex.x == 0 || hex.y == 0 || hex.x == width - 1 || hex.y == height - 1;
        if edge || rng.gen_bool(0.15) {
            board.set_terrain(cell, Terrain::Water);
        } else if rng.gen_bool(0.08) {
            board.set_estate(cell, Some(Estate::Town));
        } else if rng.gen_bool(0.04) {
            board.set_estate(cell, Some(Estate::Port));
        }
    }

    let factions = rng.gen_range(2..5);
    let mut capitals: Vec<CellId> = Vec::new();
    while capitals.len() < factions {
        let cell = rng.gen_range(0..board.cells().len());
        let hex = board.hex_of(cell);
        let inland = hex.x > 0 && hex.y > 0 && hex.x < width - 1 && hex.y < height - 1;
        if inland && capitals.iter().all(|&c| board.distance(c, cell) >= 3) {
            capitals.push(cell);
        }
    }
    for (i, capital) in capitals.into_iter().enumerate() {
        board.add_faction(format!("Faction {}", i), capital, Control::Computer);
    }
    board
}

/// Structural invariants that must hold after every command
fn assert_consistent(board: &Board) {
    for unit in board.active_units() {
        let cell = unit.cell().expect("active army off the map");
        assert_eq!(board.cell(cell).unit(), Some(unit.id), "broken back-reference for {}", unit.id);
        assert!(unit.strength >= 1 && unit.strength <= MAX_STRENGTH, "{} has {} soldiers", unit.id, unit.strength);
        assert!(unit.morale >= 0 && unit.morale <= unit.strength, "{} morale {} out of range", unit.id, unit.morale);
    }
    for cell in board.cell_ids() {
        let c = board.cell(cell);
        if let Some(unit) = c.unit() {
            assert_eq!(board.unit(unit).and_then(|u| u.cell()), Some(cell));
        }
        if c.is_water() {
            assert_eq!(c.owner, None, "water at {} is owned", c.hex);
        }
    }
    for faction in &board.factions {
        if faction.units.is_empty() {
            assert_eq!(faction.morale, 10);
        }
    }
}

// ============================================================================
// FULL GAMES
// ============================================================================

#[test]
fn test_skirmish_plays_to_completion() {
    let board = Scenario::skirmish().to_board().unwrap();
    let mut room = GameRoom::new(board, GameSettings::default().with_turn_limit(25));
    room.start();

    let mut turns = 0;
    while let Some(report) = room.run_ai_turn(&Instant) {
        turns += 1;
        assert!(report.moves.len() <= 5);
        assert_consistent(room.board());
        assert!(turns < 1000, "game did not terminate");
    }

    assert!(room.is_over());
    assert_ne!(room.result(), GameResult::Ongoing);
    assert!(room.board().turn_number <= 25);
    assert!(room.board().factions.iter().any(|f| f.total_strength > 0));
}

#[test]
fn test_random_maps_keep_invariants() {
    for seed in 0..6u64 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let board = random_board(&mut rng);
        let mut room = GameRoom::new(board, GameSettings::default().with_turn_limit(12));
        room.start();
        assert_consistent(room.board());

        for report in room.play_until_human(&Instant) {
            assert!(report.moves.len() <= 5);
            assert!(report.moves.iter().all(|m| m.from != m.dest));
        }
        assert!(room.is_over(), "seed {} did not finish", seed);
        assert_consistent(room.board());
    }
}

#[test]
fn test_human_and_computer_alternate() {
    let mut board = Scenario::skirmish().to_board().unwrap();
    board.factions[0].control = Control::Human;
    let mut room = GameRoom::new(board, GameSettings::default().with_turn_limit(6));
    room.start();

    let mut human_turns = 0;
    while !room.is_over() {
        if room.is_human_turn() {
            human_turns += 1;
            let active = room.active_faction();
            let other = (active + 1) % room.board().faction_count() as u8;
            assert!(matches!(room.end_turn(other), Err(CommandError::NotYourTurn { .. })));
            room.end_turn(active).unwrap();
        } else {
            room.run_ai_turn(&Instant).unwrap();
        }
        assert_consistent(room.board());
    }
    assert!(human_turns > 0);
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_attack_on_town() {
    let mut board = Board::new(8, 8);
    let red_cap = id(&board, 0, 0);
    let blue_cap = id(&board, 7, 7);
    board.add_faction("Red", red_cap, Control::Computer);
    board.add_faction("Blue", blue_cap, Control::Computer);

    let town = id(&board, 4, 4);
    board.set_estate(town, Some(Estate::Town));
    let from = id(&board, 4, 3);
    let attacker = board.spawn_unit(from, 0, 50, 10);
    let defender = board.spawn_unit(town, 1, 30, 5);
    let bystander = board.spawn_unit(id(&board, 6, 6), 1, 20, 10);

    let result = execute_move(&mut board, from, town).unwrap();
    refresh_board(&mut board);

    let Event::Combat { attacker: side, winner, .. } = &result.events[0] else {
        panic!("expected combat first, got {:?}", result.events[0]);
    };
    assert_eq!(*winner, attacker);
    assert_eq!(side.losses, 29);
    assert_eq!(board.unit(attacker).unwrap().strength, 21);
    assert!(board.unit(defender).is_none());
    assert_eq!(board.unit(bystander).unwrap().morale, 7);
    assert_eq!(board.cell(town).owner, Some(0));
}

#[test]
fn test_capital_loss_transfers_land() {
    let mut board = Board::new(8, 8);
    let red_cap = id(&board, 0, 0);
    let blue_cap = id(&board, 5, 5);
    board.add_faction("Red", red_cap, Control::Computer);
    board.add_faction("Blue", blue_cap, Control::Computer);
    for (x, y) in [(7, 7), (7, 6), (6, 7)] {
        let cell = id(&board, x, y);
        board.set_owner(cell, Some(1));
    }
    let from = id(&board, 5, 4);
    board.spawn_unit(from, 0, 20, 0);
    refresh_board(&mut board);

    execute_move(&mut board, from, blue_cap).unwrap();
    let events = refresh_board(&mut board);

    assert_eq!(board.faction(1).status, 0);
    let transfers = events.iter().filter(|e| e.kind() == "land_transfer").count();
    assert_eq!(transfers, 3);
    assert_eq!(board.cell(id(&board, 7, 7)).owner, Some(0));
    assert_eq!(board.faction(1).morale, 10);
    assert_consistent(&board);
}

#[test]
fn test_event_wire_format() {
    let mut board = Board::new(4, 4);
    let cap = id(&board, 0, 0);
    board.add_faction("Red", cap, Control::Computer);
    let from = id(&board, 1, 1);
    board.spawn_unit(from, 0, 12, 3);

    let to = id(&board, 2, 1);
    let result = execute_move(&mut board, from, to).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["fromField"]["x"], 1);
    assert_eq!(json["toField"]["x"], 2);
    assert_eq!(json["events"][0]["type"], "annex");
    assert_eq!(json["events"][0]["newParty"], 0);
}

#[test]
fn test_scenario_file_round_trip() {
    let dir = std::env::temp_dir().join(format!("hexempire-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("skirmish.json");

    let scenario = Scenario::skirmish();
    scenario.save(&path).unwrap();
    let loaded = Scenario::load(&path).unwrap();
    assert_eq!(loaded, scenario);
    assert!(Scenario::load(&dir.join("missing.json")).is_err());

    std::fs::remove_dir_all(&dir).unwrap();
}
