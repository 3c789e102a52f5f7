//! Game room - turn order, command validation and game end
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: GameRoom::start(), submit_move(), end_turn(), run_ai_turn()
//! - Level 2: advance() (turn rotation, turn limit, victory)
//! - Level 3: begin_faction_turn() (cleanup, refresh, move points)
//! - Level 4: engine and AI calls

use crate::ai::{AiConfig, Bot, Candidate};
use crate::board::{Board, CellId, Hex};
use crate::engine::{cleanup_turn, execute_move, refresh_board, spawn_units};
use crate::error::CommandError;
use crate::eval::compute_ai_helpers;
use crate::events::Event;
use crate::faction::{Control, FactionId};
use crate::pathfinder::possible_moves;
use crate::rules;
use crate::turn::{MoveSink, TurnPacer, TurnReport, TurnSequencer};
use serde::Serialize;
use tracing::{info, warn};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Rounds played before the game is called
pub const DEFAULT_TURN_LIMIT: u32 = 150;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Clone, Debug)]
pub struct GameSettings {
    pub turn_limit: u32,
    pub ai: AiConfig,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            turn_limit: DEFAULT_TURN_LIMIT,
            ai: AiConfig::default(),
        }
    }
}

impl GameSettings {
    pub fn with_turn_limit(mut self, turn_limit: u32) -> Self {
        self.turn_limit = turn_limit;
        self
    }

    pub fn with_ai(mut self, ai: AiConfig) -> Self {
        self.ai = ai;
        self
    }
}

/// Game result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    Ongoing,
    /// Last faction standing
    Victory(FactionId),
    /// Every human faction has been eliminated
    Defeat(FactionId),
    TurnLimit,
}

/// One row of the final table
#[derive(Clone, Debug, Serialize)]
pub struct Standing {
    pub faction: FactionId,
    pub name: String,
    pub status: u8,
    pub armies: usize,
    pub strength: i32,
    pub morale: i32,
    pub towns: usize,
    pub ports: usize,
    pub lands: usize,
}

// ============================================================================
// ROOM
// ============================================================================

/// Authoritative driver for one game
#[derive(Debug)]
pub struct GameRoom {
    board: Board,
    bot: Bot,
    settings: GameSettings,
    moves_left: usize,
    ai_in_flight: bool,
    started: bool,
    result: GameResult,
}

impl GameRoom {
    pub fn new(board: Board, settings: GameSettings) -> Self {
        Self {
            board,
            bot: Bot::new(settings.ai.clone()),
            settings,
            moves_left: 0,
            ai_in_flight: false,
            started: false,
            result: GameResult::Ongoing,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn result(&self) -> GameResult {
        self.result
    }

    pub fn is_over(&self) -> bool {
        self.result != GameResult::Ongoing
    }

    pub fn active_faction(&self) -> FactionId {
        self.board.active_faction
    }

    pub fn moves_left(&self) -> usize {
        self.moves_left
    }

    pub fn is_human_turn(&self) -> bool {
        !self.is_over() && self.board.faction(self.board.active_faction).is_human()
    }

    /// Precompute AI helpers, raise starting armies and open the first turn
    pub fn start(&mut self) -> Vec<Event> {
        if self.started {
            return Vec::new();
        }
        self.started = true;

        compute_ai_helpers(&mut self.board);
        let mut events = Vec::new();
        for index in 0..self.board.faction_count() {
            events.extend(spawn_units(&mut self.board, index as FactionId));
        }
        events.extend(refresh_board(&mut self.board));

        self.board.turn_number = 0;
        info!(
            factions = self.board.faction_count(),
            width = self.board.width(),
            height = self.board.height(),
            "game started"
        );
        events.extend(self.advance(None));
        events
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Validate and apply a move for `caller`
    ///
    /// A rejected command leaves the game untouched.
    pub fn submit_move(&mut self, caller: FactionId, from: Hex, to: Hex) -> Result<Vec<Event>, CommandError> {
        let (source, dest) = self.validate_move(caller, from, to).map_err(|err| {
            warn!(caller, %from, %to, error = %err, "move rejected");
            err
        })?;

        let mut events = execute_move(&mut self.board, source, dest)?.events;
        events.extend(refresh_board(&mut self.board));
        self.moves_left -= 1;
        Ok(events)
    }

    fn validate_move(&self, caller: FactionId, from: Hex, to: Hex) -> Result<(CellId, CellId), CommandError> {
        self.check_turn(caller)?;
        let source = self.board.cell_id(from).ok_or(CommandError::UnknownCoordinates(from))?;
        let dest = self.board.cell_id(to).ok_or(CommandError::UnknownCoordinates(to))?;

        let unit = self.board.unit_at(source).ok_or(CommandError::NoUnitAtSource(from))?;
        if unit.faction != caller {
            return Err(CommandError::NotYourUnit {
                unit: unit.id,
                owner: unit.faction,
                caller,
            });
        }
        if unit.has_moved {
            return Err(CommandError::AlreadyMoved(unit.id));
        }
        if self.moves_left == 0 {
            return Err(CommandError::NoMovesLeft);
        }
        if !possible_moves(&self.board, source, true, false).contains(&dest) {
            return Err(CommandError::UnreachableDestination { from, to });
        }
        Ok((source, dest))
    }

    fn check_turn(&self, caller: FactionId) -> Result<(), CommandError> {
        if self.is_over() {
            return Err(CommandError::GameOver);
        }
        if caller != self.board.active_faction {
            return Err(CommandError::NotYourTurn {
                caller,
                active: self.board.active_faction,
            });
        }
        Ok(())
    }

    /// Finish `caller`'s turn: reinforce, then hand over to the next faction
    pub fn end_turn(&mut self, caller: FactionId) -> Result<Vec<Event>, CommandError> {
        self.check_turn(caller)?;
        Ok(self.close_turn(caller))
    }

    fn close_turn(&mut self, faction: FactionId) -> Vec<Event> {
        let mut events = spawn_units(&mut self.board, faction);
        events.extend(refresh_board(&mut self.board));
        events.extend(self.advance(Some(faction)));
        events
    }

    pub fn set_control(&mut self, faction: FactionId, control: Control) {
        if let Some(f) = self.board.factions.get_mut(faction as usize) {
            f.control = control;
            info!(faction, ?control, "control changed");
        }
    }

    /// A leaving player's faction is taken over by the computer
    pub fn disconnect(&mut self, faction: FactionId) {
        self.set_control(faction, Control::Computer);
    }

    // ------------------------------------------------------------------------
    // AI turns
    // ------------------------------------------------------------------------

    /// Start the active computer faction's turn
    ///
    /// Returns `None` when the game is over, the active faction is human, or a
    /// sequence is already running.
    pub fn begin_ai_turn(&mut self) -> Option<TurnSequencer> {
        if self.is_over() || self.ai_in_flight || self.is_human_turn() {
            return None;
        }
        self.ai_in_flight = true;
        Some(TurnSequencer::begin(&self.board, self.board.active_faction, self.bot.clone()))
    }

    /// Close a computer turn; end-of-turn events are appended to the report
    pub fn finish_ai_turn(&mut self, report: &mut TurnReport) {
        self.ai_in_flight = false;
        if self.is_over() || report.faction != self.board.active_faction {
            return;
        }
        let events = self.close_turn(report.faction);
        report.events.extend(events);
    }

    /// Play the active computer faction's whole turn
    pub fn run_ai_turn<P: TurnPacer + ?Sized>(&mut self, pacer: &P) -> Option<TurnReport> {
        let sequencer = self.begin_ai_turn()?;
        let mut report = sequencer.run(self, pacer);
        self.finish_ai_turn(&mut report);
        Some(report)
    }

    /// Run computer turns until a human is to move or the game ends
    pub fn play_until_human<P: TurnPacer + ?Sized>(&mut self, pacer: &P) -> Vec<TurnReport> {
        let mut reports = Vec::new();
        while let Some(report) = self.run_ai_turn(pacer) {
            reports.push(report);
        }
        reports
    }

    // ------------------------------------------------------------------------
    // Turn rotation
    // ------------------------------------------------------------------------

    /// Hand the turn to the next living faction after `previous`
    ///
    /// Wrapping past the last faction starts a new round. Human factions that
    /// cannot move are passed over after their reinforcements.
    fn advance(&mut self, previous: Option<FactionId>) -> Vec<Event> {
        let count = self.board.faction_count();
        let mut events = Vec::new();
        let mut next = previous.map_or(0, |f| f as usize + 1);

        loop {
            if next >= count {
                next = 0;
                self.board.turn_number += 1;
                if self.board.turn_number >= self.settings.turn_limit {
                    return self.finish(GameResult::TurnLimit, events);
                }
                info!(turn = self.board.turn_number + 1, "round started");
            }

            self.board.active_faction = next as FactionId;
            if let Some(result) = self.decided() {
                return self.finish(result, events);
            }
            if !self.board.faction(next as FactionId).is_alive() {
                next += 1;
                continue;
            }

            events.extend(self.begin_faction_turn(next as FactionId));
            let faction = self.board.faction(next as FactionId);
            if faction.is_human() && (self.moves_left == 0 || !self.can_move(faction.id)) {
                info!(faction = faction.id, "no moves available, turn passed");
                events.extend(spawn_units(&mut self.board, next as FactionId));
                events.extend(refresh_board(&mut self.board));
                next += 1;
                continue;
            }
            return events;
        }
    }

    fn begin_faction_turn(&mut self, faction: FactionId) -> Vec<Event> {
        let mut events: Vec<Event> = cleanup_turn(&mut self.board, faction).into_iter().collect();
        events.extend(refresh_board(&mut self.board));

        let movable = self
            .board
            .active_units()
            .filter(|u| u.faction == faction && !u.has_moved)
            .count();
        self.moves_left = rules::move_points(movable);
        info!(
            turn = self.board.turn_number + 1,
            faction,
            name = %self.board.faction(faction).name,
            moves = self.moves_left,
            "turn started"
        );
        events
    }

    fn can_move(&self, faction: FactionId) -> bool {
        self.board
            .active_units()
            .filter(|u| u.faction == faction && !u.has_moved)
            .filter_map(|u| u.cell())
            .any(|cell| !possible_moves(&self.board, cell, true, false).is_empty())
    }

    fn decided(&self) -> Option<GameResult> {
        let humans: Vec<_> = self.board.factions.iter().filter(|f| f.is_human()).collect();
        if !humans.is_empty() && humans.iter().all(|f| !f.is_alive()) {
            return Some(GameResult::Defeat(humans[0].id));
        }
        let mut alive = self.board.alive_factions();
        match (alive.next(), alive.next()) {
            (Some(last), None) => Some(GameResult::Victory(last.id)),
            _ => None,
        }
    }

    fn finish(&mut self, result: GameResult, events: Vec<Event>) -> Vec<Event> {
        self.result = result;
        self.moves_left = 0;
        info!(?result, turn = self.board.turn_number, "game over");
        events
    }

    /// Factions ordered by status, then strength
    pub fn standings(&self) -> Vec<Standing> {
        let mut table: Vec<Standing> = self
            .board
            .factions
            .iter()
            .map(|f| Standing {
                faction: f.id,
                name: f.name.clone(),
                status: f.status,
                armies: f.units.len(),
                strength: f.total_strength,
                morale: f.morale,
                towns: f.towns.len(),
                ports: f.ports.len(),
                lands: f.lands.len(),
            })
            .collect();
        table.sort_by(|a, b| b.status.cmp(&a.status).then(b.strength.cmp(&a.strength)));
        table
    }
}

/// Computer moves go through the same validation as human commands
impl MoveSink for GameRoom {
    fn board(&self) -> &Board {
        &self.board
    }

    fn execute(&mut self, candidate: &Candidate) -> Result<Vec<Event>, CommandError> {
        let from = self.board.hex_of(candidate.from);
        let to = self.board.hex_of(candidate.dest);
        self.submit_move(self.board.active_faction, from, to)
    }
}
