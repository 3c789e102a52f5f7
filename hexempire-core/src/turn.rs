//! AI turn sequencing
//!
//! A computer faction's turn is a bounded series of scored moves. The
//! sequencer owns the loop; where moves are applied ([`MoveSink`]) and how
//! long to wait between them ([`TurnPacer`]) are injected, so the same loop
//! drives an animated client and a headless server.

use crate::ai::{Bot, Candidate};
use crate::board::Board;
use crate::engine::{execute_move, refresh_board};
use crate::error::CommandError;
use crate::events::Event;
use crate::faction::FactionId;
use crate::rules;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// INJECTED COLLABORATORS
// ============================================================================

/// Applies the moves the sequencer picks
pub trait MoveSink {
    fn board(&self) -> &Board;

    /// Apply one move and return the events it produced
    fn execute(&mut self, candidate: &Candidate) -> Result<Vec<Event>, CommandError>;
}

/// A bare board applies moves straight through the engine, without command
/// validation
impl MoveSink for Board {
    fn board(&self) -> &Board {
        self
    }

    fn execute(&mut self, candidate: &Candidate) -> Result<Vec<Event>, CommandError> {
        let mut events = execute_move(self, candidate.from, candidate.dest)?.events;
        events.extend(refresh_board(self));
        Ok(events)
    }
}

/// Timing between AI moves
pub trait TurnPacer {
    /// Pause before the first move
    fn initial_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Pause after a move, given whether animations are still running
    fn delay(&self, is_animating: bool) -> Duration;

    fn is_animating(&self) -> bool {
        false
    }
}

/// No pauses at all (headless play, tests)
#[derive(Clone, Copy, Debug, Default)]
pub struct Instant;

impl TurnPacer for Instant {
    fn delay(&self, _is_animating: bool) -> Duration {
        Duration::ZERO
    }
}

/// Fixed pauses, longer while something is animating
#[derive(Clone, Copy, Debug)]
pub struct FixedDelay {
    pub initial: Duration,
    pub idle: Duration,
    pub animating: Duration,
}

impl FixedDelay {
    pub fn new(idle: Duration) -> Self {
        Self {
            initial: idle,
            idle,
            animating: idle,
        }
    }
}

impl TurnPacer for FixedDelay {
    fn initial_delay(&self) -> Duration {
        self.initial
    }

    fn delay(&self, is_animating: bool) -> Duration {
        if is_animating {
            self.animating
        } else {
            self.idle
        }
    }
}

// ============================================================================
// SEQUENCER
// ============================================================================

/// Why an AI turn stopped
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEnd {
    /// All move points spent
    MovesExhausted,
    /// No army had a move left
    NoCandidates,
    /// A move was rejected; the turn still completes
    Aborted(String),
}

/// One sequencer step
#[derive(Clone, Debug)]
pub enum StepOutcome {
    Moved { candidate: Candidate, events: Vec<Event> },
    Finished(TurnEnd),
}

/// Summary of a finished AI turn
#[derive(Clone, Debug, Serialize)]
pub struct TurnReport {
    pub faction: FactionId,
    pub moves: Vec<Candidate>,
    pub events: Vec<Event>,
    pub end: TurnEnd,
}

/// Drives one computer faction's turn
#[derive(Clone, Debug)]
pub struct TurnSequencer {
    faction: FactionId,
    bot: Bot,
    move_points: usize,
    move_index: usize,
    moves: Vec<Candidate>,
    events: Vec<Event>,
    end: Option<TurnEnd>,
}

impl TurnSequencer {
    /// Fix the move points for `faction` from its currently movable armies
    pub fn begin(board: &Board, faction: FactionId, bot: Bot) -> Self {
        let movable = board
            .active_units()
            .filter(|u| u.faction == faction && !u.has_moved)
            .count();
        let move_points = rules::move_points(movable);
        info!(faction, movable, move_points, "AI turn started");

        Self {
            faction,
            bot,
            move_points,
            move_index: 0,
            moves: Vec::new(),
            events: Vec::new(),
            end: None,
        }
    }

    pub fn faction(&self) -> FactionId {
        self.faction
    }

    pub fn move_points(&self) -> usize {
        self.move_points
    }

    pub fn moves_made(&self) -> usize {
        self.move_index
    }

    pub fn is_finished(&self) -> bool {
        self.end.is_some()
    }

    /// Re-score every movable army and play the best move
    pub fn step<S: MoveSink + ?Sized>(&mut self, sink: &mut S) -> StepOutcome {
        if let Some(end) = &self.end {
            return StepOutcome::Finished(end.clone());
        }
        if self.move_index >= self.move_points {
            return self.finish(TurnEnd::MovesExhausted);
        }

        let evaluation = self.bot.evaluate_units(sink.board(), self.faction);
        let Some(best) = evaluation.best() else {
            return self.finish(TurnEnd::NoCandidates);
        };

        match sink.execute(&best) {
            Ok(events) => {
                debug!(
                    faction = self.faction,
                    unit = %best.unit,
                    profitability = best.profitability,
                    step = self.move_index + 1,
                    of = self.move_points,
                    "AI move"
                );
                self.move_index += 1;
                self.moves.push(best);
                self.events.extend(events.iter().cloned());
                StepOutcome::Moved { candidate: best, events }
            }
            Err(err) => {
                warn!(faction = self.faction, unit = %best.unit, error = %err, "AI turn aborted");
                self.finish(TurnEnd::Aborted(err.to_string()))
            }
        }
    }

    fn finish(&mut self, end: TurnEnd) -> StepOutcome {
        self.end = Some(end.clone());
        StepOutcome::Finished(end)
    }

    /// Step until the turn ends, pausing as the pacer says
    pub fn run<S, P>(mut self, sink: &mut S, pacer: &P) -> TurnReport
    where
        S: MoveSink + ?Sized,
        P: TurnPacer + ?Sized,
    {
        pause(pacer.initial_delay());
        loop {
            match self.step(sink) {
                StepOutcome::Moved { .. } => pause(pacer.delay(pacer.is_animating())),
                StepOutcome::Finished(_) => return self.into_report(),
            }
        }
    }

    /// Summarize; an unfinished sequencer reports its moves as exhausted
    pub fn into_report(self) -> TurnReport {
        TurnReport {
            faction: self.faction,
            moves: self.moves,
            events: self.events,
            end: self.end.unwrap_or(TurnEnd::MovesExhausted),
        }
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{CellId, Hex};
    use crate::eval::compute_ai_helpers;
    use crate::faction::Control;
    use std::cell::{Cell, RefCell};

    fn id(board: &Board, x: i32, y: i32) -> CellId {
        board.cell_id(Hex::new(x, y)).unwrap()
    }

    fn board_with_units(count: usize) -> Board {
        let mut board = Board::new(12, 12);
        let red = id(&board, 1, 1);
        let blue = id(&board, 10, 10);
        board.add_faction("Red", red, Control::Computer);
        board.add_faction("Blue", blue, Control::Computer);
        // Three hexes apart, out of each other's reach
        for i in 0..count as i32 {
            let cell = id(&board, 3 * (i % 4), 3 + 4 * (i / 4));
            board.spawn_unit(cell, 0, 20, 5);
        }
        refresh_board(&mut board);
        compute_ai_helpers(&mut board);
        board
    }

    /// Sink that rejects every move
    struct Refusing(Board);

    impl MoveSink for Refusing {
        fn board(&self) -> &Board {
            &self.0
        }

        fn execute(&mut self, _candidate: &Candidate) -> Result<Vec<Event>, CommandError> {
            Err(CommandError::NoMovesLeft)
        }
    }

    struct CountingPacer {
        calls: Cell<usize>,
    }

    impl TurnPacer for CountingPacer {
        fn delay(&self, is_animating: bool) -> Duration {
            assert!(!is_animating);
            self.calls.set(self.calls.get() + 1);
            Duration::ZERO
        }
    }

    /// Pacer that always reports a running animation and records each pause
    struct Animating {
        inner: FixedDelay,
        pauses: RefCell<Vec<Duration>>,
    }

    impl TurnPacer for Animating {
        fn initial_delay(&self) -> Duration {
            self.inner.initial_delay()
        }

        fn delay(&self, is_animating: bool) -> Duration {
            let pause = self.inner.delay(is_animating);
            self.pauses.borrow_mut().push(pause);
            pause
        }

        fn is_animating(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_move_points_capped() {
        let board = board_with_units(6);
        let sequencer = TurnSequencer::begin(&board, 0, Bot::default());
        assert_eq!(sequencer.move_points(), rules::MAX_MOVE_POINTS);

        let board = board_with_units(2);
        let sequencer = TurnSequencer::begin(&board, 0, Bot::default());
        assert_eq!(sequencer.move_points(), 2);
    }

    #[test]
    fn test_turn_spends_all_points() {
        let mut board = board_with_units(3);
        let pacer = CountingPacer { calls: Cell::new(0) };
        let report = TurnSequencer::begin(&board, 0, Bot::default()).run(&mut board, &pacer);

        assert_eq!(report.end, TurnEnd::MovesExhausted);
        assert_eq!(report.moves.len(), 3);
        assert_eq!(pacer.calls.get(), 3);
        assert!(board.units_of(0).iter().all(|&u| board.unit(u).unwrap().has_moved));
    }

    #[test]
    fn test_no_candidates_ends_early() {
        let mut board = board_with_units(0);
        let mut sequencer = TurnSequencer::begin(&board, 0, Bot::default());
        assert_eq!(sequencer.move_points(), 0);
        assert!(matches!(
            sequencer.step(&mut board),
            StepOutcome::Finished(TurnEnd::MovesExhausted)
        ));

        // A lone army boxed in by full friendly stacks has nowhere to go
        let mut board = Board::new(2, 1);
        let cap = id(&board, 0, 0);
        board.add_faction("Red", cap, Control::Computer);
        let a = board.spawn_unit(cap, 0, 10, 0);
        board.spawn_unit(id(&board, 1, 0), 0, 99, 0);
        board.unit_mut(a).unwrap().has_moved = false;
        let other = board.units_of(0)[1];
        board.unit_mut(other).unwrap().has_moved = true;
        let mut sequencer = TurnSequencer::begin(&board, 0, Bot::default());
        assert_eq!(sequencer.move_points(), 1);
        assert!(matches!(
            sequencer.step(&mut board),
            StepOutcome::Finished(TurnEnd::NoCandidates)
        ));
    }

    #[test]
    fn test_rejected_move_aborts_but_completes() {
        let board = board_with_units(2);
        let mut sink = Refusing(board);
        let report = TurnSequencer::begin(sink.board(), 0, Bot::default()).run(&mut sink, &Instant);
        assert!(matches!(report.end, TurnEnd::Aborted(_)));
        assert!(report.moves.is_empty());
    }

    #[test]
    fn test_animation_pause_after_each_move() {
        let mut board = board_with_units(3);
        let pacer = Animating {
            inner: FixedDelay {
                initial: Duration::ZERO,
                idle: Duration::ZERO,
                animating: Duration::from_millis(1),
            },
            pauses: RefCell::new(Vec::new()),
        };
        let report = TurnSequencer::begin(&board, 0, Bot::default()).run(&mut board, &pacer);

        assert_eq!(report.end, TurnEnd::MovesExhausted);
        assert_eq!(report.moves.len(), 3);
        assert_eq!(*pacer.pauses.borrow(), vec![Duration::from_millis(1); 3]);
    }

    #[test]
    fn test_fixed_delay_picks_animation_pause() {
        let pacer = FixedDelay {
            initial: Duration::from_millis(5),
            idle: Duration::from_millis(1),
            animating: Duration::from_millis(9),
        };
        assert_eq!(pacer.delay(true), Duration::from_millis(9));
        assert_eq!(pacer.delay(false), Duration::from_millis(1));
        assert_eq!(pacer.initial_delay(), Duration::from_millis(5));
    }
}
