//! Error types for the engine and for player commands

use crate::board::{CellId, Hex};
use crate::faction::FactionId;
use crate::units::UnitId;
use thiserror::Error;

/// Failures of a raw engine operation. No state is mutated when returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("No army at source cell {0}")]
    NoUnitAtSource(Hex),

    #[error("Cell index {0} is not on the board")]
    UnknownCell(CellId),

    #[error("Army {0} is not on the army table")]
    MissingArmy(UnitId),
}

/// Rejected move commands. Recoverable; the game state is untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("The game is over")]
    GameOver,

    #[error("Faction {caller} tried to move during faction {active}'s turn")]
    NotYourTurn { caller: FactionId, active: FactionId },

    #[error("Coordinates {0} are not on the board")]
    UnknownCoordinates(Hex),

    #[error("No army at source cell {0}")]
    NoUnitAtSource(Hex),

    #[error("Army {unit} belongs to faction {owner}, not {caller}")]
    NotYourUnit { unit: UnitId, owner: FactionId, caller: FactionId },

    #[error("Army {0} has already moved this turn")]
    AlreadyMoved(UnitId),

    #[error("Cell {to} cannot be reached from {from}")]
    UnreachableDestination { from: Hex, to: Hex },

    #[error("No moves left this turn")]
    NoMovesLeft,

    #[error(transparent)]
    Engine(#[from] EngineError),
}
