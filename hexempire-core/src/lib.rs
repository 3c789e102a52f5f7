//! HEXEMPIRE Core - Simulation engine and AI
//!
//! This crate provides the core game logic for HEXEMPIRE:
//! - Board geometry (offset hex grid) and the cell/army arena
//! - Pathfinding and move enumeration
//! - Combat rules and the simulation engine (moves, annexation, spawning)
//! - Heuristic AI evaluator and the AI turn sequencer
//! - Game room driver and JSON scenarios

pub mod board;
pub mod units;
pub mod faction;
pub mod rules;
pub mod events;
pub mod error;
pub mod pathfinder;
pub mod engine;
pub mod eval;
pub mod ai;
pub mod turn;
pub mod game;
pub mod scenario;

// Re-exports for convenient access
pub use board::{Board, Cell, CellId, Estate, Hex, Terrain, DIRECTIONS};
pub use units::{Unit, UnitId, MAX_STRENGTH};
pub use faction::{Control, Faction, FactionId};
pub use events::{Event, FieldRef};
pub use error::{CommandError, EngineError};
pub use engine::{execute_move, refresh_board, MoveResult};
pub use eval::{compute_ai_helpers, AiWeights};
pub use ai::{AiConfig, AiContext, Bot, Candidate, Evaluation, Posture};
pub use turn::{FixedDelay, Instant, MoveSink, TurnEnd, TurnPacer, TurnReport, TurnSequencer};
pub use game::{GameResult, GameRoom, GameSettings, Standing};
pub use scenario::Scenario;
