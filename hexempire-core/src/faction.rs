//! Factions (parties) and their per-refresh aggregates

use crate::board::CellId;
use crate::units::UnitId;
use serde::{Deserialize, Serialize};

/// Faction index into `Board::factions`
pub type FactionId = u8;

/// Default morale of a faction that fields no armies
pub const EMPTY_FACTION_MORALE: i32 = 10;

/// Who issues commands for a faction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    Human,
    Computer,
}

/// A competing faction
///
/// Everything below `capital` is derived state, rebuilt by
/// [`crate::engine::refresh_board`] and [`crate::engine::update_faction_statuses`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Faction {
    pub id: FactionId,
    pub name: String,
    pub control: Control,
    /// Founding capital; the cell never changes, its owner may
    pub capital: CellId,
    /// 0 eliminated, 1 alive, 1+N after conquering N depopulated capitals
    pub status: u8,
    pub conquered_capitals: Vec<FactionId>,
    pub morale: i32,
    pub units: Vec<UnitId>,
    pub total_strength: i32,
    pub total_power: i32,
    pub towns: Vec<CellId>,
    pub ports: Vec<CellId>,
    pub lands: Vec<CellId>,
}

impl Faction {
    pub fn new(id: FactionId, name: impl Into<String>, capital: CellId, control: Control) -> Self {
        Self {
            id,
            name: name.into(),
            control,
            capital,
            status: 1,
            conquered_capitals: Vec::new(),
            morale: EMPTY_FACTION_MORALE,
            units: Vec::new(),
            total_strength: 0,
            total_power: 0,
            towns: Vec::new(),
            ports: Vec::new(),
            lands: Vec::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status > 0
    }

    pub fn is_human(&self) -> bool {
        self.control == Control::Human
    }

    /// Strength plus average morale, the figure posture decisions compare
    pub fn posture_power(&self) -> i32 {
        self.total_strength + self.morale
    }
}
