//! Armies and their strength/morale bookkeeping

use crate::board::CellId;
use crate::faction::FactionId;
use serde::{Deserialize, Serialize};

/// Upper bound on the soldiers a single army can hold
pub const MAX_STRENGTH: i32 = 99;

/// Stable army identifier, never reused within a game
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u32);

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An army standing on the map
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub faction: FactionId,
    /// Soldier count, kept within [0, MAX_STRENGTH]
    pub strength: i32,
    /// Kept within [0, strength]
    pub morale: i32,
    pub has_moved: bool,
    /// Logically dead: invisible to every simulation query until purged
    pub removed: bool,
    /// Back-reference to the occupied cell, cleared together with the cell's link
    pub(crate) cell: Option<CellId>,
}

impl Unit {
    pub fn new(id: UnitId, faction: FactionId, strength: i32, morale: i32) -> Self {
        let strength = strength.clamp(0, MAX_STRENGTH);
        Self {
            id,
            faction,
            strength,
            morale: morale.clamp(0, strength),
            has_moved: false,
            removed: false,
            cell: None,
        }
    }

    /// Combat power: strength plus morale
    pub fn power(&self) -> i32 {
        self.strength + self.morale
    }

    pub fn cell(&self) -> Option<CellId> {
        self.cell
    }

    /// Re-clamp morale after strength changes
    pub fn clamp_morale(&mut self) {
        self.morale = self.morale.clamp(0, self.strength);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_unit_clamps() {
        let unit = Unit::new(UnitId(1), 0, 150, 200);
        assert_eq!(unit.strength, MAX_STRENGTH);
        assert_eq!(unit.morale, MAX_STRENGTH);

        let unit = Unit::new(UnitId(2), 0, 10, -4);
        assert_eq!(unit.morale, 0);
    }

    #[test]
    fn test_power() {
        let unit = Unit::new(UnitId(1), 0, 50, 10);
        assert_eq!(unit.power(), 60);
    }

    #[test]
    fn test_unit_id_serializes_as_number() {
        let json = serde_json::to_string(&UnitId(7)).unwrap();
        assert_eq!(json, "7");
    }
}
