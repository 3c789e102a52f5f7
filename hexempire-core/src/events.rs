//! Simulation events
//!
//! Every state change the engine makes is reported as an [`Event`]. The
//! serialized shape (tag `type`, camelCase fields) is what presentation
//! layers and remote peers replay.

use crate::board::Hex;
use crate::faction::FactionId;
use crate::units::UnitId;
use serde::{Deserialize, Serialize};

/// Cell reference in event payloads
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    pub x: i32,
    pub y: i32,
}

impl From<Hex> for FieldRef {
    fn from(hex: Hex) -> Self {
        Self { x: hex.x, y: hex.y }
    }
}

impl From<FieldRef> for Hex {
    fn from(field: FieldRef) -> Self {
        Hex::new(field.x, field.y)
    }
}

/// One side of a battle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatSide {
    pub id: UnitId,
    pub party: FactionId,
    pub initial_count: i32,
    pub initial_morale: i32,
    pub final_count: i32,
    pub final_morale: i32,
    /// Non-zero only for the winner
    pub losses: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovingArmy {
    pub id: UnitId,
    pub count: i32,
    pub morale: i32,
    /// Soldiers left with the mover when the merge overflowed
    pub remainder: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetArmy {
    pub id: UnitId,
    pub initial_count: i32,
    pub initial_morale: i32,
    pub final_count: i32,
    pub final_morale: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoraleChange {
    pub id: UnitId,
    pub morale: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Combat {
        attacker: CombatSide,
        defender: CombatSide,
        winner: UnitId,
        loser: UnitId,
    },
    #[serde(rename_all = "camelCase")]
    Join {
        moving_army: MovingArmy,
        target_army: TargetArmy,
    },
    #[serde(rename_all = "camelCase")]
    Annex {
        field: FieldRef,
        old_party: Option<FactionId>,
        new_party: FactionId,
    },
    MoraleUpdate {
        updates: Vec<MoraleChange>,
    },
    #[serde(rename_all = "camelCase")]
    Spawn {
        field: FieldRef,
        party: FactionId,
        army_id: UnitId,
        new_count: i32,
        new_morale: i32,
        is_new: bool,
    },
    #[serde(rename_all = "camelCase")]
    LandTransfer {
        field: FieldRef,
        old_party: FactionId,
        new_party: FactionId,
    },
    #[serde(rename_all = "camelCase")]
    ArmyDisbanded {
        army_id: UnitId,
        party: FactionId,
        field: Option<FieldRef>,
    },
}

impl Event {
    /// Wire tag of the event
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Combat { .. } => "combat",
            Event::Join { .. } => "join",
            Event::Annex { .. } => "annex",
            Event::MoraleUpdate { .. } => "morale_update",
            Event::Spawn { .. } => "spawn",
            Event::LandTransfer { .. } => "land_transfer",
            Event::ArmyDisbanded { .. } => "army_disbanded",
        }
    }
}
