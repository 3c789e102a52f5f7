//! Heuristic weights and per-game AI helper precomputation

use crate::board::{Board, CellId};
use crate::faction::FactionId;
use crate::pathfinder::{find_path, reachable_cells};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Heuristic weights for move scoring
///
/// Loadable from JSON; any field missing from the file keeps its default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiWeights {
    /// Floor of the route-to-capital baseline
    pub capital_threat: i32,
    pub take_capital: i32,
    pub threat_capital: i32,
    pub threat_town: i32,
    pub threat_port: i32,
    /// Land within two hexes of a town
    pub threat_near_town: i32,

    // Combat
    pub combat_siege: i32,
    pub combat_sacrifice: i32,
    pub combat_desperate: i32,
    pub combat_risky_objective: i32,
    pub combat_risky: i32,
    pub combat_win: i32,
    /// Extra for beating an army on a cell not owned by a human
    pub combat_win_enemy: i32,
    pub take_town: i32,
    pub take_port: i32,
    /// Losing attack on the remembered threat while in survival posture
    pub threat_last_stand: i32,
    pub threat_risky: i32,
    pub threat_kill: i32,
    /// Any fight on a cell near our own capital
    pub near_own_capital: i32,

    // Positioning
    pub join_army: i32,
    pub station_capital: i32,
    pub capital_leave_penalty: i32,

    // Posture shaping
    pub survival_approach: i32,
    pub mode_survival_dist: i32,
    pub mode_expansion_land: i32,
    pub mode_aggression_army: i32,

    // Frontline
    pub frontline_safe_penalty: i32,
    pub frontline_move_bonus: i32,
    pub frontline_move: i32,

    // Strategy and coordination
    pub strategic_bonus: i32,
    pub strategic_safe_bonus: i32,
    pub strategic_threat: i32,
    pub group_attack_order: i32,
    pub group_attack_boost: i32,
}

impl Default for AiWeights {
    fn default() -> Self {
        Self {
            capital_threat: -100,
            take_capital: 1000,
            threat_capital: 300,
            threat_town: 150,
            threat_port: 80,
            threat_near_town: 20,

            combat_siege: 100,
            combat_sacrifice: 150,
            combat_desperate: -1000,
            combat_risky_objective: 50,
            combat_risky: -50,
            combat_win: 200,
            combat_win_enemy: 50,
            take_town: 150,
            take_port: 80,
            threat_last_stand: 2000,
            threat_risky: 5000,
            threat_kill: 10000,
            near_own_capital: 1000,

            join_army: 60,
            station_capital: 300,
            capital_leave_penalty: -300,

            survival_approach: 500,
            mode_survival_dist: 20,
            mode_expansion_land: 40,
            mode_aggression_army: 80,

            frontline_safe_penalty: -60,
            frontline_move_bonus: 40,
            frontline_move: 10,

            strategic_bonus: 80,
            strategic_safe_bonus: 60,
            strategic_threat: 10000,
            group_attack_order: 2500,
            group_attack_boost: 200,
        }
    }
}

impl AiWeights {
    /// Load from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

struct CellHelpers {
    profitability: Vec<Option<i32>>,
    near_capital: Vec<bool>,
    near_town: bool,
}

/// Fill every cell's route-to-capital score and proximity flags
///
/// Runs once at game start. Cells are scored in parallel and written back
/// in index order.
pub fn compute_ai_helpers(board: &mut Board) {
    let capitals: Vec<(FactionId, CellId)> = board.factions.iter().map(|f| (f.id, f.capital)).collect();

    let helpers: Vec<CellHelpers> = {
        let board: &Board = board;
        board
            .cell_ids()
            .into_par_iter()
            .map(|cell| {
                let surroundings: Vec<CellId> = reachable_cells(board, cell)
                    .into_iter()
                    .chain(std::iter::once(cell))
                    .collect();

                // Proximity only counts toward capitals this cell has a route to
                let mut profitability = Vec::with_capacity(capitals.len());
                let mut near_capital = Vec::with_capacity(capitals.len());
                let mut near_town = false;
                for &(faction, capital) in &capitals {
                    let Some(path) = find_path(board, cell, capital, &[], true) else {
                        profitability.push(None);
                        near_capital.push(false);
                        continue;
                    };
                    profitability.push(Some(-(path.len() as i32)));
                    near_capital.push(surroundings.iter().any(|&n| board.cell(n).capital_of == Some(faction)));
                    near_town |= surroundings.iter().any(|&n| board.cell(n).is_town());
                }

                CellHelpers { profitability, near_capital, near_town }
            })
            .collect()
    };

    for (id, helper) in helpers.into_iter().enumerate() {
        let cell = board.cell_mut(id);
        cell.profitability = helper.profitability;
        cell.near_capital = helper.near_capital;
        cell.near_town = helper.near_town;
    }

    info!(cells = board.cells().len(), factions = capitals.len(), "AI helpers computed");
}
