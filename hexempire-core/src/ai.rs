//! Heuristic move scoring for computer-controlled factions
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: Bot::evaluate_units() - one scoring pass over a faction's movable armies
//! - Level 2: Bot::assess() posture, Bot::best_move() per army
//! - Level 3: Bot::final_profitability() per destination, strategic routing
//! - Level 4: safety and support helpers
//!
//! Posture, the remembered threat and coordinated attack orders live in an
//! [`AiContext`] that is rebuilt for every pass, so the bot itself is stateless.

use crate::board::{Board, CellId};
use crate::eval::AiWeights;
use crate::faction::FactionId;
use crate::pathfinder::{find_path, possible_moves};
use crate::units::{Unit, UnitId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Armies stronger than this near the capital count as a threat
const THREAT_STRENGTH: i32 = 15;
/// Radius around the capital watched for threats
const THREAT_RADIUS: i32 = 5;
/// Attackers above this strength may siege towns and capitals at a loss
const SIEGE_STRENGTH: i32 = 40;
/// Joining only pays while the target is below this strength
const JOIN_LIMIT: i32 = 70;
/// Early turns in which a capital garrison is encouraged
const EARLY_TURNS: u32 = 5;
/// Below this strength a far-away army approaches greedily
const GREEDY_STRENGTH: i32 = 10;
const GREEDY_DISTANCE: i32 = 5;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Faction-level strategic stance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    Expansion,
    Aggression,
    Survival,
}

/// Configuration for the computer opponent
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AiConfig {
    pub weights: AiWeights,
    /// Raises the appeal of marching on human capitals
    pub difficulty: i32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            weights: AiWeights::default(),
            difficulty: 1,
        }
    }
}

impl AiConfig {
    pub fn with_weights(mut self, weights: AiWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_difficulty(mut self, difficulty: i32) -> Self {
        self.difficulty = difficulty;
        self
    }
}

// ============================================================================
// PASS STATE
// ============================================================================

/// A move an army was told to make in support of another
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Order {
    pub target: CellId,
    pub profitability: i32,
}

/// State of one scoring pass
#[derive(Clone, Debug)]
pub struct AiContext {
    pub faction: FactionId,
    pub posture: Posture,
    /// Enemy army endangering our capital
    pub threat: Option<UnitId>,
    pub orders: FxHashMap<UnitId, Order>,
}

impl AiContext {
    fn threat_cell(&self, board: &Board) -> Option<CellId> {
        self.threat.and_then(|id| board.unit(id)).and_then(|u| u.cell())
    }
}

/// Best move found for one army
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub unit: UnitId,
    pub from: CellId,
    pub dest: CellId,
    pub profitability: i32,
    /// Strength plus morale, the tie-breaker between equal scores
    pub power: i32,
}

/// Result of [`Bot::evaluate_units`]
#[derive(Clone, Debug)]
pub struct Evaluation {
    pub context: AiContext,
    pub candidates: Vec<Candidate>,
}

impl Evaluation {
    /// Highest profitability, then highest power; earlier candidates win ties
    pub fn best(&self) -> Option<Candidate> {
        let mut ranked = self.candidates.clone();
        ranked.sort_by(|a, b| {
            b.profitability
                .cmp(&a.profitability)
                .then(b.power.cmp(&a.power))
        });
        ranked.first().copied()
    }
}

// ============================================================================
// BOT
// ============================================================================

/// Stateless heuristic player
#[derive(Clone, Debug, Default)]
pub struct Bot {
    pub config: AiConfig,
}

impl Bot {
    pub fn new(config: AiConfig) -> Self {
        Self { config }
    }

    // ------------------------------------------------------------------------
    // Level 2: posture
    // ------------------------------------------------------------------------

    /// Pick the faction's posture and remember any threat to its capital
    pub fn assess(&self, board: &Board, faction: FactionId) -> AiContext {
        let mut context = AiContext {
            faction,
            posture: Posture::Expansion,
            threat: None,
            orders: FxHashMap::default(),
        };
        let me = board.faction(faction);
        let capital = me.capital;

        let adjacent = board
            .cell(capital)
            .neighbor_ids()
            .filter_map(|n| board.unit_at(n))
            .find(|u| u.faction != faction);
        if let Some(enemy) = adjacent {
            context.threat = Some(enemy.id);
            context.posture = Posture::Survival;
            return context;
        }

        let mut closest = i32::MAX;
        for enemy in board.active_units().filter(|u| u.faction != faction) {
            let Some(cell) = enemy.cell() else { continue };
            let d = board.distance(cell, capital);
            if d <= THREAT_RADIUS && enemy.strength > THREAT_STRENGTH && d < closest {
                closest = d;
                context.threat = Some(enemy.id);
            }
        }
        if context.threat.is_some() {
            context.posture = Posture::Survival;
            return context;
        }

        let strongest_rival = board
            .alive_factions()
            .filter(|f| f.id != faction)
            .map(|f| f.posture_power())
            .max()
            .unwrap_or(0)
            .max(0);
        let mine = me.posture_power();

        context.posture = if mine * 2 > strongest_rival * 3 {
            Posture::Aggression
        } else if me.towns.len() < 3 {
            Posture::Expansion
        } else {
            Posture::Aggression
        };
        context
    }

    // ------------------------------------------------------------------------
    // Level 1: scoring pass
    // ------------------------------------------------------------------------

    /// Score every movable army of `faction`, largest first
    pub fn evaluate_units(&self, board: &Board, faction: FactionId) -> Evaluation {
        let w = &self.config.weights;
        let mut context = self.assess(board, faction);

        let mut movable: Vec<&Unit> = board
            .active_units()
            .filter(|u| u.faction == faction && !u.has_moved && u.cell().is_some())
            .collect();
        movable.sort_by(|a, b| b.strength.cmp(&a.strength));

        let mut candidates = Vec::new();
        for unit in movable {
            let Some(from) = unit.cell() else { continue };
            let Some((dest, mut profitability)) = self.best_move(board, &mut context, unit, from) else {
                continue;
            };

            let target = board.unit_at(dest);
            if let Some(enemy) = target.filter(|t| t.faction != faction) {
                let support = unmoved_neighbors(board, unit, from);
                if !support.is_empty() && unit.strength < enemy.strength {
                    order_group_attack(board, &mut context, &support, dest, w.group_attack_order);
                    profitability += w.group_attack_boost;
                }
            }

            let attacking_threat = target.is_some_and(|t| Some(t.id) == context.threat);
            if board.cell(from).capital_of == Some(faction)
                && board.turn_number > EARLY_TURNS
                && !attacking_threat
            {
                profitability += w.capital_leave_penalty;
            }

            debug!(
                unit = %unit.id,
                from = %board.hex_of(from),
                dest = %board.hex_of(dest),
                profitability,
                posture = ?context.posture,
                "candidate"
            );
            candidates.push(Candidate {
                unit: unit.id,
                from,
                dest,
                profitability,
                power: unit.power(),
            });
        }

        Evaluation { context, candidates }
    }

    /// Best destination and score for one army
    pub fn best_move(&self, board: &Board, context: &mut AiContext, unit: &Unit, from: CellId) -> Option<(CellId, i32)> {
        let w = &self.config.weights;
        let moves = possible_moves(board, from, true, false);

        if let Some(order) = context.orders.get(&unit.id).copied() {
            if moves.contains(&order.target) {
                return Some((order.target, order.profitability));
            }
        }

        let mut scored: Vec<(CellId, i32)> = moves
            .iter()
            .map(|&dest| (dest, self.final_profitability(board, context, unit, from, dest)))
            .collect();

        if let Some(step) = self.strategic_step(board, context, unit, from) {
            let mut bonus = w.strategic_bonus;
            if is_safe(board, from, context.faction) {
                bonus += w.strategic_safe_bonus;
            }
            if context.threat_cell(board) == Some(step) {
                bonus += w.strategic_threat;
            }
            if let Some(entry) = scored.iter_mut().find(|(dest, _)| *dest == step) {
                entry.1 += bonus;
            }
        }

        let mut best: Option<(CellId, i32)> = None;
        for (dest, score) in scored {
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((dest, score));
            }
        }
        best
    }

    // ------------------------------------------------------------------------
    // Level 3: destination scoring
    // ------------------------------------------------------------------------

    /// Score moving `unit` from `from` to `dest`
    ///
    /// May hand out a follow-up order to a friendly army when the move is a
    /// sacrificial attack.
    pub fn final_profitability(
        &self,
        board: &Board,
        context: &mut AiContext,
        unit: &Unit,
        from: CellId,
        dest: CellId,
    ) -> i32 {
        let w = &self.config.weights;
        let me = context.faction;
        let cell = board.cell(dest);
        let occupant = board.unit_at(dest);

        // Route-to-capital baseline toward the most exposed intact rival capital
        let mut total = w.capital_threat;
        for rival in board.factions.iter().filter(|f| f.id != me) {
            if !board.cell(rival.capital).is_intact_capital() {
                continue;
            }
            if let Some(Some(route)) = cell.profitability.get(rival.id as usize) {
                let mut score = *route;
                if rival.is_human() {
                    score += self.config.difficulty * 2;
                }
                total = total.max(score);
            }
        }

        // Objectives
        if cell.is_land() && cell.owner != Some(me) {
            let defence = occupant.map_or(0, |u| u.power());
            if cell.is_intact_capital() && unit.power() > defence {
                total += w.take_capital;
            } else if cell.is_capital() {
                total += w.threat_capital;
            } else if cell.is_town() {
                total += w.threat_town;
            } else if cell.is_port() {
                total += w.threat_port;
            } else if cell.near_town {
                total += w.threat_near_town;
            }
        }

        // Combat
        if let Some(enemy) = occupant.filter(|u| u.faction != me) {
            let mine = unit.power();
            let theirs = enemy.power();
            let is_threat = context.threat == Some(enemy.id);

            let mut suicidal = mine < theirs;
            if suicidal && cell.is_static_target() && unit.strength > SIEGE_STRENGTH {
                suicidal = false;
                total += w.combat_siege;
            }

            if suicidal {
                let remaining = enemy.strength - (mine * enemy.strength) / theirs.max(1) + enemy.morale;
                let support = cell
                    .neighbor_ids()
                    .filter_map(|n| board.unit_at(n))
                    .find(|f| f.faction == me && f.id != unit.id && f.power() * 5 > remaining * 6);

                if is_threat && context.posture == Posture::Survival {
                    total += w.threat_last_stand;
                } else if let Some(friend) = support {
                    total += w.combat_sacrifice;
                    order_group_attack(board, context, &[friend.id], dest, w.group_attack_order);
                } else {
                    total += w.combat_desperate;
                }
            } else if mine * 5 < theirs * 6 {
                if is_threat {
                    total += w.threat_risky;
                } else if cell.is_static_target() {
                    total += w.combat_risky_objective;
                } else {
                    total += w.combat_risky;
                }
            } else {
                total += w.combat_win;
                if is_threat {
                    total += w.threat_kill;
                }
                let human_owned = cell.owner.is_some_and(|o| board.faction(o).is_human());
                if !human_owned {
                    total += w.combat_win_enemy;
                }
                if cell.is_town() {
                    total += w.take_town;
                } else if cell.is_port() {
                    total += w.take_port;
                }
            }

            if cell.near_capital.get(me as usize).copied().unwrap_or(false) {
                total += w.near_own_capital;
            }
        }

        // Reinforcing a bigger friendly army
        if let Some(friend) = occupant.filter(|u| u.faction == me) {
            if friend.strength > unit.strength && friend.strength < JOIN_LIMIT {
                total += w.join_army;
            }
        }

        if board.cell(from).capital_of == Some(me) && occupant.is_none() && board.turn_number < EARLY_TURNS {
            total += w.station_capital;
        }

        // Posture shaping
        match context.posture {
            Posture::Survival => {
                let approaching = context
                    .threat_cell(board)
                    .is_some_and(|t| board.distance(dest, t) < board.distance(from, t));
                if approaching {
                    total += w.survival_approach;
                } else {
                    let capital = board.faction(me).capital;
                    total -= board.distance(dest, capital) * w.mode_survival_dist;
                }
            }
            Posture::Expansion => {
                if cell.is_land() && cell.owner != Some(me) && occupant.is_none() {
                    total += w.mode_expansion_land;
                }
            }
            Posture::Aggression => {
                if occupant.is_some_and(|u| u.faction != me) {
                    total += w.mode_aggression_army;
                }
            }
        }

        // Frontline shaping
        if is_safe(board, from, me) {
            if is_safe(board, dest, me) {
                total += w.frontline_safe_penalty;
            } else {
                total += w.frontline_move_bonus;
            }
        } else if !is_safe(board, dest, me) {
            total += w.frontline_move;
        }

        total
    }

    // ------------------------------------------------------------------------
    // Level 3: strategic routing
    // ------------------------------------------------------------------------

    /// Next hex toward the army's strategic objective
    fn strategic_step(&self, board: &Board, context: &AiContext, unit: &Unit, from: CellId) -> Option<CellId> {
        if context.posture == Posture::Survival {
            if let Some(threat) = context.threat_cell(board) {
                return next_step_towards(board, unit, from, threat);
            }
        }

        let me = context.faction;
        let rival_capitals = board
            .alive_factions()
            .filter(|f| f.id != me)
            .map(|f| f.capital);
        let holdings = board.cell_ids().filter(|&c| {
            let cell = board.cell(c);
            (cell.is_town() || cell.is_port()) && cell.owner != Some(me)
        });

        let mut target = None;
        let mut nearest = i32::MAX;
        for candidate in rival_capitals.chain(holdings) {
            let d = board.distance(from, candidate);
            if d < nearest {
                nearest = d;
                target = Some(candidate);
            }
        }
        next_step_towards(board, unit, from, target?)
    }
}

// ============================================================================
// LEVEL 4: HELPERS
// ============================================================================

/// First hex on the way from `from` to `target`
///
/// Small armies far from the target approach greedily; others route over
/// land first and fall back to a water route.
fn next_step_towards(board: &Board, unit: &Unit, from: CellId, target: CellId) -> Option<CellId> {
    if unit.strength < GREEDY_STRENGTH && board.distance(from, target) > GREEDY_DISTANCE {
        let mut best = None;
        let mut nearest = i32::MAX;
        for n in board.cell(from).neighbor_ids() {
            let d = board.distance(n, target);
            if d < nearest {
                nearest = d;
                best = Some(n);
            }
        }
        return best;
    }

    let origin = board.cell(from);
    let avoid_water = !(origin.is_water() || origin.is_port());
    let path = find_path(board, from, target, &[], avoid_water)
        .or_else(|| avoid_water.then(|| find_path(board, from, target, &[], false)).flatten())?;
    path.get(1).copied()
}

/// Every neighbor of `cell` is owned by `faction` (off-map counts as safe)
fn is_safe(board: &Board, cell: CellId, faction: FactionId) -> bool {
    board
        .cell(cell)
        .neighbor_ids()
        .all(|n| board.cell(n).owner == Some(faction))
}

/// Friendly armies next to `from` that have not moved yet
fn unmoved_neighbors(board: &Board, unit: &Unit, from: CellId) -> Vec<UnitId> {
    board
        .cell(from)
        .neighbor_ids()
        .filter_map(|n| board.unit_at(n))
        .filter(|f| f.faction == unit.faction && !f.has_moved && f.id != unit.id)
        .map(|f| f.id)
        .collect()
}

/// Order supporters adjacent to `target` to attack it next
fn order_group_attack(board: &Board, context: &mut AiContext, supporters: &[UnitId], target: CellId, profitability: i32) {
    for &id in supporters {
        let Some(cell) = board.unit(id).and_then(|u| u.cell()) else { continue };
        let adjacent = board.cell(cell).neighbor_ids().any(|n| n == target);
        if adjacent && possible_moves(board, cell, true, false).contains(&target) {
            context.orders.insert(id, Order { target, profitability });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Estate, Hex};
    use crate::engine::refresh_board;
    use crate::eval::compute_ai_helpers;
    use crate::faction::Control;

    fn id(board: &Board, x: i32, y: i32) -> CellId {
        board.cell_id(Hex::new(x, y)).unwrap()
    }

    /// 10x10 land board: Red capital at (1,1), Blue capital at (8,8)
    fn duel_board() -> Board {
        let mut board = Board::new(10, 10);
        let red = id(&board, 1, 1);
        let blue = id(&board, 8, 8);
        board.add_faction("Red", red, Control::Computer);
        board.add_faction("Blue", blue, Control::Computer);
        board
    }

    #[test]
    fn test_adjacent_enemy_triggers_survival() {
        let mut board = duel_board();
        let intruder = board.spawn_unit(id(&board, 2, 1), 1, 5, 0);
        refresh_board(&mut board);

        let context = Bot::default().assess(&board, 0);
        assert_eq!(context.posture, Posture::Survival);
        assert_eq!(context.threat, Some(intruder));
    }

    #[test]
    fn test_nearby_strong_enemy_triggers_survival() {
        let mut board = duel_board();
        board.spawn_unit(id(&board, 6, 1), 1, 10, 0);
        let strong = board.spawn_unit(id(&board, 4, 3), 1, 30, 0);
        refresh_board(&mut board);

        let context = Bot::default().assess(&board, 0);
        assert_eq!(context.posture, Posture::Survival);
        assert_eq!(context.threat, Some(strong));
    }

    #[test]
    fn test_dominant_faction_turns_aggressive() {
        let mut board = duel_board();
        board.spawn_unit(id(&board, 1, 2), 0, 90, 40);
        board.spawn_unit(id(&board, 8, 7), 1, 10, 5);
        refresh_board(&mut board);

        let bot = Bot::default();
        assert_eq!(bot.assess(&board, 0).posture, Posture::Aggression);
        // Weaker with a single town: expand
        assert_eq!(bot.assess(&board, 1).posture, Posture::Expansion);
    }

    #[test]
    fn test_evaluation_covers_movable_units() {
        let mut board = duel_board();
        let big = board.spawn_unit(id(&board, 1, 2), 0, 40, 10);
        let small = board.spawn_unit(id(&board, 2, 2), 0, 10, 5);
        let moved = board.spawn_unit(id(&board, 0, 2), 0, 20, 5);
        board.unit_mut(moved).unwrap().has_moved = true;
        refresh_board(&mut board);
        compute_ai_helpers(&mut board);

        let evaluation = Bot::default().evaluate_units(&board, 0);
        let units: Vec<UnitId> = evaluation.candidates.iter().map(|c| c.unit).collect();
        assert_eq!(units, vec![big, small]);
        for candidate in &evaluation.candidates {
            let moves = possible_moves(&board, candidate.from, true, false);
            assert!(moves.contains(&candidate.dest));
        }
        assert!(evaluation.best().is_some());
    }

    #[test]
    fn test_prefers_winning_attack_on_town() {
        let mut board = duel_board();
        let town = id(&board, 4, 4);
        board.set_estate(town, Some(Estate::Town));
        board.set_owner(town, Some(1));
        let attacker = board.spawn_unit(id(&board, 4, 5), 0, 60, 30);
        board.spawn_unit(town, 1, 10, 2);
        refresh_board(&mut board);
        compute_ai_helpers(&mut board);

        let evaluation = Bot::default().evaluate_units(&board, 0);
        let best = evaluation.best().unwrap();
        assert_eq!(best.unit, attacker);
        assert_eq!(best.dest, town);
    }

    #[test]
    fn test_avoids_desperate_attack() {
        let mut board = duel_board();
        // Far enough from Red's capital not to count as a threat
        let from = id(&board, 6, 7);
        let strong_enemy = id(&board, 6, 6);
        board.spawn_unit(from, 0, 10, 0);
        board.spawn_unit(strong_enemy, 1, 90, 50);
        refresh_board(&mut board);
        compute_ai_helpers(&mut board);

        let evaluation = Bot::default().evaluate_units(&board, 0);
        let best = evaluation.best().unwrap();
        assert_ne!(best.dest, strong_enemy);
    }

    #[test]
    fn test_sacrifice_orders_follow_up() {
        let mut board = duel_board();
        let target = id(&board, 5, 5);
        board.spawn_unit(target, 1, 50, 10);
        // Mover is weaker than the defender; the friend could finish it off
        let mover = board.spawn_unit(id(&board, 5, 6), 0, 35, 10);
        let friend = board.spawn_unit(id(&board, 4, 5), 0, 30, 10);
        refresh_board(&mut board);
        compute_ai_helpers(&mut board);

        let bot = Bot::default();
        let mut context = bot.assess(&board, 0);
        let unit = board.unit(mover).unwrap().clone();
        let from = unit.cell().unwrap();
        bot.final_profitability(&board, &mut context, &unit, from, target);
        assert_eq!(
            context.orders.get(&friend),
            Some(&Order { target, profitability: bot.config.weights.group_attack_order })
        );
    }

    #[test]
    fn test_strategic_step_heads_for_target() {
        let mut board = duel_board();
        let from = id(&board, 3, 3);
        let unit = board.spawn_unit(from, 0, 30, 5);
        let town = id(&board, 6, 3);
        board.set_estate(town, Some(Estate::Town));
        refresh_board(&mut board);

        let bot = Bot::default();
        let context = bot.assess(&board, 0);
        let unit = board.unit(unit).unwrap().clone();
        let step = bot.strategic_step(&board, &context, &unit, from).unwrap();
        assert_eq!(board.distance(from, step), 1);
        assert!(board.distance(step, town) < board.distance(from, town));
    }
}
