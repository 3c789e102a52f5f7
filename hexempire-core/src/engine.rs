//! Move resolution, annexation, spawning and faction bookkeeping
//!
//! Every function takes the board explicitly and returns the events it
//! produced, in the order a replaying peer must apply them.
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: execute_move(), spawn_units(), cleanup_turn(), refresh_board()
//! - Level 2: attack(), join(), annex(), update_faction_statuses()
//! - Level 3: add_morale_for_all(), add_units_to_cell(), transfer_dead_faction_lands()
//! - Level 4: pure rules (see `rules`)

use crate::board::{Board, CellId};
use crate::error::EngineError;
use crate::events::{CombatSide, Event, FieldRef, MoraleChange, MovingArmy, TargetArmy};
use crate::faction::{FactionId, EMPTY_FACTION_MORALE};
use crate::rules::{self, Force, Side};
use crate::units::UnitId;
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::debug;

/// Outcome of a single move command
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResult {
    pub army_id: UnitId,
    pub from_field: FieldRef,
    pub to_field: FieldRef,
    pub events: Vec<Event>,
}

fn field(board: &Board, cell: CellId) -> FieldRef {
    board.hex_of(cell).into()
}

fn force_of(board: &Board, unit: UnitId) -> Force {
    board
        .unit(unit)
        .map(|u| Force::new(u.strength, u.morale))
        .unwrap_or(Force::new(0, 0))
}

// ============================================================================
// LEVEL 1: MOVES
// ============================================================================

/// Move the army on `from` to `to`, fighting or joining as needed
///
/// Fails without touching the board when either cell is off the map or
/// `from` is empty.
pub fn execute_move(board: &mut Board, from: CellId, to: CellId) -> Result<MoveResult, EngineError> {
    if let Some(&bad) = [from, to].iter().find(|&&c| c >= board.cells().len()) {
        return Err(EngineError::UnknownCell(bad));
    }
    let Some(unit_id) = board.cell(from).unit() else {
        return Err(EngineError::NoUnitAtSource(board.hex_of(from)));
    };

    board.detach_unit(unit_id);
    let faction = match board.unit_mut(unit_id) {
        Some(unit) => {
            unit.has_moved = true;
            unit.faction
        }
        None => return Err(EngineError::NoUnitAtSource(board.hex_of(from))),
    };

    let mut events = Vec::new();
    match board.unit_at(to).map(|u| (u.id, u.faction)) {
        Some((defender, other)) if other != faction => {
            let (mut combat, attacker_won) = attack(board, unit_id, defender)?;
            events.append(&mut combat);
            if attacker_won {
                board.place_unit(unit_id, to);
                events.extend(annex(board, faction, to));
            }
        }
        Some((target, _)) => {
            events.extend(join(board, unit_id, target, from));
            if let Some(unit) = board.unit_mut(target) {
                unit.has_moved = true;
            }
            events.extend(annex(board, faction, to));
        }
        None => {
            board.place_unit(unit_id, to);
            events.extend(annex(board, faction, to));
        }
    }

    debug!(
        unit = %unit_id,
        from = %board.hex_of(from),
        to = %board.hex_of(to),
        events = events.len(),
        "move resolved"
    );

    Ok(MoveResult {
        army_id: unit_id,
        from_field: field(board, from),
        to_field: field(board, to),
        events,
    })
}

// ============================================================================
// LEVEL 2: COMBAT AND JOIN
// ============================================================================

/// Fight a battle; returns the events and whether the attacker won
///
/// The loser is removed and its faction pays the defeat penalty. Both armies
/// must still be on the army table.
pub fn attack(board: &mut Board, attacker: UnitId, defender: UnitId) -> Result<(Vec<Event>, bool), EngineError> {
    let att_faction = board.unit(attacker).ok_or(EngineError::MissingArmy(attacker))?.faction;
    let def_faction = board.unit(defender).ok_or(EngineError::MissingArmy(defender))?.faction;
    let att = force_of(board, attacker);
    let def = force_of(board, defender);

    let outcome = rules::resolve_combat(att, def);
    let attacker_won = outcome.winner == Side::Attacker;

    let side = |id, party, before: Force, won: bool| CombatSide {
        id,
        party,
        initial_count: before.strength,
        initial_morale: before.morale,
        final_count: if won { outcome.survivor.strength } else { before.strength },
        final_morale: if won { outcome.survivor.morale } else { before.morale },
        losses: if won { outcome.losses } else { 0 },
    };
    let combat = Event::Combat {
        attacker: side(attacker, att_faction, att, attacker_won),
        defender: side(defender, def_faction, def, !attacker_won),
        winner: if attacker_won { attacker } else { defender },
        loser: if attacker_won { defender } else { attacker },
    };

    let (winner, loser, loser_faction, loser_strength) = if attacker_won {
        (attacker, defender, def_faction, def.strength)
    } else {
        (defender, attacker, att_faction, att.strength)
    };

    if let Some(unit) = board.unit_mut(winner) {
        unit.strength = outcome.survivor.strength;
        unit.morale = outcome.survivor.morale;
    }
    board.remove_unit(loser);

    debug!(%attacker, %defender, attacker_won, losses = outcome.losses, "combat");

    let mut events = vec![combat];
    if let Some(update) = add_morale_for_all(board, rules::defeat_penalty(loser_strength), loser_faction) {
        events.push(update);
    }
    Ok((events, attacker_won))
}

/// Merge `moving` into `target`
///
/// Overflow stays with the mover, which returns to `origin` still marked as
/// moved. Otherwise the mover is removed.
pub fn join(board: &mut Board, moving: UnitId, target: UnitId, origin: CellId) -> Vec<Event> {
    let mover = force_of(board, moving);
    let stationary = force_of(board, target);
    let outcome = rules::resolve_join(mover, stationary);

    if let Some(unit) = board.unit_mut(target) {
        unit.strength = outcome.merged.strength;
        unit.morale = outcome.merged.morale;
    }

    if outcome.remainder > 0 {
        if let Some(unit) = board.unit_mut(moving) {
            unit.strength = outcome.remainder;
            unit.clamp_morale();
        }
        board.place_unit(moving, origin);
    } else {
        board.remove_unit(moving);
    }

    vec![Event::Join {
        moving_army: MovingArmy {
            id: moving,
            count: mover.strength,
            morale: mover.morale,
            remainder: outcome.remainder,
        },
        target_army: TargetArmy {
            id: target,
            initial_count: stationary.strength,
            initial_morale: stationary.morale,
            final_count: outcome.merged.strength,
            final_morale: outcome.merged.morale,
        },
    }]
}

// ============================================================================
// LEVEL 2: ANNEXATION
// ============================================================================

/// Claim a land cell for `faction` and flood into empty plain land around it
///
/// Water is never annexed. The root annex event always comes first.
pub fn annex(board: &mut Board, faction: FactionId, cell: CellId) -> Vec<Event> {
    if !board.cell(cell).is_land() {
        return Vec::new();
    }

    let mut events = Vec::new();
    let old_owner = board.cell(cell).owner;

    if let Some(old) = old_owner.filter(|&old| old != faction) {
        let lost = rules::morale_lost(board.cell(cell));
        if let Some(update) = add_morale_for_all(board, lost, old) {
            events.push(update);
        }
    }

    if old_owner != Some(faction) {
        let (faction_bonus, unit_bonus) = rules::morale_earned(board.cell(cell));
        if let Some(update) = add_morale_for_all(board, faction_bonus, faction) {
            events.push(update);
        }
        if let Some(update) = boost_occupant(board, cell, faction, unit_bonus) {
            events.push(update);
        }
    }

    events.insert(
        0,
        Event::Annex {
            field: field(board, cell),
            old_party: old_owner,
            new_party: faction,
        },
    );
    board.set_owner(cell, Some(faction));

    let neighbors: Vec<CellId> = board.cell(cell).neighbor_ids().collect();
    for n in neighbors {
        let neighbor = board.cell(n);
        let floods = neighbor.is_land()
            && neighbor.estate.is_none()
            && neighbor.unit().is_none()
            && neighbor.owner != Some(faction);
        if !floods {
            continue;
        }
        let previous = neighbor.owner;
        let (bonus, _) = rules::morale_earned(neighbor);
        if let Some(update) = add_morale_for_all(board, bonus, faction) {
            events.push(update);
        }
        board.set_owner(n, Some(faction));
        events.push(Event::Annex {
            field: field(board, n),
            old_party: previous,
            new_party: faction,
        });
    }

    events
}

/// Direct morale bonus for the army that took the cell
fn boost_occupant(board: &mut Board, cell: CellId, faction: FactionId, amount: i32) -> Option<Event> {
    if amount == 0 {
        return None;
    }
    let id = board.cell(cell).unit()?;
    let unit = board.unit_mut(id)?;
    if unit.faction != faction {
        return None;
    }
    let morale = rules::shifted_morale(Force::new(unit.strength, unit.morale), amount)?;
    unit.morale = morale;
    Some(Event::MoraleUpdate {
        updates: vec![MoraleChange { id, morale }],
    })
}

// ============================================================================
// LEVEL 3: MORALE
// ============================================================================

/// Shift the morale of every active army of `faction` by `amount`
///
/// Returns `None` when nothing changed.
pub fn add_morale_for_all(board: &mut Board, amount: i32, faction: FactionId) -> Option<Event> {
    if amount == 0 {
        return None;
    }
    let mut updates = Vec::new();
    for id in board.units_of(faction) {
        let Some(unit) = board.unit_mut(id) else { continue };
        if let Some(morale) = rules::shifted_morale(Force::new(unit.strength, unit.morale), amount) {
            unit.morale = morale;
            updates.push(MoraleChange { id, morale });
        }
    }
    if updates.is_empty() {
        None
    } else {
        Some(Event::MoraleUpdate { updates })
    }
}

// ============================================================================
// LEVEL 1: TURN BOUNDARIES
// ============================================================================

/// Reinforce a faction's capital and towns
pub fn spawn_units(board: &mut Board, faction: FactionId) -> Vec<Event> {
    let mut lands = 0usize;
    let mut ports = 0usize;
    let mut towns = Vec::new();
    for id in board.cell_ids() {
        let cell = board.cell(id);
        if cell.owner != Some(faction) {
            continue;
        }
        if cell.is_town() {
            towns.push(id);
        } else if cell.is_port() {
            ports += 1;
        } else if cell.is_land() {
            lands += 1;
        }
    }

    let per_town = rules::town_reinforcement(lands, ports, towns.len());
    let morale = board.faction(faction).morale;
    let capital = board.faction(faction).capital;

    let mut events = Vec::new();
    if board.cell(capital).owner == Some(faction) {
        events.extend(add_units_to_cell(board, capital, rules::CAPITAL_REINFORCEMENT, morale, faction));
    }
    for town in towns {
        events.extend(add_units_to_cell(board, town, per_town, morale, faction));
    }

    debug!(faction, per_town, spawned = events.len(), "reinforcements");
    events
}

/// Merge reinforcements into the army on `cell` or raise a new one
///
/// New armies start marked as moved. A foreign army on the cell blocks the
/// reinforcement.
pub fn add_units_to_cell(
    board: &mut Board,
    cell: CellId,
    amount: i32,
    morale: i32,
    faction: FactionId,
) -> Option<Event> {
    let at = field(board, cell);
    if let Some(id) = board.cell(cell).unit() {
        let unit = board.unit_mut(id)?;
        if unit.faction != faction {
            debug!(faction, cell = %board.hex_of(cell), "reinforcement blocked by foreign army");
            return None;
        }
        let merged = rules::reinforce(Force::new(unit.strength, unit.morale), amount, morale);
        unit.strength = merged.strength;
        unit.morale = merged.morale;
        return Some(Event::Spawn {
            field: at,
            party: faction,
            army_id: id,
            new_count: merged.strength,
            new_morale: merged.morale,
            is_new: false,
        });
    }

    let id = board.spawn_unit(cell, faction, amount, morale);
    let unit = board.unit_mut(id)?;
    unit.has_moved = true;
    Some(Event::Spawn {
        field: at,
        party: faction,
        army_id: id,
        new_count: unit.strength,
        new_morale: unit.morale,
        is_new: true,
    })
}

/// Reset moved flags; armies that stood still lose one morale
pub fn cleanup_turn(board: &mut Board, faction: FactionId) -> Option<Event> {
    let mut updates = Vec::new();
    for id in board.units_of(faction) {
        let Some(unit) = board.unit_mut(id) else { continue };
        if unit.has_moved {
            unit.has_moved = false;
        } else if unit.morale > 0 {
            unit.morale -= 1;
            updates.push(MoraleChange { id, morale: unit.morale });
        }
    }
    if updates.is_empty() {
        None
    } else {
        Some(Event::MoraleUpdate { updates })
    }
}

// ============================================================================
// LEVEL 2: FACTION STATUS
// ============================================================================

/// Recompute every faction's status, then hand dead factions' land and
/// armies over
pub fn update_faction_statuses(board: &mut Board) -> Vec<Event> {
    let live_counts: Vec<usize> = (0..board.faction_count())
        .map(|f| board.units_of(f as FactionId).len())
        .collect();

    for index in 0..board.faction_count() {
        let id = index as FactionId;
        let capital = board.factions[index].capital;
        if board.cell(capital).owner != Some(id) {
            let faction = &mut board.factions[index];
            faction.status = 0;
            faction.conquered_capitals.clear();
            continue;
        }

        let conquered: Vec<FactionId> = board
            .factions
            .iter()
            .filter(|other| {
                other.id != id
                    && board.cell(other.capital).owner == Some(id)
                    && live_counts[other.id as usize] == 0
            })
            .map(|other| other.id)
            .collect();

        let faction = &mut board.factions[index];
        faction.status = 1 + conquered.len() as u8;
        faction.conquered_capitals = conquered;
    }

    transfer_dead_faction_lands(board)
}

/// Follow "owner of my capital" links from a dead faction to a living heir
///
/// A loop back to a faction already on the chain stops the walk at the last
/// faction reached. `None` when a capital on the chain is unowned.
fn heir_of(board: &Board, owner: FactionId) -> Option<FactionId> {
    let mut current = owner;
    let mut visited = FxHashSet::default();
    visited.insert(current);
    while !board.faction(current).is_alive() {
        let next = board.cell(board.faction(current).capital).owner?;
        if !visited.insert(next) {
            break;
        }
        current = next;
    }
    Some(current)
}

/// Reassign land owned by eliminated factions and disband their armies
///
/// Heirs are resolved against the ownership at entry, before any cell moves.
pub fn transfer_dead_faction_lands(board: &mut Board) -> Vec<Event> {
    let mut events = Vec::new();

    let heirs: Vec<Option<FactionId>> = (0..board.faction_count())
        .map(|f| heir_of(board, f as FactionId))
        .collect();
    for cell in board.cell_ids() {
        let Some(owner) = board.cell(cell).owner else { continue };
        match heirs[owner as usize] {
            Some(heir) if heir != owner => {
                board.set_owner(cell, Some(heir));
                events.push(Event::LandTransfer {
                    field: field(board, cell),
                    old_party: owner,
                    new_party: heir,
                });
            }
            _ => {}
        }
    }

    let doomed: Vec<(UnitId, FactionId, Option<CellId>)> = board
        .active_units()
        .filter(|u| !board.faction(u.faction).is_alive())
        .map(|u| (u.id, u.faction, u.cell()))
        .collect();
    for (id, party, cell) in doomed {
        board.remove_unit(id);
        events.push(Event::ArmyDisbanded {
            army_id: id,
            party,
            field: cell.map(|c| field(board, c)),
        });
    }

    events
}

// ============================================================================
// LEVEL 1: REFRESH
// ============================================================================

/// Rebuild derived faction state after a batch of mutations
///
/// Purges removed armies, settles statuses (returning their events), then
/// recomputes unit lists, territory and morale averages.
pub fn refresh_board(board: &mut Board) -> Vec<Event> {
    board.purge_removed();
    let events = update_faction_statuses(board);
    sync_faction_units(board);
    sync_territory(board);
    settle_morale(board);
    events
}

fn sync_faction_units(board: &mut Board) {
    for index in 0..board.faction_count() {
        let units = board.units_of(index as FactionId);
        let (strength, power) = units
            .iter()
            .filter_map(|&id| board.unit(id))
            .fold((0, 0), |(s, p), u| (s + u.strength, p + u.power()));
        let faction = &mut board.factions[index];
        faction.units = units;
        faction.total_strength = strength;
        faction.total_power = power;
    }
}

fn sync_territory(board: &mut Board) {
    for faction in &mut board.factions {
        faction.towns.clear();
        faction.ports.clear();
        faction.lands.clear();
    }
    for id in board.cell_ids() {
        let cell = board.cell(id);
        let Some(owner) = cell.owner else { continue };
        let is_town = cell.is_town();
        let is_port = cell.is_port();
        let faction = board.faction_mut(owner);
        if is_town {
            faction.towns.push(id);
        } else if is_port {
            faction.ports.push(id);
        } else {
            faction.lands.push(id);
        }
    }
}

fn settle_morale(board: &mut Board) {
    for index in 0..board.faction_count() {
        let units = board.factions[index].units.clone();
        if units.is_empty() {
            board.factions[index].morale = EMPTY_FACTION_MORALE;
            continue;
        }
        let floor = rules::morale_floor(board.factions[index].total_strength);
        let mut sum = 0;
        for id in &units {
            if let Some(unit) = board.unit_mut(*id) {
                unit.morale = unit.morale.max(floor).min(unit.strength);
                sum += unit.morale;
            }
        }
        board.factions[index].morale = sum / units.len() as i32;
    }
}
