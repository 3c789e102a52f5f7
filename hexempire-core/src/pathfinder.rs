//! Hex routing: distances, shortest paths and per-turn move enumeration
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: find_path(), possible_moves(), reachable_cells()
//! - Level 2: can_walk(), qualifies_as_destination()
//! - Level 3: OpenNode heap ordering, path reconstruction
//! - Level 4: distance()

use crate::board::{Board, CellId, Estate};
use crate::units::MAX_STRENGTH;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Cost of entering any adjacent hex
pub const STEP_COST: i32 = 5;

// ============================================================================
// SEARCH NODES
// ============================================================================

#[derive(Debug)]
struct OpenNode {
    priority: i32,
    cell: CellId,
    tie: u64,
}

impl OpenNode {
    fn key(&self) -> (i32, u64) {
        (self.priority, self.tie)
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap pops the lowest priority, earliest enqueued first
        other.key().cmp(&self.key())
    }
}

#[derive(Clone, Copy, Debug)]
struct NodeRecord {
    parent: Option<CellId>,
    cost: i32,
    closed: bool,
}

// ============================================================================
// LEVEL 4: GEOMETRY
// ============================================================================

/// Hex distance between two cells
pub fn distance(board: &Board, a: CellId, b: CellId) -> i32 {
    board.distance(a, b)
}

// ============================================================================
// LEVEL 2: WALKABILITY
// ============================================================================

/// Whether a route may step from `a` into the adjacent cell `b`
pub fn can_walk(board: &Board, a: CellId, b: CellId, avoid_estates: &[Estate], avoid_water: bool) -> bool {
    let from = board.cell(a);
    let to = board.cell(b);

    if let Some(estate) = to.estate {
        if avoid_estates.contains(&estate) {
            return false;
        }
    }
    if !avoid_water {
        return true;
    }
    match (from.is_water(), to.is_water()) {
        (true, _) => true,
        (false, false) => true,
        (false, true) => from.is_port(),
    }
}

// ============================================================================
// LEVEL 1: PATHS
// ============================================================================

/// Shortest route from `start` to `goal`, both ends included
///
/// Returns `None` when the goal cannot be reached. A water start always
/// routes as if `avoid_water` were false.
pub fn find_path(
    board: &Board,
    start: CellId,
    goal: CellId,
    avoid_estates: &[Estate],
    avoid_water: bool,
) -> Option<Vec<CellId>> {
    find_path_with(board, start, goal, avoid_estates, avoid_water, |_| false)
}

/// [`find_path`] with an extra caller-supplied blocking predicate
pub fn find_path_with<F>(
    board: &Board,
    start: CellId,
    goal: CellId,
    avoid_estates: &[Estate],
    avoid_water: bool,
    is_blocked: F,
) -> Option<Vec<CellId>>
where
    F: Fn(CellId) -> bool,
{
    let avoid_water = avoid_water && !board.cell(start).is_water();

    let mut open = BinaryHeap::new();
    let mut nodes: FxHashMap<CellId, NodeRecord> = FxHashMap::default();
    let mut tie = 0u64;

    nodes.insert(start, NodeRecord { parent: None, cost: 0, closed: false });
    open.push(OpenNode { priority: 0, cell: start, tie });

    while let Some(current) = open.pop() {
        let record = match nodes.get_mut(&current.cell) {
            Some(record) if !record.closed => record,
            _ => continue,
        };
        record.closed = true;
        let current_cost = record.cost;

        if current.cell == goal {
            return Some(reconstruct(&nodes, goal));
        }

        for next in board.cell(current.cell).neighbor_ids() {
            let enterable = next == goal
                || (!is_blocked(next) && can_walk(board, current.cell, next, avoid_estates, avoid_water));
            if !enterable {
                continue;
            }

            let cost = current_cost + STEP_COST;
            match nodes.get_mut(&next) {
                Some(existing) => {
                    // Finalized or pending, a cheaper arrival takes over the parent link
                    if cost < existing.cost {
                        existing.cost = cost;
                        existing.parent = Some(current.cell);
                    }
                }
                None => {
                    nodes.insert(next, NodeRecord { parent: Some(current.cell), cost, closed: false });
                    tie += 1;
                    open.push(OpenNode {
                        priority: STEP_COST + board.distance(next, goal),
                        cell: next,
                        tie,
                    });
                }
            }
        }
    }

    None
}

fn reconstruct(nodes: &FxHashMap<CellId, NodeRecord>, goal: CellId) -> Vec<CellId> {
    let mut path = vec![goal];
    let mut cursor = goal;
    while let Some(parent) = nodes.get(&cursor).and_then(|n| n.parent) {
        path.push(parent);
        cursor = parent;
    }
    path.reverse();
    path
}

// ============================================================================
// LEVEL 1: MOVE ENUMERATION
// ============================================================================

/// Second-ring cells as (first step, second step) direction pairs, in scan order
const SECOND_RING: [(u8, u8); 12] = [
    (0, 0),
    (0, 1),
    (1, 1),
    (1, 2),
    (2, 2),
    (3, 3),
    (3, 4),
    (4, 4),
    (4, 5),
    (5, 5),
    (0, 5),
    (2, 3),
];

/// The six neighbors followed by the twelve second-ring cells, clipped to the board
///
/// Order is fixed by `SECOND_RING`; scans that break ties by first match
/// depend on it.
pub fn reachable_cells(board: &Board, cell: CellId) -> Vec<CellId> {
    let hex = board.hex_of(cell);
    let mut result: Vec<CellId> = board.cell(cell).neighbor_ids().collect();
    for (first, second) in SECOND_RING {
        if let Some(id) = board.cell_id(hex.neighbor(first).neighbor(second)) {
            result.push(id);
        }
    }
    result
}

/// Whether `candidate` is a legal destination for the army on `origin`
fn qualifies_as_destination(board: &Board, candidate: CellId, origin: CellId, power_gate: bool) -> bool {
    if candidate == origin {
        return false;
    }
    let Some(occupant) = board.unit_at(candidate) else {
        return true;
    };
    let Some(mover) = board.unit_at(origin) else {
        return false;
    };

    if occupant.faction != mover.faction {
        // The mover must bring at least three quarters of the occupant's power
        return !(power_gate && mover.power() * 4 < occupant.power() * 3);
    }
    !board.cell(candidate).is_water() && occupant.strength < MAX_STRENGTH
}

/// Destinations the army on `origin` can reach this turn (one or two steps)
///
/// Plain land moves over land only, water moves anywhere adjacent and a port
/// launches both ways. The second step is only taken through an empty water
/// cell or an empty estate-free land cell. Results keep discovery order.
pub fn possible_moves(board: &Board, origin: CellId, exclude_self: bool, power_gate: bool) -> Vec<CellId> {
    let mut found: Vec<CellId> = Vec::new();
    let mut seen: FxHashSet<CellId> = FxHashSet::default();
    let mut push = |id: CellId, found: &mut Vec<CellId>| {
        if seen.insert(id) {
            found.push(id);
        }
    };

    if !exclude_self {
        push(origin, &mut found);
    }

    let from = board.cell(origin);
    let ok = |id: CellId| qualifies_as_destination(board, id, origin, power_gate);

    for first in from.neighbor_ids() {
        let step = board.cell(first);
        let empty = board.unit_at(first).is_none();

        if from.is_port() {
            if !ok(first) {
                continue;
            }
            push(first, &mut found);
            if step.is_water() && empty {
                for second in step.neighbor_ids() {
                    if board.cell(second).is_water() && ok(second) {
                        push(second, &mut found);
                    }
                }
            } else if step.is_land() && step.estate.is_none() && empty {
                for second in step.neighbor_ids() {
                    if board.cell(second).is_land() && ok(second) {
                        push(second, &mut found);
                    }
                }
            }
        } else if from.is_water() {
            if !ok(first) {
                continue;
            }
            push(first, &mut found);
            if step.is_water() && empty {
                for second in step.neighbor_ids() {
                    if ok(second) {
                        push(second, &mut found);
                    }
                }
            }
        } else {
            if !step.is_land() || !ok(first) {
                continue;
            }
            push(first, &mut found);
            if step.estate.is_none() && empty {
                for second in step.neighbor_ids() {
                    if board.cell(second).is_land() && ok(second) {
                        push(second, &mut found);
                    }
                }
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Hex, Terrain};

    fn id(board: &Board, x: i32, y: i32) -> CellId {
        board.cell_id(Hex::new(x, y)).unwrap()
    }

    /// Land on the left three columns, water on the right
    fn coast_board() -> Board {
        let mut board = Board::new(6, 6);
        for cell in board.cell_ids() {
            if board.hex_of(cell).x >= 3 {
                board.set_terrain(cell, Terrain::Water);
            }
        }
        board
    }

    #[test]
    fn test_path_to_self() {
        let board = Board::new(3, 3);
        assert_eq!(find_path(&board, 4, 4, &[], true), Some(vec![4]));
    }

    #[test]
    fn test_path_is_shortest_on_open_land() {
        let board = Board::new(8, 8);
        let start = id(&board, 0, 0);
        let goal = id(&board, 5, 4);
        let path = find_path(&board, start, goal, &[], true).unwrap();
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&goal));
        assert_eq!(path.len() as i32, board.distance(start, goal) + 1);
        for pair in path.windows(2) {
            assert_eq!(board.distance(pair[0], pair[1]), 1);
        }
    }

    #[test]
    fn test_land_route_cannot_enter_water() {
        let board = coast_board();
        let start = id(&board, 0, 2);
        let goal = id(&board, 5, 2);
        assert!(find_path(&board, start, goal, &[], true).is_none());
        assert!(find_path(&board, start, goal, &[], false).is_some());
    }

    #[test]
    fn test_port_launches_into_water() {
        let mut board = coast_board();
        let port = id(&board, 2, 2);
        board.set_estate(port, Some(Estate::Port));
        let start = id(&board, 0, 2);
        let goal = id(&board, 5, 2);
        let path = find_path(&board, start, goal, &[], true).unwrap();
        assert!(path.contains(&port));
    }

    #[test]
    fn test_water_start_ignores_avoid_water() {
        let board = coast_board();
        let start = id(&board, 4, 2);
        let goal = id(&board, 0, 2);
        assert!(find_path(&board, start, goal, &[], true).is_some());
    }

    #[test]
    fn test_goal_always_enterable() {
        let mut board = Board::new(5, 1);
        let town = id(&board, 4, 0);
        board.set_estate(town, Some(Estate::Town));
        let path = find_path(&board, 0, town, &[Estate::Town], true);
        assert_eq!(path.map(|p| p.len()), Some(5));
    }

    #[test]
    fn test_blocked_predicate_detours() {
        let board = Board::new(5, 5);
        let start = id(&board, 0, 2);
        let goal = id(&board, 4, 2);
        let wall = id(&board, 2, 2);
        let path = find_path_with(&board, start, goal, &[], true, |c| c == wall).unwrap();
        assert!(!path.contains(&wall));
        assert_eq!(path.last(), Some(&goal));
    }

    #[test]
    fn test_reachable_cells_count() {
        let board = Board::new(9, 9);
        let center = id(&board, 4, 4);
        let cells = reachable_cells(&board, center);
        assert_eq!(cells.len(), 18);
        let unique: FxHashSet<_> = cells.iter().copied().collect();
        assert_eq!(unique.len(), 18);
        for &c in &cells {
            let d = board.distance(center, c);
            assert!(d == 1 || d == 2);
        }
        for &c in &cells[..6] {
            assert_eq!(board.distance(center, c), 1);
        }
    }

    #[test]
    fn test_reachable_cells_scan_order() {
        let board = Board::new(9, 9);
        let center = id(&board, 4, 4);
        let hex = board.hex_of(center);
        let cells = reachable_cells(&board, center);
        let at = |a: u8, b: u8| board.cell_id(hex.neighbor(a).neighbor(b)).unwrap();

        assert_eq!(cells[6], at(0, 0));
        assert_eq!(cells[7], at(0, 1));
        assert_eq!(cells[10], at(2, 2));
        assert_eq!(cells[15], at(5, 5));
        assert_eq!(cells[16], at(0, 5));
        assert_eq!(cells[17], at(2, 3));
    }

    #[test]
    fn test_reachable_cells_clipped_at_corner() {
        let board = Board::new(9, 9);
        let cells = reachable_cells(&board, 0);
        assert!(cells.len() < 18);
        assert!(cells.iter().all(|&c| board.distance(0, c) <= 2));
    }

    #[test]
    fn test_land_moves_two_steps() {
        let mut board = Board::new(7, 7);
        let origin = id(&board, 3, 3);
        board.spawn_unit(origin, 0, 10, 5);
        let moves = possible_moves(&board, origin, true, false);
        assert_eq!(moves.len(), 18);
        assert!(!moves.contains(&origin));

        let with_self = possible_moves(&board, origin, false, false);
        assert_eq!(with_self[0], origin);
        assert_eq!(with_self.len(), 19);
    }

    #[test]
    fn test_estate_stops_second_step() {
        let mut board = Board::new(7, 1);
        let origin = id(&board, 0, 0);
        board.spawn_unit(origin, 0, 10, 5);
        board.set_estate(id(&board, 1, 0), Some(Estate::Town));
        let moves = possible_moves(&board, origin, true, false);
        assert_eq!(moves, vec![id(&board, 1, 0)]);
    }

    #[test]
    fn test_full_friendly_not_a_destination() {
        let mut board = Board::new(3, 1);
        let origin = id(&board, 0, 0);
        board.spawn_unit(origin, 0, 10, 5);
        board.spawn_unit(id(&board, 1, 0), 0, MAX_STRENGTH, 5);
        assert!(possible_moves(&board, origin, true, false).is_empty());
    }

    #[test]
    fn test_power_gate() {
        let mut board = Board::new(2, 1);
        let origin = id(&board, 0, 0);
        let target = id(&board, 1, 0);
        board.spawn_unit(origin, 0, 10, 0);
        board.spawn_unit(target, 1, 40, 0);
        assert_eq!(possible_moves(&board, origin, true, false), vec![target]);
        assert!(possible_moves(&board, origin, true, true).is_empty());
    }

    #[test]
    fn test_land_army_stays_ashore() {
        let mut board = coast_board();
        let origin = id(&board, 2, 2);
        board.spawn_unit(origin, 0, 10, 5);
        let moves = possible_moves(&board, origin, true, false);
        assert!(moves.iter().all(|&c| board.cell(c).is_land()));
    }

    #[test]
    fn test_port_reaches_water() {
        let mut board = coast_board();
        let origin = id(&board, 2, 2);
        board.set_estate(origin, Some(Estate::Port));
        board.spawn_unit(origin, 0, 10, 5);
        let moves = possible_moves(&board, origin, true, false);
        assert!(moves.iter().any(|&c| board.cell(c).is_water()));
        assert!(moves.contains(&id(&board, 4, 2)));
    }
}
