//! Pure scoring rules: combat, joining, morale deltas, reinforcements
//!
//! Nothing here touches the board. The engine feeds in the numbers and
//! applies the results.

use crate::board::{Cell, Terrain};
use crate::units::MAX_STRENGTH;

/// Upper bound on moves per faction turn
pub const MAX_MOVE_POINTS: usize = 5;

/// Reinforcement for an owned capital
pub const CAPITAL_REINFORCEMENT: i32 = 5;

/// Base reinforcement per owned town
pub const TOWN_REINFORCEMENT: i32 = 5;

/// Each port counts as this many plain land cells for reinforcement
pub const PORT_LAND_EQUIVALENT: i32 = 5;

/// Strength and morale of one side
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Force {
    pub strength: i32,
    pub morale: i32,
}

impl Force {
    pub const fn new(strength: i32, morale: i32) -> Self {
        Self { strength, morale }
    }

    pub fn power(&self) -> i32 {
        self.strength + self.morale
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Attacker,
    Defender,
}

/// Result of a single battle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CombatOutcome {
    pub winner: Side,
    /// Winner after losses; the loser is unchanged
    pub survivor: Force,
    pub losses: i32,
}

/// Resolve a battle. Ties go to the defender.
///
/// The winner loses `floor(loser_power / winner_power * winner_strength)`
/// soldiers but always keeps at least one.
pub fn resolve_combat(attacker: Force, defender: Force) -> CombatOutcome {
    let (winner, won, lost) = if attacker.power() > defender.power() {
        (Side::Attacker, attacker, defender)
    } else {
        (Side::Defender, defender, attacker)
    };

    let winner_power = won.power() as i64;
    let losses = if winner_power > 0 {
        ((lost.power() as i64 * won.strength as i64) / winner_power) as i32
    } else {
        0
    };
    let strength = (won.strength - losses).max(1);
    let morale = won.morale.min(strength);

    CombatOutcome {
        winner,
        survivor: Force::new(strength, morale),
        losses: won.strength - strength,
    }
}

/// Result of merging a moving army into a stationary one
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoinOutcome {
    pub merged: Force,
    /// Soldiers that did not fit under MAX_STRENGTH and stay with the mover
    pub remainder: i32,
}

/// Merge two friendly armies. Morale is the strength-weighted average over
/// the uncapped total, capped to the merged strength.
pub fn resolve_join(moving: Force, target: Force) -> JoinOutcome {
    let total = moving.strength + target.strength;
    let strength = total.min(MAX_STRENGTH);
    let morale = if total > 0 {
        (moving.strength * moving.morale + target.strength * target.morale) / total
    } else {
        0
    };

    JoinOutcome {
        merged: Force::new(strength, morale.min(strength)),
        remainder: total - strength,
    }
}

/// Add reinforcements of `amount` soldiers carrying `morale` to an army
pub fn reinforce(existing: Force, amount: i32, morale: i32) -> Force {
    let total = existing.strength + amount;
    if total <= 0 {
        return Force::new(0, 0);
    }
    let merged_morale = (existing.strength * existing.morale + amount * morale) / total;
    let strength = total.min(MAX_STRENGTH);
    Force::new(strength, merged_morale.clamp(0, strength))
}

/// Morale gained by capturing `cell`: (faction bonus, occupying army bonus)
///
/// Evaluated before the owner changes, so an intact capital still shows its
/// founder as owner.
pub fn morale_earned(cell: &Cell) -> (i32, i32) {
    if cell.is_capital() {
        if cell.is_intact_capital() {
            return (50, 30);
        }
        return (30, 20);
    }
    if cell.is_town() {
        return (10, 10);
    }
    if cell.is_port() {
        return (5, 5);
    }
    if cell.terrain == Terrain::Land {
        return (1, 0);
    }
    (0, 0)
}

/// Morale lost by the previous owner of `cell`
pub fn morale_lost(cell: &Cell) -> i32 {
    if cell.is_capital() {
        return -30;
    }
    if cell.is_town() {
        return -10;
    }
    if cell.is_port() {
        return -5;
    }
    0
}

/// Faction-wide penalty for losing an army of `strength`
pub fn defeat_penalty(strength: i32) -> i32 {
    -(strength / 10)
}

/// Apply a faction-wide morale delta to one army, clamped to [0, strength]
///
/// Returns the new morale if it changed.
pub fn shifted_morale(force: Force, amount: i32) -> Option<i32> {
    if amount == 0 {
        return None;
    }
    let morale = (force.morale + amount).clamp(0, force.strength.max(0));
    (morale != force.morale).then_some(morale)
}

/// Moves available to a faction this turn
pub fn move_points(movable_units: usize) -> usize {
    movable_units.min(MAX_MOVE_POINTS)
}

/// Soldiers each owned town receives at spawn time
pub fn town_reinforcement(lands: usize, ports: usize, towns: usize) -> i32 {
    let per_town = (lands as i32 + ports as i32 * PORT_LAND_EQUIVALENT) / towns.max(1) as i32;
    TOWN_REINFORCEMENT + per_town
}

/// Morale floor applied to every army at refresh time
pub fn morale_floor(total_strength: i32) -> i32 {
    total_strength / 50
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, Estate, Hex};
    use crate::faction::Control;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_attacker_wins_on_town_scenario() {
        let outcome = resolve_combat(Force::new(50, 10), Force::new(30, 5));
        assert_eq!(outcome.winner, Side::Attacker);
        assert_eq!(outcome.losses, 29);
        assert_eq!(outcome.survivor, Force::new(21, 10));
        assert_eq!(defeat_penalty(30), -3);
    }

    #[test]
    fn test_tie_goes_to_defender() {
        let outcome = resolve_combat(Force::new(20, 10), Force::new(25, 5));
        assert_eq!(outcome.winner, Side::Defender);
        assert_eq!(outcome.survivor.strength, 1);
    }

    #[test]
    fn test_winner_keeps_one_survivor() {
        let outcome = resolve_combat(Force::new(10, 0), Force::new(9, 0));
        assert_eq!(outcome.winner, Side::Attacker);
        assert_eq!(outcome.survivor.strength, 1);
        assert_eq!(outcome.survivor.morale, 0);
        assert_eq!(outcome.losses, 9);
    }

    #[test]
    fn test_combat_invariants_random() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..2000 {
            let a_strength = rng.gen_range(1..=MAX_STRENGTH);
            let b_strength = rng.gen_range(1..=MAX_STRENGTH);
            let a = Force::new(a_strength, rng.gen_range(0..=a_strength));
            let b = Force::new(b_strength, rng.gen_range(0..=b_strength));
            let outcome = resolve_combat(a, b);
            let before = match outcome.winner {
                Side::Attacker => a,
                Side::Defender => b,
            };
            assert!(outcome.survivor.strength >= 1);
            assert!(outcome.survivor.strength <= before.strength);
            assert!(outcome.survivor.morale <= outcome.survivor.strength);
            assert!(outcome.survivor.morale >= 0);
        }
    }

    #[test]
    fn test_join_under_cap() {
        let outcome = resolve_join(Force::new(30, 10), Force::new(40, 20));
        assert_eq!(outcome.merged.strength, 70);
        assert_eq!(outcome.merged.morale, (30 * 10 + 40 * 20) / 70);
        assert_eq!(outcome.remainder, 0);
    }

    #[test]
    fn test_join_over_cap() {
        let outcome = resolve_join(Force::new(60, 60), Force::new(70, 70));
        assert_eq!(outcome.merged.strength, MAX_STRENGTH);
        assert_eq!(outcome.remainder, 31);
        assert!(outcome.merged.morale <= MAX_STRENGTH);
    }

    #[test]
    fn test_join_random_totals() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..1000 {
            let a = rng.gen_range(1..=MAX_STRENGTH);
            let b = rng.gen_range(1..=MAX_STRENGTH);
            let outcome = resolve_join(
                Force::new(a, rng.gen_range(0..=a)),
                Force::new(b, rng.gen_range(0..=b)),
            );
            if a + b <= MAX_STRENGTH {
                assert_eq!(outcome.merged.strength, a + b);
                assert_eq!(outcome.remainder, 0);
            } else {
                assert_eq!(outcome.merged.strength, MAX_STRENGTH);
                assert_eq!(outcome.remainder, a + b - MAX_STRENGTH);
            }
            assert!(outcome.merged.morale <= outcome.merged.strength);
        }
    }

    #[test]
    fn test_reinforce_caps() {
        let merged = reinforce(Force::new(95, 50), 20, 10);
        assert_eq!(merged.strength, MAX_STRENGTH);
        assert_eq!(merged.morale, (95 * 50 + 20 * 10) / 115);
    }

    #[test]
    fn test_morale_tables() {
        let mut board = Board::new(4, 4);
        let cap = board.cell_id(Hex::new(1, 1)).unwrap();
        let red = board.add_faction("Red", cap, Control::Computer);
        assert_eq!(morale_earned(board.cell(cap)), (50, 30));
        board.set_owner(cap, Some(red + 1));
        assert_eq!(morale_earned(board.cell(cap)), (30, 20));
        assert_eq!(morale_lost(board.cell(cap)), -30);

        board.set_estate(0, Some(Estate::Town));
        board.set_estate(1, Some(Estate::Port));
        assert_eq!(morale_earned(board.cell(0)), (10, 10));
        assert_eq!(morale_earned(board.cell(1)), (5, 5));
        assert_eq!(morale_earned(board.cell(2)), (1, 0));
        assert_eq!(morale_lost(board.cell(0)), -10);
        assert_eq!(morale_lost(board.cell(1)), -5);
        assert_eq!(morale_lost(board.cell(2)), 0);
    }

    #[test]
    fn test_shifted_morale_clamps() {
        assert_eq!(shifted_morale(Force::new(10, 8), 5), Some(10));
        assert_eq!(shifted_morale(Force::new(10, 2), -5), Some(0));
        assert_eq!(shifted_morale(Force::new(10, 10), 5), None);
        assert_eq!(shifted_morale(Force::new(10, 4), 0), None);
    }

    #[test]
    fn test_move_points_and_reinforcements() {
        assert_eq!(move_points(3), 3);
        assert_eq!(move_points(12), MAX_MOVE_POINTS);
        assert_eq!(town_reinforcement(10, 2, 2), 5 + (10 + 10) / 2);
        assert_eq!(town_reinforcement(7, 0, 0), 12);
    }
}
