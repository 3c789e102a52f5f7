//! Hex map geometry and the board arena
//!
//! Cells live in a flat `Vec` indexed by [`CellId`] (`y * width + x`); armies
//! live in an id-keyed table. A cell stores the id of the army standing on it
//! and the army stores the id of its cell. Both links are only ever changed
//! together, by [`Board::place_unit`] and [`Board::detach_unit`].

use crate::faction::{Control, Faction, FactionId};
use crate::units::{Unit, UnitId, MAX_STRENGTH};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index of a cell in `Board::cells`
pub type CellId = usize;

// ============================================================================
// COORDINATES
// ============================================================================

/// Offset hex coordinates (columns shifted down on odd `x`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hex {
    pub x: i32,
    pub y: i32,
}

/// Direction vectors in axial coordinates (dq, dr)
///
/// Index order matches the neighbor slots of a cell:
/// 0 = lower right, 1 = down, 2 = lower left, 3 = upper left, 4 = up, 5 = upper right
pub const DIRECTIONS: [(i32, i32); 6] = [
    (1, 0),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (0, -1),
    (1, -1),
];

impl Hex {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Convert to axial (q, r)
    pub fn to_axial(&self) -> (i32, i32) {
        (self.x, self.y - (self.x - (self.x & 1)) / 2)
    }

    pub fn from_axial(q: i32, r: i32) -> Self {
        Self::new(q, r + (q - (q & 1)) / 2)
    }

    /// Get neighbor in direction (0-5)
    pub fn neighbor(&self, direction: u8) -> Hex {
        let (q, r) = self.to_axial();
        let (dq, dr) = DIRECTIONS[direction as usize % 6];
        Hex::from_axial(q + dq, r + dr)
    }

    /// Distance between two hexes
    pub fn distance_to(&self, other: Hex) -> i32 {
        let (q1, r1) = self.to_axial();
        let (q2, r2) = other.to_axial();
        let dq = q1 - q2;
        let dr = r1 - r2;
        (dq.abs() + dr.abs() + (dq + dr).abs()) / 2
    }
}

impl std::fmt::Display for Hex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ============================================================================
// CELLS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    Land,
    Water,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estate {
    Town,
    Port,
}

/// A single hex tile
#[derive(Clone, Debug)]
pub struct Cell {
    pub hex: Hex,
    pub terrain: Terrain,
    pub estate: Option<Estate>,
    /// Only meaningful for land
    pub owner: Option<FactionId>,
    /// Set at map setup, never changed afterwards
    pub capital_of: Option<FactionId>,
    /// Neighbor slots in `DIRECTIONS` order, `None` off the map
    pub neighbors: [Option<CellId>; 6],
    /// Negated route length to each faction's capital (AI helper)
    pub profitability: Vec<Option<i32>>,
    /// Within two hexes of each faction's capital (AI helper)
    pub near_capital: Vec<bool>,
    /// Within two hexes of a town (AI helper)
    pub near_town: bool,
    unit: Option<UnitId>,
}

impl Cell {
    fn new(hex: Hex) -> Self {
        Self {
            hex,
            terrain: Terrain::Land,
            estate: None,
            owner: None,
            capital_of: None,
            neighbors: [None; 6],
            profitability: Vec::new(),
            near_capital: Vec::new(),
            near_town: false,
            unit: None,
        }
    }

    pub fn unit(&self) -> Option<UnitId> {
        self.unit
    }

    pub fn is_land(&self) -> bool {
        self.terrain == Terrain::Land
    }

    pub fn is_water(&self) -> bool {
        self.terrain == Terrain::Water
    }

    pub fn is_town(&self) -> bool {
        self.estate == Some(Estate::Town)
    }

    pub fn is_port(&self) -> bool {
        self.estate == Some(Estate::Port)
    }

    pub fn is_capital(&self) -> bool {
        self.capital_of.is_some()
    }

    /// A capital whose founding faction still owns it
    pub fn is_intact_capital(&self) -> bool {
        self.capital_of.is_some() && self.capital_of == self.owner
    }

    /// Towns and capitals: targets worth sieging
    pub fn is_static_target(&self) -> bool {
        self.is_town() || self.is_capital()
    }

    pub fn neighbor_ids(&self) -> impl Iterator<Item = CellId> + '_ {
        self.neighbors.iter().flatten().copied()
    }
}

// ============================================================================
// BOARD
// ============================================================================

/// Complete simulation state of one game
#[derive(Clone, Debug)]
pub struct Board {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    pub factions: Vec<Faction>,
    units: BTreeMap<UnitId, Unit>,
    pub turn_number: u32,
    pub active_faction: FactionId,
    next_unit_id: u32,
}

impl Board {
    /// Create an all-land board with neighbor links resolved
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut cells = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                cells.push(Cell::new(Hex::new(x, y)));
            }
        }

        let mut board = Self {
            width,
            height,
            cells,
            factions: Vec::new(),
            units: BTreeMap::new(),
            turn_number: 0,
            active_faction: 0,
            next_unit_id: 1,
        };

        for id in 0..board.cells.len() {
            let hex = board.cells[id].hex;
            let mut neighbors = [None; 6];
            for (dir, slot) in neighbors.iter_mut().enumerate() {
                *slot = board.cell_id(hex.neighbor(dir as u8));
            }
            board.cells[id].neighbors = neighbors;
        }
        board
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, hex: Hex) -> bool {
        hex.x >= 0 && hex.y >= 0 && hex.x < self.width && hex.y < self.height
    }

    pub fn cell_id(&self, hex: Hex) -> Option<CellId> {
        if self.contains(hex) {
            Some((hex.y * self.width + hex.x) as usize)
        } else {
            None
        }
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id]
    }

    /// Mutable access for map setup; the occupant link stays private
    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id]
    }

    pub fn cell_at(&self, hex: Hex) -> Option<&Cell> {
        self.cell_id(hex).map(|id| &self.cells[id])
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell_ids(&self) -> std::ops::Range<CellId> {
        0..self.cells.len()
    }

    pub fn hex_of(&self, id: CellId) -> Hex {
        self.cells[id].hex
    }

    pub fn distance(&self, a: CellId, b: CellId) -> i32 {
        self.cells[a].hex.distance_to(self.cells[b].hex)
    }

    pub fn set_terrain(&mut self, id: CellId, terrain: Terrain) {
        self.cells[id].terrain = terrain;
        if terrain == Terrain::Water {
            self.cells[id].owner = None;
        }
    }

    pub fn set_estate(&mut self, id: CellId, estate: Option<Estate>) {
        self.cells[id].estate = estate;
    }

    /// Set the owner of a land cell; water stays unowned
    pub fn set_owner(&mut self, id: CellId, owner: Option<FactionId>) {
        if self.cells[id].is_land() {
            self.cells[id].owner = owner;
        }
    }

    // ------------------------------------------------------------------------
    // Factions
    // ------------------------------------------------------------------------

    /// Register a faction whose capital stands at `capital`
    ///
    /// The capital cell becomes an owned land town. AI helper vectors on every
    /// cell grow by one slot.
    pub fn add_faction(&mut self, name: impl Into<String>, capital: CellId, control: Control) -> FactionId {
        let id = self.factions.len() as FactionId;
        self.factions.push(Faction::new(id, name, capital, control));

        let cell = &mut self.cells[capital];
        cell.terrain = Terrain::Land;
        cell.estate = Some(Estate::Town);
        cell.capital_of = Some(id);
        cell.owner = Some(id);

        for cell in &mut self.cells {
            cell.profitability.push(None);
            cell.near_capital.push(false);
        }
        id
    }

    pub fn faction(&self, id: FactionId) -> &Faction {
        &self.factions[id as usize]
    }

    pub fn faction_mut(&mut self, id: FactionId) -> &mut Faction {
        &mut self.factions[id as usize]
    }

    pub fn faction_count(&self) -> usize {
        self.factions.len()
    }

    pub fn alive_factions(&self) -> impl Iterator<Item = &Faction> {
        self.factions.iter().filter(|f| f.is_alive())
    }

    // ------------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------------

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// The army standing on a cell, if any
    pub fn unit_at(&self, cell: CellId) -> Option<&Unit> {
        self.cells[cell].unit.and_then(|id| self.units.get(&id))
    }

    /// Every army in the table, removed ones included, in id order
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Armies that still take part in the simulation
    pub fn active_units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(|u| !u.removed)
    }

    /// Active armies of one faction, in id order
    pub fn units_of(&self, faction: FactionId) -> Vec<UnitId> {
        self.active_units()
            .filter(|u| u.faction == faction)
            .map(|u| u.id)
            .collect()
    }

    pub fn allocate_unit_id(&mut self) -> UnitId {
        let id = UnitId(self.next_unit_id);
        self.next_unit_id += 1;
        id
    }

    /// Create an army on an empty cell and return its id
    pub fn spawn_unit(&mut self, cell: CellId, faction: FactionId, strength: i32, morale: i32) -> UnitId {
        let id = self.allocate_unit_id();
        self.insert_unit(Unit::new(id, faction, strength, morale), cell);
        id
    }

    /// Insert an already-built army (scenario loading keeps ids stable)
    pub fn insert_unit(&mut self, mut unit: Unit, cell: CellId) {
        unit.strength = unit.strength.clamp(0, MAX_STRENGTH);
        unit.clamp_morale();
        unit.cell = None;
        if unit.id.0 >= self.next_unit_id {
            self.next_unit_id = unit.id.0 + 1;
        }
        let id = unit.id;
        self.units.insert(id, unit);
        self.place_unit(id, cell);
    }

    /// Put an army on a cell, detaching it from wherever it stood
    ///
    /// Any army previously linked to `cell` loses its back-reference.
    pub fn place_unit(&mut self, id: UnitId, cell: CellId) {
        self.detach_unit(id);
        if let Some(previous) = self.cells[cell].unit.take() {
            if let Some(unit) = self.units.get_mut(&previous) {
                unit.cell = None;
            }
        }
        if let Some(unit) = self.units.get_mut(&id) {
            unit.cell = Some(cell);
            self.cells[cell].unit = Some(id);
        }
    }

    /// Lift an army off its cell; returns the cell it stood on
    pub fn detach_unit(&mut self, id: UnitId) -> Option<CellId> {
        let unit = self.units.get_mut(&id)?;
        let cell = unit.cell.take()?;
        if self.cells[cell].unit == Some(id) {
            self.cells[cell].unit = None;
        }
        Some(cell)
    }

    /// Mark an army dead and take it off the map
    pub fn remove_unit(&mut self, id: UnitId) {
        self.detach_unit(id);
        if let Some(unit) = self.units.get_mut(&id) {
            unit.removed = true;
        }
    }

    /// Drop removed armies from the table; returns how many were purged
    pub fn purge_removed(&mut self) -> usize {
        let before = self.units.len();
        self.units.retain(|_, u| !u.removed);
        before - self.units.len()
    }
}
