//! Scenario - starting map and armies as JSON
//!
//! The map is drawn as one string per row:
//!
//! | char | cell |
//! |------|------|
//! | `~`  | water |
//! | `.`  | land |
//! | `T`  | town |
//! | `P`  | port |
//! | `0`-`9` | capital of that faction (a town) |
//!
//! Optional `owners` rows use a digit for the owning faction and any other
//! character for unowned. Capitals always belong to their founders.

use crate::board::{Board, Estate, Hex, Terrain};
use crate::engine::refresh_board;
use crate::faction::{Control, FactionId};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Most factions a row map can encode (one digit each)
pub const MAX_FACTIONS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionSetup {
    pub name: String,
    pub control: Control,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSetup {
    pub faction: FactionId,
    pub x: i32,
    pub y: i32,
    pub strength: i32,
    #[serde(default)]
    pub morale: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub factions: Vec<FactionSetup>,
    pub rows: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owners: Option<Vec<String>>,
    #[serde(default)]
    pub units: Vec<UnitSetup>,
}

impl Scenario {
    /// Load from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario: {}", path.display()))?;
        let scenario = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scenario: {}", path.display()))?;
        Ok(scenario)
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write scenario: {}", path.display()))?;
        Ok(())
    }

    /// Three computer factions on a 16x12 island map
    pub fn skirmish() -> Self {
        let rows = [
            "~~~~~~~~~~~~~~~~",
            "~0....T....~~~~~",
            "~.....P~~~..T..~",
            "~.T......~~....~",
            "~......T.......~",
            "~~..P~~....1...~",
            "~~..~~~.....T..~",
            "~.T....T.......~",
            "~......~~~~P...~",
            "~.2.....T......~",
            "~.....T...~~...~",
            "~~~~~~~~~~~~~~~~",
        ];
        let factions = ["Crimson", "Azure", "Verdant"]
            .into_iter()
            .map(|name| FactionSetup {
                name: name.to_string(),
                control: Control::Computer,
            })
            .collect();

        Self {
            name: "skirmish".to_string(),
            factions,
            rows: rows.iter().map(|r| r.to_string()).collect(),
            owners: None,
            units: Vec::new(),
        }
    }

    /// Capture a board as a scenario (derived state is not stored)
    pub fn from_board(name: &str, board: &Board) -> anyhow::Result<Self> {
        if board.faction_count() > MAX_FACTIONS {
            bail!("{} factions do not fit in a row map", board.faction_count());
        }

        let mut rows = Vec::with_capacity(board.height() as usize);
        let mut owners = Vec::with_capacity(board.height() as usize);
        let mut any_owned = false;
        for y in 0..board.height() {
            let mut row = String::with_capacity(board.width() as usize);
            let mut owner_row = String::with_capacity(board.width() as usize);
            for x in 0..board.width() {
                let Some(cell) = board.cell_at(Hex::new(x, y)) else { continue };
                row.push(match (cell.capital_of, cell.terrain, cell.estate) {
                    (Some(f), _, _) => digit(f),
                    (None, Terrain::Water, _) => '~',
                    (None, Terrain::Land, Some(Estate::Town)) => 'T',
                    (None, Terrain::Land, Some(Estate::Port)) => 'P',
                    (None, Terrain::Land, None) => '.',
                });
                match cell.owner {
                    Some(f) if cell.capital_of != Some(f) => {
                        any_owned = true;
                        owner_row.push(digit(f));
                    }
                    Some(f) => owner_row.push(digit(f)),
                    None => owner_row.push('-'),
                }
            }
            rows.push(row);
            owners.push(owner_row);
        }

        let factions = board
            .factions
            .iter()
            .map(|f| FactionSetup {
                name: f.name.clone(),
                control: f.control,
            })
            .collect();
        let units = board
            .active_units()
            .filter_map(|u| {
                let hex = board.hex_of(u.cell()?);
                Some(UnitSetup {
                    faction: u.faction,
                    x: hex.x,
                    y: hex.y,
                    strength: u.strength,
                    morale: u.morale,
                })
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            factions,
            rows,
            owners: any_owned.then_some(owners),
            units,
        })
    }

    /// Build a ready-to-play board with faction aggregates refreshed
    pub fn to_board(&self) -> anyhow::Result<Board> {
        if self.factions.is_empty() {
            bail!("Scenario '{}' has no factions", self.name);
        }
        if self.factions.len() > MAX_FACTIONS {
            bail!("Scenario '{}' has {} factions, at most {} supported", self.name, self.factions.len(), MAX_FACTIONS);
        }
        let height = self.rows.len();
        let width = self.rows.first().map_or(0, |r| r.chars().count());
        if height == 0 || width == 0 {
            bail!("Scenario '{}' has an empty map", self.name);
        }

        let mut board = Board::new(width as i32, height as i32);
        let mut capitals = vec![None; self.factions.len()];

        for (y, row) in self.rows.iter().enumerate() {
            if row.chars().count() != width {
                bail!("Row {} is {} cells wide, expected {}", y, row.chars().count(), width);
            }
            for (x, ch) in row.chars().enumerate() {
                let hex = Hex::new(x as i32, y as i32);
                let id = board.cell_id(hex).context("Map cell outside the board")?;
                match ch {
                    '~' => board.set_terrain(id, Terrain::Water),
                    '.' => {}
                    'T' => board.set_estate(id, Some(Estate::Town)),
                    'P' => board.set_estate(id, Some(Estate::Port)),
                    c => {
                        let Some(f) = c.to_digit(10).map(|d| d as usize) else {
                            bail!("Unknown map character '{}' at {}", c, hex);
                        };
                        let Some(slot) = capitals.get_mut(f) else {
                            bail!("Capital {} at {} names an unknown faction", f, hex);
                        };
                        if slot.is_some() {
                            bail!("Faction {} has more than one capital", f);
                        }
                        *slot = Some(id);
                    }
                }
            }
        }

        for (setup, capital) in self.factions.iter().zip(&capitals) {
            let Some(capital) = *capital else {
                bail!("Faction '{}' has no capital on the map", setup.name);
            };
            board.add_faction(setup.name.clone(), capital, setup.control);
        }

        if let Some(owners) = &self.owners {
            if owners.len() != height {
                bail!("Owner map has {} rows, expected {}", owners.len(), height);
            }
            for (y, row) in owners.iter().enumerate() {
                for (x, ch) in row.chars().enumerate().take(width) {
                    let Some(f) = ch.to_digit(10) else { continue };
                    if f as usize >= self.factions.len() {
                        bail!("Owner {} at ({}, {}) names an unknown faction", f, x, y);
                    }
                    let id = board
                        .cell_id(Hex::new(x as i32, y as i32))
                        .context("Owner cell outside the board")?;
                    if board.cell(id).capital_of.is_none() {
                        board.set_owner(id, Some(f as FactionId));
                    }
                }
            }
        }

        for unit in &self.units {
            let hex = Hex::new(unit.x, unit.y);
            if unit.faction as usize >= self.factions.len() {
                bail!("Army at {} belongs to unknown faction {}", hex, unit.faction);
            }
            if unit.strength < 1 {
                bail!("Army at {} has no soldiers", hex);
            }
            let Some(id) = board.cell_id(hex) else {
                bail!("Army at {} is off the map", hex);
            };
            if board.unit_at(id).is_some() {
                bail!("Two armies start at {}", hex);
            }
            board.spawn_unit(id, unit.faction, unit.strength, unit.morale);
        }

        refresh_board(&mut board);
        Ok(board)
    }
}

fn digit(faction: FactionId) -> char {
    char::from_digit(faction as u32, 10).unwrap_or('?')
}
