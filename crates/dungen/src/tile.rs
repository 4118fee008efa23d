use std::path::Path;

use serde::{Deserialize, Serialize};
use shardworld_common::{CELL_HEIGHT, CELL_WIDTH, Direction, LocalCoord};

use crate::error::DungenError;

/// Kind of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tile {
    #[default]
    Unused = 0,
    Wall = 1,
    Floor = 2,
    Corridor = 3,
    Door = 4,
}

impl Tile {
    pub fn is_walkable(self) -> bool {
        matches!(self, Tile::Floor | Tile::Corridor | Tile::Door)
    }

    /// Glyph used by the ASCII map format.
    pub fn glyph(self) -> char {
        match self {
            Tile::Unused => ' ',
            Tile::Wall => '#',
            Tile::Floor => '.',
            Tile::Corridor => ',',
            Tile::Door => '+',
        }
    }

    pub fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            ' ' => Some(Tile::Unused),
            '#' => Some(Tile::Wall),
            '.' => Some(Tile::Floor),
            ',' => Some(Tile::Corridor),
            '+' => Some(Tile::Door),
            _ => None,
        }
    }
}

/// The tiles of one cell, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileMap {
    tiles: Vec<Tile>,
}

impl Default for TileMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TileMap {
    /// A map with every tile unused.
    pub fn new() -> Self {
        Self {
            tiles: vec![Tile::Unused; CELL_WIDTH * CELL_HEIGHT],
        }
    }

    pub fn get(&self, at: LocalCoord) -> Tile {
        self.tiles[at.index()]
    }

    pub fn set(&mut self, at: LocalCoord, tile: Tile) {
        self.tiles[at.index()] = tile;
    }

    pub fn is_walkable(&self, at: LocalCoord) -> bool {
        self.get(at).is_walkable()
    }

    /// All coordinates with their tiles, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (LocalCoord, Tile)> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .map(|(i, t)| (LocalCoord::new(i % CELL_WIDTH, i / CELL_WIDTH), *t))
    }

    pub fn count(&self, tile: Tile) -> usize {
        self.tiles.iter().filter(|t| **t == tile).count()
    }

    pub fn walkable_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_walkable()).count()
    }

    /// Raw tile bytes; two maps are identical exactly when these are.
    pub fn as_bytes(&self) -> Vec<u8> {
        self.tiles.iter().map(|t| *t as u8).collect()
    }

    /// Walls with an unused tile on their outer side, grouped by the
    /// direction they face. Used for maps that did not come from the
    /// generator.
    pub fn exposed_walls(&self) -> [Vec<LocalCoord>; 4] {
        let mut out: [Vec<LocalCoord>; 4] = Default::default();
        for (at, tile) in self.iter() {
            if tile != Tile::Wall {
                continue;
            }
            for dir in Direction::ALL {
                let outward = at.step(dir).map(|o| self.get(o));
                let inward = at.step(dir.opposite()).map(|i| self.get(i));
                if outward == Some(Tile::Unused) && inward.is_some_and(Tile::is_walkable) {
                    out[dir.index()].push(at);
                }
            }
        }
        out
    }

    /// Render as one line per row using the glyphs of [`Tile::glyph`].
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((CELL_WIDTH + 1) * CELL_HEIGHT);
        for row in self.tiles.chunks(CELL_WIDTH) {
            out.extend(row.iter().map(|t| t.glyph()));
            out.push('\n');
        }
        out
    }

    /// Parse the ASCII map format. Short rows and missing rows are padded
    /// with unused tiles.
    pub fn from_ascii(text: &str) -> Result<Self, DungenError> {
        let mut map = Self::new();
        for (row, line) in text.lines().enumerate() {
            if row >= CELL_HEIGHT {
                if line.trim().is_empty() {
                    continue;
                }
                return Err(DungenError::TooManyRows {
                    found: row + 1,
                    max: CELL_HEIGHT,
                });
            }
            let width = line.chars().count();
            if width > CELL_WIDTH {
                return Err(DungenError::RowTooLong {
                    row,
                    found: width,
                    max: CELL_WIDTH,
                });
            }
            for (column, glyph) in line.chars().enumerate() {
                let tile = Tile::from_glyph(glyph).ok_or(DungenError::UnknownGlyph {
                    glyph,
                    row,
                    column,
                })?;
                map.set(LocalCoord::new(column, row), tile);
            }
        }
        Ok(map)
    }

    /// Load an ASCII map file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DungenError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ascii(&text)
    }
}
