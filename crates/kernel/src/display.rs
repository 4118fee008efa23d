//! The data handed to a [`DisplaySerializer`](crate::DisplaySerializer) for
//! one player each tick.

use serde::Serialize;
use shardworld_common::coord::{VIEW_HALF_HEIGHT, VIEW_HALF_WIDTH};
use shardworld_common::{CellId, GlobalCoord};

use crate::entity::Entity;

/// Width of the visible window in tiles.
pub const VIEW_WIDTH: usize = (2 * VIEW_HALF_WIDTH + 1) as usize;
/// Height of the visible window in tiles.
pub const VIEW_HEIGHT: usize = (2 * VIEW_HALF_HEIGHT + 1) as usize;

/// Another entity inside the window, positioned relative to the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibleEntity {
    pub id: String,
    pub dx: i64,
    pub dy: i64,
    pub glyph: char,
    pub kind: &'static str,
    pub health: i32,
}

impl VisibleEntity {
    pub fn of(entity: &Entity, center: GlobalCoord) -> Self {
        Self {
            id: entity.id.short(),
            dx: entity.coord.x - center.x,
            dy: entity.coord.y - center.y,
            glyph: entity.glyph(),
            kind: entity.kind_name(),
            health: entity.health,
        }
    }
}

/// Everything a client sees for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewport {
    pub tick: u64,
    pub population: usize,
    pub load: f64,
    pub location: GlobalCoord,
    pub cell: CellId,
    pub health: i32,
    pub max_health: i32,
    pub collided: bool,
    pub messages: Vec<String>,
    /// Echo of the last move batch's timestamp.
    pub timestamp: u64,
    /// `VIEW_HEIGHT` rows of `VIEW_WIDTH` tile glyphs, the viewer in the middle.
    pub rows: Vec<String>,
    pub entities: Vec<VisibleEntity>,
}

impl Viewport {
    /// Glyph at an offset from the viewer, with entities drawn over tiles.
    pub fn glyph_at(&self, dx: i64, dy: i64) -> Option<char> {
        if dx == 0 && dy == 0 {
            return Some('@');
        }
        if let Some(e) = self.entities.iter().find(|e| e.dx == dx && e.dy == dy) {
            return Some(e.glyph);
        }
        let row = usize::try_from(dy + VIEW_HALF_HEIGHT).ok()?;
        let column = usize::try_from(dx + VIEW_HALF_WIDTH).ok()?;
        self.rows.get(row)?.chars().nth(column)
    }
}
