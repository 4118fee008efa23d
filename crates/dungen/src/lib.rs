//! Dungeon generation: one procedurally generated tile layout per cell,
//! memoised in a shared cache and stitched to its neighbours on demand.
//!
//! # Invariants
//! - A cell's layout is a pure function of (cell identity, entropy) until stitched.
//! - Generation never touches a cell's outermost rows/columns; only stitching does.
//! - Each edge of a cell is stitched at most once, and stitching only turns
//!   unused tiles into corridor (plus at most one breakout wall into a door).

mod cache;
mod error;
mod generator;
mod tile;

pub use cache::{DEFAULT_CACHE_CAPACITY, DungeonCache};
pub use error::DungenError;
pub use generator::{Breakouts, Entropy, GeneratedCell, Generator, GeneratorConfig};
pub use tile::{Tile, TileMap};

pub fn crate_info() -> &'static str {
    "shardworld-dungen v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("dungen"));
    }
}
