//! Shared types for the shardworld engine: tile-grid coordinates, cell
//! identities and entity identities.
//!
//! # Invariants
//! - A `GlobalCoord` maps to exactly one `CellId` (floor division, so negative
//!   coordinates land in negative cells).
//! - `GlobalCoord::local()` always lies in `[0, CELL_WIDTH) x [0, CELL_HEIGHT)`.

pub mod coord;
pub mod types;

pub use coord::{CELL_HEIGHT, CELL_WIDTH, CellId, Direction, GlobalCoord, LocalCoord};
pub use types::EntityId;
