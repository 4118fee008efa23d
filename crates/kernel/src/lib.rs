//! World Kernel: authoritative world state and the tick loop.
//!
//! # Invariants
//! - An entity's coordinate always lies in the cell of the shard that owns it.
//! - The entity → cell index is written only by the coordinating thread.
//! - Shards are mutated in parallel only inside `update_movers`; every
//!   cross-shard effect is queued and applied sequentially afterwards.

pub mod config;
pub mod connection;
pub mod display;
pub mod entity;
pub mod error;
pub mod pathfind;
pub mod patrol;
pub mod shard;
pub mod world;

pub use config::WorldConfig;
pub use connection::{Connection, DisplaySerializer, MoveRequest};
pub use display::{Viewport, VisibleEntity};
pub use entity::{Contact, Detection, Entity, EntityKind, LootState, MonsterState, PlayerState};
pub use error::{KernelError, SpawnRejected};
pub use pathfind::{PathResult, find_path};
pub use patrol::Patrol;
pub use shard::{DeferredMove, MoveOutcome, Shard, TickContext};
pub use world::{TickReport, World};

/// Returns crate name and version for diagnostics.
pub fn crate_info() -> &'static str {
    "shardworld-kernel v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("kernel"));
    }
}
