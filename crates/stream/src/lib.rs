//! Streaming: which shards to materialise ahead of players, which to cull,
//! and how much of the tick budget each tick consumed.
//!
//! # Invariants
//! - Spawn cells are never proposed for prepopulation or culling.
//! - Only cells near players (or a configured anchor) are ever prepopulated,
//!   which bounds memory and CPU to the player-visible frontier.

mod budget;
mod frontier;

pub use budget::{TickBudget, TickTimer};
pub use frontier::{FrontierPlan, StreamConfig, StreamState, StreamStats, cells_in_radius};

pub fn crate_info() -> &'static str {
    "shardworld-stream v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("stream"));
    }
}
