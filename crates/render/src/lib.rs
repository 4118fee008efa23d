//! Display serializers: turn a player's [`Viewport`](shardworld_kernel::Viewport)
//! into the bytes written to its connection.
//!
//! # Invariants
//! - Serializers read the viewport only; they never touch world state.
//! - Output depends on nothing but the viewport passed in.

mod renderer;

pub use renderer::{DebugTextSerializer, JsonSerializer};

pub fn crate_info() -> &'static str {
    "shardworld-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
