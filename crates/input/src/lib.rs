//! Client input: strict parsing of move batches and an in-process
//! connection that hosts and tests can drive directly.
//!
//! # Invariants
//! - A batch is queued whole or not at all.
//! - The world only ever sees normalised lowercase `n`/`e`/`s`/`w` strings.

mod moves;
mod queued;

pub use moves::{InputError, MAX_BATCH, format_moves, parse_moves};
pub use queued::{DEFAULT_OUTBOX, QueuedConnection};

pub fn crate_info() -> &'static str {
    "shardworld-input v0.1.0"
}
