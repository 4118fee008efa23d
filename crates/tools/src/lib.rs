//! Developer tooling: world inspector and status summaries.
//!
//! # Invariants
//! - Tools only read the world; nothing here mutates it.

mod inspector;

pub use inspector::{EntityInfo, ShardInfo, WorldInspector, WorldSummary};

pub fn crate_info() -> &'static str {
    "shardworld-tools v0.1.0"
}
