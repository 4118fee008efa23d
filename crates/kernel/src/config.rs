use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shardworld_common::CellId;
use shardworld_dungen::{DEFAULT_CACHE_CAPACITY, Entropy, GeneratorConfig};
use shardworld_stream::StreamConfig;

use crate::error::KernelError;

/// Cells that are always materialised and never culled.
pub fn default_spawn_cells() -> Vec<CellId> {
    vec![
        CellId::new(0, 0),
        CellId::new(0, 1),
        CellId::new(1, 0),
        CellId::new(1, 1),
        CellId::new(-1, -1),
        CellId::new(-1, 0),
        CellId::new(0, -1),
    ]
}

/// Tunables for a [`World`](crate::World). Every field has a default, so a
/// config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Global entropy mixed into every cell seed.
    pub entropy: Entropy,
    /// Seed for spawn placement, phases and patrols. `None` seeds from the OS.
    pub seed: Option<u64>,
    pub spawn_cells: Vec<CellId>,
    pub tick_period_ms: u64,
    /// Random coordinates tried when placing an entity in a cell.
    pub placement_tries: usize,
    /// Monsters spawned into a prepopulated cell.
    pub prepopulate_monsters: usize,
    /// Guards spawned into a prepopulated cell, after the monsters.
    pub prepopulate_guards: usize,
    /// Placement tries per prepopulated entity.
    pub prepopulate_tries: usize,
    /// Node expansions allowed per pathfinding call.
    pub path_budget: usize,
    /// Moves a player may have queued at once.
    pub max_queued_moves: usize,
    /// Players are turned away beyond this population.
    pub max_population: usize,
    pub cache_capacity: usize,
    pub generator: GeneratorConfig,
    pub stream: StreamConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entropy: Entropy::default(),
            seed: None,
            spawn_cells: default_spawn_cells(),
            tick_period_ms: 125,
            placement_tries: 100,
            prepopulate_monsters: 10,
            prepopulate_guards: 1,
            prepopulate_tries: 50,
            path_budget: 150,
            max_queued_moves: 32,
            max_population: 1000,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            generator: GeneratorConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl WorldConfig {
    pub fn from_yaml(text: &str) -> Result<Self, KernelError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, KernelError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms.max(1))
    }
}
