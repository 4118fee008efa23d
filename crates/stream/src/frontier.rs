use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use shardworld_common::CellId;

/// Frontier configuration: how far around players shards are prepopulated
/// and kept, plus per-tick budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Radius (in cells) around a player that counts as "near": never
    /// prepopulated (the player is already there) and never culled.
    pub active_radius: i64,
    /// Radius (in cells) around a player inside which empty cells are
    /// prepopulated and materialised cells are kept.
    pub preload_radius: i64,
    /// Cells treated as if a player stood in them.
    pub anchors: Vec<CellId>,
    /// Maximum number of cells to prepopulate per tick.
    pub load_budget: usize,
    /// Maximum number of cells to cull per tick.
    pub unload_budget: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            active_radius: 1,
            preload_radius: 2,
            anchors: vec![CellId::new(0, 0)],
            load_budget: 1,
            unload_budget: 1,
        }
    }
}

/// Cells to act on this tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontierPlan {
    /// Not yet materialised, inside the preload ring but outside the active ring.
    pub prepopulate: BTreeSet<CellId>,
    /// Materialised but outside every player's preload ring.
    pub cull: BTreeSet<CellId>,
}

/// Per-tick frontier statistics for instrumentation.
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    pub player_cells: usize,
    pub prepopulate_candidates: usize,
    pub cull_candidates: usize,
    pub plan_time: Duration,
}

/// Plans prepopulation and culling each tick.
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    pub config: StreamConfig,
    stats: StreamStats,
}

impl StreamState {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            stats: StreamStats::default(),
        }
    }

    /// Work out which cells to prepopulate and which to cull, given the cells
    /// holding players, the cells currently materialised and the spawn cells.
    pub fn plan(
        &mut self,
        player_cells: &BTreeSet<CellId>,
        materialized: &BTreeSet<CellId>,
        spawn_cells: &[CellId],
    ) -> FrontierPlan {
        let _span = tracing::debug_span!("frontier_plan").entered();
        let started = Instant::now();

        let mut anchors = player_cells.clone();
        anchors.extend(self.config.anchors.iter().copied());

        let mut active = BTreeSet::new();
        let mut preload = BTreeSet::new();
        for anchor in &anchors {
            active.extend(cells_in_radius(*anchor, self.config.active_radius));
            preload.extend(cells_in_radius(*anchor, self.config.preload_radius));
        }

        let prepopulate: BTreeSet<CellId> = preload
            .iter()
            .filter(|c| !active.contains(c))
            .filter(|c| !materialized.contains(c))
            .filter(|c| !spawn_cells.contains(c))
            .copied()
            .collect();

        let cull: BTreeSet<CellId> = materialized
            .iter()
            .filter(|c| !preload.contains(c))
            .filter(|c| !player_cells.contains(c))
            .filter(|c| !spawn_cells.contains(c))
            .copied()
            .collect();

        self.stats = StreamStats {
            player_cells: player_cells.len(),
            prepopulate_candidates: prepopulate.len(),
            cull_candidates: cull.len(),
            plan_time: started.elapsed(),
        };

        tracing::trace!(
            prepopulate = prepopulate.len(),
            cull = cull.len(),
            players = player_cells.len(),
            "frontier planned"
        );

        FrontierPlan { prepopulate, cull }
    }

    /// Statistics from the last plan.
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }
}

/// All cells within a square radius of a center cell.
pub fn cells_in_radius(center: CellId, radius: i64) -> impl Iterator<Item = CellId> {
    (-radius..=radius)
        .flat_map(move |dy| (-radius..=radius).map(move |dx| CellId::new(center.x + dx, center.y + dy)))
}
