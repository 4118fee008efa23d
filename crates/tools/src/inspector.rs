use std::collections::BTreeMap;

use serde::Serialize;
use shardworld_common::{CellId, Direction, EntityId, GlobalCoord};
use shardworld_kernel::World;

/// World inspector for developer tooling.
///
/// Read-only queries against a world between ticks, for status lines,
/// debugging and the CLI.
pub struct WorldInspector;

impl WorldInspector {
    pub fn summary(world: &World) -> WorldSummary {
        let mut kinds: BTreeMap<&'static str, usize> = BTreeMap::new();
        for cell in world.shard_cells() {
            if let Some(shard) = world.shard(cell) {
                for entity in shard.entities() {
                    *kinds.entry(entity.kind_name()).or_default() += 1;
                }
            }
        }
        let timer = world.tick_timer();
        WorldSummary {
            tick: world.tick_number(),
            population: world.population(),
            entity_count: world.entity_count(),
            shard_count: world.shard_count(),
            cached_cells: world.cache().len(),
            load: world.load(),
            timed_ticks: timer.count(),
            avg_tick_us: timer.average().as_micros() as u64,
            min_tick_us: timer.min().as_micros() as u64,
            max_tick_us: timer.max().as_micros() as u64,
            kinds,
        }
    }

    pub fn inspect_entity(world: &World, id: EntityId) -> Option<EntityInfo> {
        world.entity(id).map(|e| EntityInfo {
            id,
            kind: e.kind_name(),
            coord: e.coord,
            cell: e.coord.cell(),
            health: e.health,
            max_health: e.max_health,
            facing: e.facing,
            queued_moves: e.player_state().map_or(0, |p| p.moves.len()),
        })
    }

    /// Every placed entity, in shard then id order.
    pub fn list_entities(world: &World) -> Vec<EntityId> {
        world
            .shard_cells()
            .filter_map(|cell| world.shard(cell))
            .flat_map(|shard| shard.entities().map(|e| e.id))
            .collect()
    }

    pub fn shards(world: &World) -> Vec<ShardInfo> {
        world
            .shard_cells()
            .filter_map(|cell| world.shard(cell))
            .map(|shard| ShardInfo {
                cell: shard.cell(),
                entities: shard.len(),
                players: shard.player_count(),
                spawn: world.is_spawn_cell(shard.cell()),
            })
            .collect()
    }
}

/// Summary of world state for the inspector.
#[derive(Debug, Clone, Serialize)]
pub struct WorldSummary {
    pub tick: u64,
    pub population: usize,
    pub entity_count: usize,
    pub shard_count: usize,
    pub cached_cells: usize,
    pub load: f64,
    /// Ticks in the timing window, and their durations.
    pub timed_ticks: usize,
    pub avg_tick_us: u64,
    pub min_tick_us: u64,
    pub max_tick_us: u64,
    /// Placed entities by kind.
    pub kinds: BTreeMap<&'static str, usize>,
}

impl WorldSummary {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            tracing::warn!(%err, "failed to encode world summary");
            String::from("{}")
        })
    }
}

impl std::fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "World: tick={} population={} entities={} shards={} cached_cells={} load={:.2} \
             tick_us avg={} min={} max={} over {}",
            self.tick,
            self.population,
            self.entity_count,
            self.shard_count,
            self.cached_cells,
            self.load,
            self.avg_tick_us,
            self.min_tick_us,
            self.max_tick_us,
            self.timed_ticks
        )
    }
}

/// Detailed info about a single entity.
#[derive(Debug, Clone, Serialize)]
pub struct EntityInfo {
    pub id: EntityId,
    pub kind: &'static str,
    pub coord: GlobalCoord,
    pub cell: CellId,
    pub health: i32,
    pub max_health: i32,
    pub facing: Direction,
    pub queued_moves: usize,
}

impl std::fmt::Display for EntityInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] at {} in {} hp {}/{} facing {:?}",
            self.kind,
            self.id.short(),
            self.coord,
            self.cell,
            self.health,
            self.max_health,
            self.facing
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardInfo {
    pub cell: CellId,
    pub entities: usize,
    pub players: usize,
    pub spawn: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardworld_kernel::{Entity, WorldConfig};

    fn world() -> World {
        World::new(WorldConfig {
            seed: Some(1),
            spawn_cells: vec![CellId::new(0, 0)],
            prepopulate_monsters: 0,
            ..WorldConfig::default()
        })
    }

    #[test]
    fn summary_empty_world() {
        let w = world();
        let summary = WorldInspector::summary(&w);
        assert_eq!(summary.tick, 0);
        assert_eq!(summary.entity_count, 0);
        assert_eq!(summary.shard_count, 1);
        assert!(summary.cached_cells >= 1);
        assert!(summary.kinds.is_empty());
        assert_eq!(summary.timed_ticks, 0);
        assert_eq!(summary.max_tick_us, 0);
    }

    #[test]
    fn summary_reports_tick_timing() {
        let mut w = world();
        for _ in 0..3 {
            w.tick();
        }
        let summary = WorldInspector::summary(&w);
        assert_eq!(summary.timed_ticks, 3);
        assert!(summary.min_tick_us <= summary.avg_tick_us);
        assert!(summary.avg_tick_us <= summary.max_tick_us);
        assert!(summary.to_string().contains("over 3"));
    }

    #[test]
    fn summary_counts_kinds() {
        let mut w = world();
        w.new_entity(Entity::player()).unwrap();
        w.new_entity(Entity::monster()).unwrap();
        w.new_entity(Entity::monster()).unwrap();

        let summary = WorldInspector::summary(&w);
        assert_eq!(summary.population, 1);
        assert_eq!(summary.entity_count, 3);
        assert_eq!(summary.kinds.get("monster"), Some(&2));
        assert_eq!(summary.kinds.get("player"), Some(&1));

        let json: serde_json::Value = serde_json::from_str(&summary.to_json()).unwrap();
        assert_eq!(json["entity_count"], 3);
        assert!(format!("{summary}").contains("population=1"));
    }

    #[test]
    fn inspect_entity_found_and_missing() {
        let mut w = world();
        let id = w.new_entity(Entity::player()).unwrap();
        w.queue_moves(id, "nn", 0);

        let info = WorldInspector::inspect_entity(&w, id).unwrap();
        assert_eq!(info.kind, "player");
        assert_eq!(info.cell, CellId::new(0, 0));
        assert_eq!(info.queued_moves, 2);
        assert!(info.to_string().starts_with("player ["));

        assert!(WorldInspector::inspect_entity(&w, EntityId::new()).is_none());
    }

    #[test]
    fn lists_entities_and_shards() {
        let mut w = world();
        let a = w.new_entity(Entity::player()).unwrap();
        let b = w.new_entity(Entity::monster()).unwrap();
        let ids = WorldInspector::list_entities(&w);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a) && ids.contains(&b));

        let shards = WorldInspector::shards(&w);
        assert_eq!(
            shards,
            vec![ShardInfo {
                cell: CellId::new(0, 0),
                entities: 2,
                players: 1,
                spawn: true,
            }]
        );
    }
}
