//! Contacts resolved by the coordinator when a move crosses from cell (0, 0)
//! into cell (1, 0), plus pickups inside one shard.

use std::sync::Arc;

use shardworld_common::{CELL_HEIGHT, CELL_WIDTH, CellId, Direction, GlobalCoord, LocalCoord};
use shardworld_dungen::{DungeonCache, Tile, TileMap};
use shardworld_kernel::entity::{ATTACK, LOOT_HEAL, MONSTER_HEALTH, PLAYER_HEALTH};
use shardworld_kernel::{Entity, World, WorldConfig};

const WEST: CellId = CellId::new(0, 0);
const EAST: CellId = CellId::new(1, 0);

fn open_floor() -> TileMap {
    let mut map = TileMap::new();
    for y in 0..CELL_HEIGHT {
        for x in 0..CELL_WIDTH {
            map.set(LocalCoord::new(x, y), Tile::Floor);
        }
    }
    map
}

/// Two open cells side by side. `east` may wall off tiles of cell (1, 0).
fn world_with(east: TileMap) -> World {
    let cache = DungeonCache::default()
        .with_override(WEST, open_floor())
        .with_override(EAST, east);
    let config = WorldConfig {
        seed: Some(5),
        spawn_cells: vec![WEST, EAST],
        prepopulate_monsters: 0,
        prepopulate_guards: 0,
        tick_period_ms: 1,
        ..WorldConfig::default()
    };
    World::with_cache(config, Arc::new(cache))
}

fn world() -> World {
    world_with(open_floor())
}

fn at(x: i64, y: i64) -> GlobalCoord {
    GlobalCoord::new(x, y)
}

#[test]
fn pickups_inside_a_shard_leave_the_index() {
    let mut world = world();
    let player = world.spawn_entity_at(Entity::player(), at(3, 3)).unwrap();
    let loot: Vec<_> = (4..14)
        .map(|x| world.spawn_entity_at(Entity::loot(), at(x, 3)).unwrap())
        .collect();
    assert_eq!(world.entity_count(), 11);

    world.queue_moves(player, "eeeeeeeeee", 0);
    for _ in 0..10 {
        world.tick();
    }

    assert_eq!(world.entity(player).unwrap().coord, at(13, 3));
    assert_eq!(world.entity_count(), 1);
    assert_eq!(world.shard(WEST).unwrap().len(), 1);
    for id in loot {
        assert_eq!(world.entity_cell(id), None);
        assert!(world.entity(id).is_none());
    }
}

#[test]
fn tick_report_counts_only_live_entities() {
    let mut world = world();
    let player = world.spawn_entity_at(Entity::player(), at(10, 10)).unwrap();
    world.spawn_entity_at(Entity::loot(), at(10, 11)).unwrap();
    world.queue_moves(player, "s", 0);
    let report = world.tick();
    assert_eq!(report.entities, 1);
    assert_eq!(report.moves, 1);
}

#[test]
fn players_swap_across_the_boundary() {
    let mut world = world();
    let a = world.spawn_entity_at(Entity::player(), at(79, 5)).unwrap();
    let b = world.spawn_entity_at(Entity::player(), at(80, 5)).unwrap();
    world.queue_moves(a, "e", 0);

    let report = world.tick();
    assert_eq!(report.deferred, 1);
    assert_eq!(world.entity(a).unwrap().coord, at(80, 5));
    assert_eq!(world.entity(b).unwrap().coord, at(79, 5));
    assert_eq!(world.entity_cell(a), Some(EAST));
    assert_eq!(world.entity_cell(b), Some(WEST));
    assert_eq!(world.shard(WEST).unwrap().occupant_id(at(79, 5)), Some(b));
    assert_eq!(world.shard(EAST).unwrap().occupant_id(at(80, 5)), Some(a));
    assert_eq!(world.population(), 2);
}

#[test]
fn fight_across_the_boundary_damages_both() {
    let mut world = world();
    let player = world.spawn_entity_at(Entity::player(), at(79, 5)).unwrap();
    // Phase 0 monsters sit out odd ticks, so it stays put on the first one.
    let monster = world.spawn_entity_at(Entity::monster(), at(80, 5)).unwrap();
    world.queue_moves(player, "e", 0);

    let report = world.tick();
    assert_eq!(report.deferred, 1);
    assert_eq!(report.deaths, 0);

    let p = world.entity(player).unwrap();
    assert_eq!(p.coord, at(79, 5));
    assert_eq!(p.health, PLAYER_HEALTH - ATTACK);
    assert!(p.player_state().unwrap().moves.is_empty());

    let m = world.entity(monster).unwrap();
    assert_eq!(m.coord, at(80, 5));
    assert_eq!(m.health, MONSTER_HEALTH - ATTACK);
    assert_eq!(world.entity_cell(player), Some(WEST));
    assert_eq!(world.entity_cell(monster), Some(EAST));
}

#[test]
fn wall_across_the_boundary_stops_the_mover() {
    let mut east = open_floor();
    east.set(LocalCoord::new(0, 5), Tile::Wall);
    let mut world = world_with(east);
    let player = world.spawn_entity_at(Entity::player(), at(79, 5)).unwrap();
    world.queue_moves(player, "en", 0);

    let report = world.tick();
    assert_eq!(report.deferred, 1);
    assert_eq!(world.entity(player).unwrap().coord, at(79, 5));
    assert_eq!(world.entity_cell(player), Some(WEST));
    let queued: Vec<Direction> =
        world.entity(player).unwrap().player_state().unwrap().moves.iter().copied().collect();
    assert_eq!(queued, vec![Direction::North]);

    world.tick();
    assert_eq!(world.entity(player).unwrap().coord, at(79, 4));
}

#[test]
fn loot_across_the_boundary_is_picked_up() {
    let mut world = world();
    let mut hurt = Entity::player();
    hurt.health = 5;
    let player = world.spawn_entity_at(hurt, at(79, 5)).unwrap();
    let loot = world.spawn_entity_at(Entity::loot(), at(80, 5)).unwrap();
    world.queue_moves(player, "e", 0);

    world.tick();
    let p = world.entity(player).unwrap();
    assert_eq!(p.coord, at(80, 5));
    assert_eq!(p.health, 5 + LOOT_HEAL);
    assert_eq!(world.entity_cell(player), Some(EAST));
    assert_eq!(world.entity_cell(loot), None);
    assert!(world.entity(loot).is_none());
    assert_eq!(world.entity_count(), 1);
    assert!(world.shard(WEST).unwrap().is_empty());
}
