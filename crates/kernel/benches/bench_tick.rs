use std::hint::black_box;
use std::time::Instant;

use shardworld_common::CellId;
use shardworld_kernel::{Entity, World, WorldConfig};

fn world(players: usize) -> World {
    let config = WorldConfig {
        seed: Some(7),
        spawn_cells: vec![CellId::new(0, 0), CellId::new(1, 0), CellId::new(0, 1), CellId::new(1, 1)],
        prepopulate_monsters: 10,
        ..WorldConfig::default()
    };
    let mut world = World::new(config);
    let mut ids = Vec::with_capacity(players);
    for _ in 0..players {
        if let Ok(id) = world.new_entity(Entity::player()) {
            ids.push(id);
        }
    }
    for id in ids {
        world.queue_moves(id, "nesw".repeat(8).as_str(), 0);
    }
    world
}

fn bench_tick(players: usize, ticks: usize) {
    let mut world = world(players);
    // Warm the frontier so generation is not measured.
    world.tick();

    let start = Instant::now();
    let mut moves = 0;
    for _ in 0..ticks {
        moves += black_box(world.tick()).moves;
    }
    let elapsed = start.elapsed();
    let per_tick = elapsed / ticks as u32;
    println!(
        "  tick ({players} players, {} shards, {ticks} ticks): {per_tick:?}/tick, {moves} moves, load {:.3}",
        world.shard_count(),
        world.load()
    );
}

fn main() {
    println!("=== World Tick Benchmarks ===\n");
    bench_tick(1, 200);
    bench_tick(50, 100);
    bench_tick(500, 50);
    println!("\n=== Done ===");
}
