use std::hint::black_box;
use std::time::Instant;

use shardworld_common::{CellId, Direction};
use shardworld_dungen::{DungeonCache, Generator};

fn bench_generate(iterations: usize) {
    let generator = Generator::default();
    let start = Instant::now();
    for i in 0..iterations {
        let cell = CellId::new(i as i64, -(i as i64));
        let _ = black_box(generator.generate(black_box(cell)));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  generate ({iterations} cells): {per_iter:?}/cell, total {elapsed:?}");
}

fn bench_cached_lookup(iterations: usize) {
    let cache = DungeonCache::default();
    cache.ensure(CellId::new(0, 0));
    let start = Instant::now();
    for i in 0..iterations {
        let coord = shardworld_common::GlobalCoord::new((i % 79) as i64, (i % 25) as i64);
        let _ = black_box(cache.walkable_at(black_box(coord)));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  cached walkable_at ({iterations} lookups): {per_iter:?}/lookup, total {elapsed:?}");
}

fn bench_stitch(side: i64) {
    let cache = DungeonCache::default();
    for y in 0..side {
        for x in 0..side {
            cache.ensure(CellId::new(x, y));
        }
    }
    let start = Instant::now();
    for y in 0..side {
        for x in 0..side {
            cache.ensure_stitched(CellId::new(x, y));
        }
    }
    let elapsed = start.elapsed();
    let stitched = (0..side)
        .flat_map(|y| (0..side).map(move |x| CellId::new(x, y)))
        .filter(|c| cache.is_stitched(*c, Direction::East))
        .count();
    println!("  stitch ({side}x{side} grid, {stitched} east edges): total {elapsed:?}");
}

fn main() {
    println!("=== Dungeon Generation Benchmarks ===\n");

    println!("Generation:");
    bench_generate(100);
    bench_generate(1000);

    println!("\nCache lookups:");
    bench_cached_lookup(100_000);

    println!("\nStitching:");
    bench_stitch(4);
    bench_stitch(10);

    println!("\n=== Done ===");
}
