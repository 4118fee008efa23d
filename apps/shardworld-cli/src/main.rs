use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shardworld_common::{CellId, Direction};
use shardworld_dungen::{DungeonCache, Entropy, Generator, TileMap};
use shardworld_input::{QueuedConnection, format_moves};
use shardworld_kernel::{Entity, World, WorldConfig};
use shardworld_render::DebugTextSerializer;
use shardworld_tools::WorldInspector;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shardworld-cli", about = "Headless host for the shardworld simulation")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Print the generated layout of one cell
    Generate {
        #[arg(long, allow_hyphen_values = true, default_value = "0")]
        x: i64,
        #[arg(long, allow_hyphen_values = true, default_value = "0")]
        y: i64,
        /// 32 hex digits of world entropy
        #[arg(long)]
        entropy: Option<Entropy>,
        /// Generate the neighbours and stitch the cell to them first
        #[arg(long)]
        stitched: bool,
    },
    /// Run a simulation driven by random-walking bot players
    Simulate {
        /// Number of ticks to run
        #[arg(short, long, default_value = "100")]
        ticks: u64,
        /// Bot players to connect
        #[arg(short, long, default_value = "8")]
        bots: usize,
        /// Seed for the world and the bots
        #[arg(short, long)]
        seed: Option<u64>,
        /// World configuration (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// ASCII map that replaces cell (0, 0)
        #[arg(short, long)]
        map: Option<PathBuf>,
        /// Sleep off each tick's remaining budget instead of running flat out
        #[arg(long)]
        realtime: bool,
        /// Print the first bot's view at the end
        #[arg(long)]
        show: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info => {
            println!("shardworld-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("dungen: {}", shardworld_dungen::crate_info());
            println!("stream: {}", shardworld_stream::crate_info());
            println!("kernel: {}", shardworld_kernel::crate_info());
            println!("input: {}", shardworld_input::crate_info());
            println!("render: {}", shardworld_render::crate_info());
            println!("tools: {}", shardworld_tools::crate_info());
            let defaults = WorldConfig::default();
            println!(
                "defaults: tick={}ms spawn_cells={} entropy={}",
                defaults.tick_period_ms,
                defaults.spawn_cells.len(),
                defaults.entropy
            );
        }
        Commands::Generate {
            x,
            y,
            entropy,
            stitched,
        } => {
            let config = WorldConfig::default();
            let generator = Generator::new(config.generator, entropy.unwrap_or(config.entropy));
            let cell = CellId::new(x, y);
            let cache = DungeonCache::new(generator, config.cache_capacity);
            if stitched {
                for near in cell.expansion() {
                    cache.ensure(near);
                }
                cache.ensure_stitched(cell);
            }
            let tiles = cache.tiles(cell);
            println!("cell {cell} ({} walkable tiles)", tiles.walkable_count());
            print!("{}", tiles.to_ascii());
        }
        Commands::Simulate {
            ticks,
            bots,
            seed,
            config,
            map,
            realtime,
            show,
        } => simulate(ticks, bots, seed, config, map, realtime, show)?,
    }

    Ok(())
}

fn simulate(
    ticks: u64,
    bots: usize,
    seed: Option<u64>,
    config: Option<PathBuf>,
    map: Option<PathBuf>,
    realtime: bool,
    show: bool,
) -> anyhow::Result<()> {
    let mut config = match &config {
        Some(path) => WorldConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => WorldConfig::default(),
    };
    if seed.is_some() {
        config.seed = seed;
    }
    let seed = config.seed.unwrap_or_else(rand::random);
    config.seed = Some(seed);

    let generator = Generator::new(config.generator.clone(), config.entropy);
    let mut cache = DungeonCache::new(generator, config.cache_capacity);
    if let Some(path) = &map {
        let tiles = TileMap::load(path).with_context(|| format!("loading map {}", path.display()))?;
        cache = cache.with_override(CellId::new(0, 0), tiles);
    }

    let mut world =
        World::with_cache(config, Arc::new(cache)).with_serializer(Arc::new(DebugTextSerializer::status_only()));
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut connections = Vec::with_capacity(bots);
    let mut first = None;
    for _ in 0..bots {
        let conn = Arc::new(QueuedConnection::new());
        match world.new_entity(Entity::connected_player(conn.clone())) {
            Ok(id) => {
                if first.is_none() {
                    first = Some(id);
                }
                connections.push(conn);
            }
            Err(err) => tracing::warn!(%err, "bot could not join"),
        }
    }
    println!("Simulating: seed={seed} bots={} ticks={ticks}", connections.len());

    let report_every = (ticks / 10).max(1);
    for _ in 0..ticks {
        for conn in &connections {
            let len = rng.gen_range(1..=3);
            let moves: Vec<Direction> = (0..len).map(|_| Direction::ALL[rng.gen_range(0..4)]).collect();
            conn.push_moves(&format_moves(&moves), world.tick_number())?;
            // Bots ignore what they are sent.
            conn.drain();
        }
        let report = world.tick();
        if report.tick % report_every == 0 {
            println!(
                "tick {:>5}: {} shards, {} entities, {} moves, {} deferred, {} deaths, load {:.3}",
                report.tick, report.shards, report.entities, report.moves, report.deferred, report.deaths, report.load
            );
        }
        if realtime {
            match world.budget().remaining(report.elapsed) {
                Some(rest) => std::thread::sleep(rest),
                None => tracing::warn!(tick = report.tick, "tick overran its budget"),
            }
        }
    }

    println!("{}", WorldInspector::summary(&world));
    if show {
        if let Some(view) = first.and_then(|id| world.viewport(id)) {
            print!("{}", DebugTextSerializer::new().render(&view));
        }
    }
    Ok(())
}
