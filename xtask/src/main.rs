use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

/// Plain-main bench targets, as (package, bench).
const BENCHES: &[(&str, &str)] = &[
    ("shardworld-dungen", "bench_generate"),
    ("shardworld-stream", "bench_frontier"),
    ("shardworld-kernel", "bench_tick"),
];

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for shardworld")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// fmt, clippy and the test suite
    Check,
    /// Run the test suite
    Test,
    /// Run every bench, or only those whose name contains FILTER
    Bench { filter: Option<String> },
    /// Run headless simulations over a range of seeds
    Soak {
        #[arg(long, default_value = "4")]
        seeds: u64,
        #[arg(long, default_value = "500")]
        ticks: u64,
        #[arg(long, default_value = "32")]
        bots: usize,
    },
    /// Print the stitched layout of a block of cells around the origin
    Maps {
        #[arg(long, default_value = "1")]
        radius: i64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            cargo("fmt", &["fmt", "--all", "--", "--check"])?;
            cargo(
                "clippy",
                &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
            )?;
            cargo("test", &["test", "--workspace"])?;
        }
        Commands::Test => cargo("test", &["test", "--workspace"])?,
        Commands::Bench { filter } => {
            let selected = BENCHES
                .iter()
                .filter(|(_, bench)| filter.as_deref().is_none_or(|f| bench.contains(f)));
            for &(package, bench) in selected {
                cargo(bench, &["bench", "-p", package, "--bench", bench])?;
            }
        }
        Commands::Soak { seeds, ticks, bots } => {
            let (ticks, bots) = (ticks.to_string(), bots.to_string());
            for seed in 0..seeds {
                let seed = seed.to_string();
                cargo(
                    &format!("soak seed {seed}"),
                    &[
                        "run", "--release", "-q", "-p", "shardworld-cli", "--", "simulate",
                        "--ticks", ticks.as_str(), "--bots", bots.as_str(), "--seed", seed.as_str(),
                    ],
                )?;
            }
        }
        Commands::Maps { radius } => {
            for y in -radius..=radius {
                for x in -radius..=radius {
                    let (x, y) = (x.to_string(), y.to_string());
                    cargo(
                        &format!("generate ({x}, {y})"),
                        &[
                            "run", "-q", "-p", "shardworld-cli", "--", "generate", "--stitched",
                            "--x", x.as_str(), "--y", y.as_str(),
                        ],
                    )?;
                }
            }
        }
    }

    Ok(())
}

fn cargo(what: &str, args: &[&str]) -> Result<()> {
    println!("==> {what}: cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("{what} failed");
    }
    Ok(())
}
