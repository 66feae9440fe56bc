// Headless runner for bnsim.
//
// Loads a JSON run description (see `runspec.rs`), builds the world, runs
// it to completion and prints the run summary as JSON on stdout. Logging
// goes to stderr through `tracing`; set `RUST_LOG` to change the level
// (default `info`).
//
// Usage:
//   bnsim-run <RUN.json> [OPTIONS]
//     --seed <N>        Override the config seed
//     --workers <N>     Override the worker count
//     --steps <N>       Run exactly N steps instead of up to run_length

use std::path::PathBuf;
use std::process::ExitCode;

use bnsim_sim::runspec::RunSpec;
use bnsim_sim::world::RunSummary;
use tracing_subscriber::EnvFilter;

struct Args {
    path: PathBuf,
    seed: Option<u64>,
    workers: Option<usize>,
    steps: Option<u64>,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();
    let mut spec = match RunSpec::load(&args.path) {
        Ok(spec) => spec,
        Err(e) => {
            tracing::error!(error = %e, "could not load run description");
            return ExitCode::FAILURE;
        }
    };
    if let Some(seed) = args.seed {
        spec.config.seed = seed;
    }
    if let Some(workers) = args.workers {
        spec.config.workers = workers;
    }

    let mut world = match spec.build() {
        Ok(world) => world,
        Err(e) => {
            tracing::error!(error = %e, "could not build world");
            return ExitCode::FAILURE;
        }
    };

    let summary = match args.steps {
        Some(steps) => {
            let mut summary = RunSummary::default();
            for _ in 0..steps {
                let report = world.run_one_step();
                summary.births += report.births;
                summary.deaths += report.deaths;
                summary.faults += report.faults;
                for species in report.unstable_species {
                    if !summary.unstable_species.contains(&species) {
                        summary.unstable_species.push(species);
                    }
                }
            }
            summary.steps = world.step_count();
            summary.time = world.current_time();
            summary.agents = world.total_agent_count();
            summary.active_agents = world.active_agent_count();
            summary
        }
        None => world.run(),
    };

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "could not encode summary");
            ExitCode::FAILURE
        }
    }
}

/// Parse command-line arguments with plain `std::env::args()` matching.
fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut path = None;
    let mut seed = None;
    let mut workers = None;
    let mut steps = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--seed" => {
                i += 1;
                seed = Some(parse_value(&args, i, "--seed"));
            }
            "--workers" => {
                i += 1;
                workers = Some(parse_value(&args, i, "--workers"));
            }
            "--steps" => {
                i += 1;
                steps = Some(parse_value(&args, i, "--steps"));
            }
            "--help" | "-h" => {
                eprintln!("Usage: bnsim-run <RUN.json> [--seed N] [--workers N] [--steps N]");
                std::process::exit(0);
            }
            other if path.is_none() && !other.starts_with("--") => {
                path = Some(PathBuf::from(other));
            }
            other => {
                eprintln!("Unknown argument: {other}");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(path) = path else {
        eprintln!("Usage: bnsim-run <RUN.json> [--seed N] [--workers N] [--steps N]");
        std::process::exit(1);
    };
    Args {
        path,
        seed,
        workers,
        steps,
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
        eprintln!("{flag} requires a numeric value");
        std::process::exit(1);
    })
}
