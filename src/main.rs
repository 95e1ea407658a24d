use clap::Parser;
use log::error;

use safe_intersection::simulation::{self, IntersectionKind, SimConfig};

#[derive(Parser)]
#[command(name = "safe_intersection")]
#[command(about = "Drive car threads through a stop sign or a traffic light")]
struct Cli {
    /// Intersection to simulate
    #[arg(long, value_enum, default_value = "stop-sign")]
    intersection: IntersectionKind,

    /// Number of car threads to spawn
    #[arg(long, default_value = "40")]
    cars: usize,

    /// Seed for reproducible car generation
    #[arg(long)]
    seed: Option<u64>,

    /// Base crossing time in milliseconds
    #[arg(long, default_value = "5")]
    crossing_ms: u64,

    /// Maximum random extra crossing time in milliseconds
    #[arg(long, default_value = "5")]
    jitter_ms: u64,

    /// Window in milliseconds over which cars arrive
    #[arg(long, default_value = "50")]
    arrival_spread_ms: u64,

    /// Cars a traffic light admits per green phase
    #[arg(long, default_value = "4")]
    phase_quota: usize,
}

impl From<Cli> for SimConfig {
    fn from(cli: Cli) -> Self {
        Self {
            intersection: cli.intersection,
            cars: cli.cars,
            seed: cli.seed,
            crossing_ms: cli.crossing_ms,
            jitter_ms: cli.jitter_ms,
            arrival_spread_ms: cli.arrival_spread_ms,
            phase_quota: cli.phase_quota,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SimConfig::from(Cli::parse());

    if let Err(e) = run_headless(&config) {
        error!("Simulation failed: {:#}", e);
        std::process::exit(1);
    }
}

/// Run the simulation and report its statistics
fn run_headless(config: &SimConfig) -> anyhow::Result<()> {
    let stats = simulation::run(config)?;
    stats.log_summary();

    if stats.violations > 0 {
        anyhow::bail!("{} traffic violations recorded", stats.violations);
    }
    if stats.cars_completed != stats.cars_spawned {
        anyhow::bail!(
            "{} of {} cars completed",
            stats.cars_completed,
            stats.cars_spawned
        );
    }
    Ok(())
}
