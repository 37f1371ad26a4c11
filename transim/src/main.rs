use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use transim_core::profiling::{init_tracy, TraceLevel};
use transim_core::{step_world, CommandQueue, SimConfig};

mod scenario;

#[cfg(feature = "tracy")]
#[global_allocator]
static GLOBAL: tracy_client::ProfiledAllocator<std::alloc::System> =
    tracy_client::ProfiledAllocator::new(std::alloc::System, 100);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file with simulation settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of ticks to run
    #[arg(short, long, default_value_t = 740)]
    ticks: u32,

    /// Map width in tiles
    #[arg(long, default_value_t = 64)]
    width: u32,

    /// Map height in tiles
    #[arg(long, default_value_t = 16)]
    height: u32,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Tracy span level (info, debug, trace); only used with the tracy feature
    #[arg(long, default_value = "info")]
    trace_level: TraceLevel,
}

fn load_config(path: Option<&PathBuf>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    SimConfig::from_json_str(&json).with_context(|| format!("parsing config {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = std::str::FromStr::from_str(&args.log_level).unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
    init_tracy(args.trace_level);

    let config = load_config(args.config.as_ref())?;
    log::info!("Starting transim with seed {}", config.seed);

    let mut state = scenario::build(args.width, args.height, &config)?;
    let mut net = CommandQueue::default();

    for _ in 0..args.ticks {
        let report = step_world(&mut state, &[], &mut net, config.checksum_frequency);
        if let Some(checksum) = report.checksum {
            println!("tick {} checksum {checksum:016x}", report.tick);
        }
    }

    for front in state.train_fronts() {
        if let Some(c) = state.consist(front) {
            log::info!("train {front}: speed {}, order {}", c.speed, c.orders.current);
        }
    }
    log::info!("Simulation finished at tick {}", state.tick);

    Ok(())
}
