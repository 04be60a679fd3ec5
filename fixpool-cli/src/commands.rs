use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use opentelemetry::KeyValue;
use tracing::info;

use fixpool_config::{ConfigError, FixpoolConfig};
use fixpool_core::alloc::{build_owned_allocator, AllocFailure, Features, PoolDescriptor};
use fixpool_core::PoolAllocator;
use fixpool_simulator::scenario::validate_hash;
use fixpool_simulator::{run_stress, Scenario};
use fixpool_telemetry::logging::PoolLogger;
use fixpool_telemetry::metrics::MetricsRecorder;

type CommandResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "fixpool", version, about)]
pub struct Cli {
    /// Configuration file; defaults to config/fixpool.yaml plus FIXPOOL_* overrides
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Print the Prometheus text dump after the command
    #[arg(long, global = true)]
    pub metrics: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the region size and per-pool footprint of the configured layout
    Size,
    /// Run a seeded alloc/free workload against the configured allocator
    Simulate(SimulateArgs),
    /// Replay a recorded scenario file
    Replay(ReplayArgs),
    /// Hammer one shared allocator from several threads
    Stress(StressArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Seed for the workload (default from configuration)
    #[arg(long)]
    pub seed: Option<u64>,
    /// Number of operations (default from configuration)
    #[arg(long)]
    pub ops: Option<usize>,
    /// Fail unless the run produces this state hash
    #[arg(long)]
    pub validate_hash: Option<String>,
    /// Save the generated scenario, with its resulting hash, to this file
    #[arg(long)]
    pub record: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    pub scenario: PathBuf,
    /// Overrides the hash recorded in the scenario file
    #[arg(long)]
    pub validate_hash: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct StressArgs {
    #[arg(long)]
    pub threads: Option<usize>,
    /// Operations per thread
    #[arg(long)]
    pub ops: Option<usize>,
}

pub fn load_config(path: Option<&Path>) -> Result<FixpoolConfig, ConfigError> {
    match path {
        Some(path) => FixpoolConfig::load_from_path(path),
        None => FixpoolConfig::load(),
    }
}

pub fn run_command(cli: Cli, mut config: FixpoolConfig, metrics: MetricsRecorder) -> CommandResult {
    let print_metrics = cli.metrics || config.telemetry.print_metrics;

    let allocator = match cli.command {
        Commands::Size => {
            print!("{}", layout_table(&config.layout()));
            return Ok(());
        }
        Commands::Simulate(args) => {
            if let Some(seed) = args.seed {
                config.simulator.seed = seed;
            }
            if let Some(ops) = args.ops {
                config.simulator.operations = ops;
            }
            let mut scenario = Scenario::from_config(&config);
            let allocator = instrumented_allocator(&scenario.pools, &scenario.features, &metrics)?;
            let report = scenario.run_on(&*allocator)?;
            println!("{}", serde_yaml::to_string(&report)?);

            if let Some(path) = args.record {
                scenario.expected_hash = Some(report.state_hash.clone());
                scenario.save(&path)?;
                info!(path = %path.display(), "scenario recorded");
            }
            if let Some(expected) = args.validate_hash {
                validate_hash(&report, &expected)?;
                info!("state hash validated");
            }
            allocator
        }
        Commands::Replay(args) => {
            let mut scenario = Scenario::load(&args.scenario)?;
            if args.validate_hash.is_some() {
                scenario.expected_hash = args.validate_hash;
            }
            let allocator = instrumented_allocator(&scenario.pools, &scenario.features, &metrics)?;
            let report = scenario.run_on(&*allocator)?;
            println!("{}", serde_yaml::to_string(&report)?);
            allocator
        }
        Commands::Stress(args) => {
            if let Some(ops) = args.ops {
                config.simulator.operations = ops;
            }
            let threads = args.threads.unwrap_or(config.simulator.threads);
            let features = config.features.to_features();
            let allocator = instrumented_allocator(&config.layout(), &features, &metrics)?;
            let report = run_stress(&*allocator, threads, &config.simulator)?;
            println!("{}", serde_yaml::to_string(&report)?);
            allocator
        }
    };

    if print_metrics {
        metrics.observe(&*allocator);
        println!("{}", metrics.gather_metrics()?);
    }
    Ok(())
}

/// Builds the allocator and routes failed allocations into the event log
/// and the failure counter.
fn instrumented_allocator(
    layout: &[PoolDescriptor],
    features: &Features,
    metrics: &MetricsRecorder,
) -> Result<Box<dyn PoolAllocator>, Box<dyn std::error::Error + Send + Sync>> {
    let allocator = build_owned_allocator(layout, features)?;
    let metrics = metrics.clone();
    allocator.register_diagnostics_callback(Some(Arc::new(move |failure: &AllocFailure| {
        PoolLogger::log_event(
            "alloc_failure",
            vec![
                KeyValue::new("size", failure.size as i64),
                KeyValue::new("pool", failure.error.pool().map_or(-1, |p| p as i64)),
                KeyValue::new("caller", failure.caller.to_string()),
            ],
        );
        metrics.inc_alloc_failures();
    })));
    Ok(allocator)
}

fn layout_table(layout: &[PoolDescriptor]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>5} {:>10} {:>8} {:>10}", "pool", "elem_size", "count", "bytes");
    for (pool, descriptor) in layout.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>5} {:>10} {:>8} {:>10}",
            pool,
            descriptor.normalized_size(),
            descriptor.element_count,
            descriptor.storage_bytes()
        );
    }
    let _ = writeln!(
        out,
        "region size: {} bytes",
        fixpool_core::alloc::calc_size(layout)
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simulate_flags() {
        let cli = Cli::try_parse_from([
            "fixpool",
            "simulate",
            "--seed",
            "7",
            "--ops",
            "100",
            "--validate-hash",
            "abc",
            "--metrics",
        ])
        .unwrap();
        assert!(cli.metrics);
        match cli.command {
            Commands::Simulate(args) => {
                assert_eq!(args.seed, Some(7));
                assert_eq!(args.ops, Some(100));
                assert_eq!(args.validate_hash.as_deref(), Some("abc"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_replay_with_global_config() {
        let cli =
            Cli::try_parse_from(["fixpool", "--config", "dev.yaml", "replay", "run.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("dev.yaml")));
        assert!(matches!(
            cli.command,
            Commands::Replay(ReplayArgs { ref scenario, .. }) if scenario == Path::new("run.yaml")
        ));
    }

    #[test]
    fn layout_table_reports_region_size() {
        let table = layout_table(&[PoolDescriptor::new(16, 4), PoolDescriptor::new(64, 2)]);
        assert!(table.contains("region size: 224 bytes"));
        assert_eq!(table.lines().count(), 4);
    }

    #[test]
    fn callback_counts_failures() {
        let metrics = MetricsRecorder::new().unwrap();
        let allocator = instrumented_allocator(
            &[PoolDescriptor::new(16, 1)],
            &Features::default(),
            &metrics,
        )
        .unwrap();
        let _held = allocator.alloc(8).unwrap();
        assert!(allocator.alloc(8).is_err());
        assert!(allocator.alloc(17).is_err());
        assert_eq!(metrics.alloc_failures.get(), 2);
    }
}
