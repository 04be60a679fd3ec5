//! ## fixpool-cli
//! **Operational interface for the buffer pool allocator**
//! Layout sizing, deterministic simulation, scenario replay and
//! multi-threaded stress runs.
//!
//! ### Expectations:
//! - Every command runs against the configured layout and features
//! - Failed allocations are logged and counted through the diagnostics
//!   callback

use clap::Parser;
use fixpool_telemetry::logging::PoolLogger;
use fixpool_telemetry::metrics::MetricsRecorder;
use tracing::error;

mod commands;

use commands::Cli;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let config = match commands::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            PoolLogger::init("info");
            error!(error = %e, "failed to load configuration");
            return Err(e.into());
        }
    };
    PoolLogger::init(&config.telemetry.log_level);
    let metrics = MetricsRecorder::new()?;

    commands::run_command(cli, config, metrics)
}
