//! Multi-threaded stress run against one shared allocator.
//!
//! Interleavings differ between runs, so per-worker hashes are reported
//! but not comparable; the checks that matter are buffer integrity inside
//! each worker and an empty allocator once every worker has finished.

use serde::Serialize;
use tracing::{info, warn};

use fixpool_config::SimulatorConfig;
use fixpool_core::alloc::PoolStats;
use fixpool_core::PoolAllocator;

use crate::scenario::generate_ops;
use crate::{check_no_leak, SimulationError, SimulationReport, Simulator};

#[derive(Debug, Clone, Serialize)]
pub struct StressReport {
    pub threads: usize,
    pub allocations: usize,
    pub failures: usize,
    pub frees: usize,
    pub workers: Vec<SimulationReport>,
    pub pool_stats: Vec<PoolStats>,
}

/// Runs `threads` workers, each with `config.operations` operations drawn
/// from `config.seed + worker`.
pub fn run_stress(
    allocator: &dyn PoolAllocator,
    threads: usize,
    config: &SimulatorConfig,
) -> Result<StressReport, SimulationError> {
    let threads = threads.max(1);
    info!(threads, ops = config.operations, "starting stress run");

    let outcomes = crossbeam::thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|worker| {
                let ops = generate_ops(config.seed.wrapping_add(worker as u64), config);
                s.builder()
                    .name(format!("fixpool-stress-{worker}"))
                    .spawn(move |_| {
                        let mut simulator = Simulator::new(allocator);
                        simulator.run(&ops)?;
                        simulator.finish()
                    })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(worker, handle)| match handle {
                Ok(handle) => handle
                    .join()
                    .unwrap_or(Err(SimulationError::WorkerPanicked(worker))),
                Err(e) => Err(SimulationError::Io(e)),
            })
            .collect::<Vec<_>>()
    })
    .map_err(|_| SimulationError::WorkerPanicked(usize::MAX))?;

    let workers = outcomes.into_iter().collect::<Result<Vec<_>, _>>()?;
    if let Err(e) = check_no_leak(allocator) {
        warn!(error = %e, "allocator not empty after stress run");
        return Err(e);
    }

    let report = StressReport {
        threads,
        allocations: workers.iter().map(|w| w.allocations).sum(),
        failures: workers.iter().map(|w| w.failures).sum(),
        frees: workers.iter().map(|w| w.frees).sum(),
        pool_stats: allocator.all_pool_stats(),
        workers,
    };
    info!(
        allocations = report.allocations,
        failures = report.failures,
        "stress run complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixpool_core::alloc::{build_owned_allocator, Features, PoolDescriptor};

    #[test]
    fn test_stress_leaves_allocator_empty() {
        let layout = [
            PoolDescriptor::new(16, 8),
            PoolDescriptor::new(64, 8),
            PoolDescriptor::new(256, 4),
        ];
        let allocator = build_owned_allocator(&layout, &Features::diagnostic()).unwrap();
        let config = SimulatorConfig {
            seed: 9,
            operations: 2_000,
            max_request: 300,
            free_ratio: 0.5,
            threads: 4,
        };

        let report = run_stress(&*allocator, config.threads, &config).unwrap();
        assert_eq!(report.workers.len(), 4);
        assert_eq!(
            report.workers.iter().map(|w| w.operations).sum::<usize>(),
            8_000
        );
        assert!(report.failures > 0);
        assert!(report.pool_stats.iter().all(|s| s.num_allocated == 0));
        let histogram = allocator.alloc_histogram().unwrap();
        assert_eq!(histogram.total() as usize, report.allocations + report.failures);
    }

    #[test]
    fn test_zero_threads_runs_one_worker() {
        let allocator =
            build_owned_allocator(&[PoolDescriptor::new(32, 2)], &Features::default()).unwrap();
        let config = SimulatorConfig {
            operations: 50,
            max_request: 32,
            ..SimulatorConfig::default()
        };
        let report = run_stress(&*allocator, 0, &config).unwrap();
        assert_eq!(report.threads, 1);
    }
}
