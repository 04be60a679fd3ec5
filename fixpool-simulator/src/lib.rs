/*!
# fixpool Simulator

Deterministic workload driver for the buffer pool allocator.

A [`Scenario`] is a flat list of alloc/free operations, either generated
from a seed or loaded from YAML. The [`Simulator`] plays it against any
[`PoolAllocator`] and folds every outcome (which pool and slot served a
request, which requests failed) into a BLAKE3 state hash. Two runs of the
same scenario on the same layout produce the same hash, so a recorded hash
pins down allocator behaviour across changes.

## Key Components:
- **Scenario:** seeded generation, YAML load/save, replay.
- **Simulator:** single-threaded replay with buffer integrity checks.
- **Stress:** several workers hammering one shared allocator.
*/

use blake3::Hasher;
use serde::Serialize;
use tracing::{debug, info};

use fixpool_core::alloc::PoolStats;
use fixpool_core::{BufHandle, PoolAllocator};

pub mod error;
pub mod scenario;
pub mod stress;

pub use error::SimulationError;
pub use scenario::{Scenario, ScenarioOp};
pub use stress::{run_stress, StressReport};

/// Pool index hashed for failures that never reached a pool.
const NO_POOL: u16 = u16::MAX;

/// Buffer held by the simulator, with the byte pattern it was filled with.
struct LiveBuffer {
    handle: BufHandle,
    pattern: u8,
    len: usize,
}

/// Summary of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    /// Hex-encoded BLAKE3 digest of every outcome.
    pub state_hash: String,
    pub operations: usize,
    pub allocations: usize,
    pub failures: usize,
    pub frees: usize,
    /// Most buffers held at once.
    pub peak_live: usize,
    pub pool_stats: Vec<PoolStats>,
}

/// Plays operations against an allocator and hashes the outcomes.
pub struct Simulator<'a> {
    allocator: &'a dyn PoolAllocator,
    live: Vec<LiveBuffer>,
    pub state_hasher: Hasher,
    operations: usize,
    allocations: usize,
    failures: usize,
    frees: usize,
    peak_live: usize,
}

impl<'a> Simulator<'a> {
    pub fn new(allocator: &'a dyn PoolAllocator) -> Self {
        Self {
            allocator,
            live: Vec::new(),
            state_hasher: Hasher::new(),
            operations: 0,
            allocations: 0,
            failures: 0,
            frees: 0,
            peak_live: 0,
        }
    }

    /// Number of buffers currently held.
    pub fn live(&self) -> usize {
        self.live.len()
    }

    /// Applies a single operation.
    ///
    /// `Free { slot }` releases the held buffer at `slot` modulo the number
    /// of held buffers, or does nothing when none are held; generated
    /// scenarios therefore never depend on which allocations succeeded.
    pub fn step(&mut self, op: &ScenarioOp) -> Result<(), SimulationError> {
        let op_index = self.operations;
        self.operations += 1;

        match *op {
            ScenarioOp::Alloc { size } => match self.allocator.alloc(size) {
                Ok(mut handle) => {
                    let pattern = (op_index % 251) as u8;
                    self.allocator.buffer_mut(&mut handle)[..size].fill(pattern);
                    self.hash_slot(b'A', &handle);
                    self.live.push(LiveBuffer {
                        handle,
                        pattern,
                        len: size,
                    });
                    self.allocations += 1;
                    self.peak_live = self.peak_live.max(self.live.len());
                }
                Err(error) => {
                    let pool = error.pool().map_or(NO_POOL, |p| p as u16);
                    self.state_hasher.update(b"F");
                    self.state_hasher.update(&pool.to_le_bytes());
                    self.state_hasher.update(&(size as u64).to_le_bytes());
                    self.failures += 1;
                }
            },
            ScenarioOp::Free { slot } => {
                if self.live.is_empty() {
                    self.state_hasher.update(b"N");
                    return Ok(());
                }
                let buffer = self.live.swap_remove(slot % self.live.len());
                self.release(op_index, buffer)?;
            }
        }
        Ok(())
    }

    /// Applies every operation in order.
    pub fn run(&mut self, ops: &[ScenarioOp]) -> Result<(), SimulationError> {
        for op in ops {
            self.step(op)?;
        }
        Ok(())
    }

    /// Returns every held buffer and summarizes the run. The drain is not
    /// part of the state hash.
    pub fn finish(mut self) -> Result<SimulationReport, SimulationError> {
        let op = self.operations;
        while let Some(buffer) = self.live.pop() {
            self.verify(op, &buffer)?;
            self.allocator.free(buffer.handle);
        }

        let report = SimulationReport {
            state_hash: hex::encode(self.state_hasher.finalize().as_bytes()),
            operations: self.operations,
            allocations: self.allocations,
            failures: self.failures,
            frees: self.frees,
            peak_live: self.peak_live,
            pool_stats: self.allocator.all_pool_stats(),
        };
        info!(
            hash = %report.state_hash,
            operations = report.operations,
            failures = report.failures,
            "simulation complete"
        );
        Ok(report)
    }

    fn release(&mut self, op: usize, buffer: LiveBuffer) -> Result<(), SimulationError> {
        self.verify(op, &buffer)?;
        self.hash_slot(b'R', &buffer.handle);
        self.allocator.free(buffer.handle);
        self.frees += 1;
        Ok(())
    }

    fn verify(&self, op: usize, buffer: &LiveBuffer) -> Result<(), SimulationError> {
        let contents = &self.allocator.buffer(&buffer.handle)[..buffer.len];
        if contents.iter().all(|&b| b == buffer.pattern) {
            Ok(())
        } else {
            debug!(op, handle = ?buffer.handle, "buffer pattern mismatch");
            Err(SimulationError::Corrupted {
                op,
                handle: format!("{:?}", buffer.handle),
            })
        }
    }

    fn hash_slot(&mut self, kind: u8, handle: &BufHandle) {
        self.state_hasher.update(&[kind]);
        self.state_hasher.update(&(handle.pool() as u16).to_le_bytes());
        self.state_hasher.update(&(handle.index() as u32).to_le_bytes());
    }
}

/// Fails with [`SimulationError::Leak`] if any pool still has buffers out.
pub fn check_no_leak(allocator: &dyn PoolAllocator) -> Result<(), SimulationError> {
    let leaked: usize = allocator
        .all_pool_stats()
        .iter()
        .map(|stats| stats.num_allocated)
        .sum();
    if leaked == 0 {
        Ok(())
    } else {
        Err(SimulationError::Leak { leaked })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixpool_core::alloc::{BufferPool, PoolDescriptor, PoolOptions};

    fn reference_pool() -> BufferPool<'static> {
        BufferPool::with_layout(
            &[PoolDescriptor::new(16, 4), PoolDescriptor::new(64, 2)],
            PoolOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_counts_outcomes() {
        let pool = reference_pool();
        let mut simulator = Simulator::new(&pool);
        simulator
            .run(&[
                ScenarioOp::Alloc { size: 10 },
                ScenarioOp::Alloc { size: 64 },
                ScenarioOp::Alloc { size: 65 },
                ScenarioOp::Free { slot: 0 },
                ScenarioOp::Free { slot: 0 },
                ScenarioOp::Free { slot: 0 },
            ])
            .unwrap();
        assert_eq!(simulator.live(), 0);

        let report = simulator.finish().unwrap();
        assert_eq!(report.operations, 6);
        assert_eq!(report.allocations, 2);
        assert_eq!(report.failures, 1);
        assert_eq!(report.frees, 2);
        assert_eq!(report.peak_live, 2);
        assert_eq!(report.state_hash.len(), 64);
        check_no_leak(&pool).unwrap();
    }

    #[test]
    fn test_same_ops_same_hash() {
        let ops: Vec<ScenarioOp> = (0..40)
            .map(|i| {
                if i % 3 == 2 {
                    ScenarioOp::Free { slot: i }
                } else {
                    ScenarioOp::Alloc { size: 1 + i * 3 }
                }
            })
            .collect();

        let hash = || {
            let pool = reference_pool();
            let mut simulator = Simulator::new(&pool);
            simulator.run(&ops).unwrap();
            simulator.finish().unwrap().state_hash
        };
        assert_eq!(hash(), hash());
    }

    #[test]
    fn test_different_outcomes_different_hash() {
        let run = |size| {
            let pool = reference_pool();
            let mut simulator = Simulator::new(&pool);
            simulator.step(&ScenarioOp::Alloc { size }).unwrap();
            simulator.finish().unwrap().state_hash
        };
        assert_ne!(run(16), run(17));
    }

    #[test]
    fn test_finish_returns_held_buffers() {
        let pool = reference_pool();
        let mut simulator = Simulator::new(&pool);
        simulator.step(&ScenarioOp::Alloc { size: 8 }).unwrap();
        simulator.step(&ScenarioOp::Alloc { size: 40 }).unwrap();
        assert!(check_no_leak(&pool).is_err());

        simulator.finish().unwrap();
        check_no_leak(&pool).unwrap();
    }

    #[test]
    fn test_leak_is_reported() {
        let pool = reference_pool();
        let _held = pool.alloc(8).unwrap();
        assert!(matches!(
            check_no_leak(&pool),
            Err(SimulationError::Leak { leaked: 1 })
        ));
    }
}
