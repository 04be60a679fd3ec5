//! Recorded and generated workloads.
//!
//! A scenario carries everything needed to reproduce a run: the pool
//! layout, the allocator features, the operations and optionally the
//! state hash the run must produce.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use fixpool_config::{FixpoolConfig, SimulatorConfig};
use fixpool_core::alloc::{build_owned_allocator, Features, PoolDescriptor};
use fixpool_core::PoolAllocator;

use crate::{check_no_leak, SimulationError, SimulationReport, Simulator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScenarioOp {
    Alloc { size: usize },
    Free { slot: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub seed: u64,
    pub pools: Vec<PoolDescriptor>,
    #[serde(default)]
    pub features: Features,
    pub ops: Vec<ScenarioOp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_hash: Option<String>,
}

impl Scenario {
    /// Draws `config.operations` operations from a `StdRng` seeded with
    /// `config.seed`.
    pub fn generate(
        pools: Vec<PoolDescriptor>,
        features: Features,
        config: &SimulatorConfig,
    ) -> Self {
        Self {
            seed: config.seed,
            pools,
            features,
            ops: generate_ops(config.seed, config),
            expected_hash: None,
        }
    }

    /// Generates the workload described by a full configuration.
    pub fn from_config(config: &FixpoolConfig) -> Self {
        Self::generate(
            config.layout(),
            config.features.to_features(),
            &config.simulator,
        )
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SimulationError> {
        let contents = std::fs::read_to_string(path)?;
        let scenario: Self = serde_yaml::from_str(&contents)?;
        if scenario.pools.is_empty() {
            return Err(SimulationError::Scenario("no pools declared".into()));
        }
        if scenario.ops.is_empty() {
            return Err(SimulationError::Scenario("no operations".into()));
        }
        Ok(scenario)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SimulationError> {
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Replays the scenario on a freshly built allocator.
    pub fn run(&self) -> Result<SimulationReport, SimulationError> {
        let allocator = build_owned_allocator(&self.pools, &self.features)?;
        self.run_on(&*allocator)
    }

    /// Replays the scenario on `allocator`, which must be idle and built
    /// for this scenario's layout.
    ///
    /// Fails if a buffer was corrupted, if anything leaked, or if the
    /// resulting hash differs from `expected_hash`.
    pub fn run_on(&self, allocator: &dyn PoolAllocator) -> Result<SimulationReport, SimulationError> {
        if allocator.pool_count() != self.pools.len() {
            return Err(SimulationError::Scenario(format!(
                "allocator has {} pools, scenario declares {}",
                allocator.pool_count(),
                self.pools.len()
            )));
        }
        info!(
            seed = self.seed,
            ops = self.ops.len(),
            pools = self.pools.len(),
            "replaying scenario"
        );

        let mut simulator = Simulator::new(allocator);
        simulator.run(&self.ops)?;
        let report = simulator.finish()?;
        check_no_leak(allocator)?;

        if let Some(expected) = &self.expected_hash {
            validate_hash(&report, expected)?;
        }
        Ok(report)
    }
}

/// Compares a run's hash against a recorded one.
pub fn validate_hash(report: &SimulationReport, expected: &str) -> Result<(), SimulationError> {
    if report.state_hash.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(SimulationError::HashMismatch {
            expected: expected.to_owned(),
            actual: report.state_hash.clone(),
        })
    }
}

/// Generation tracks how many buffers would be held if every allocation
/// succeeded; replay resolves free slots modulo what is actually held.
pub(crate) fn generate_ops(seed: u64, config: &SimulatorConfig) -> Vec<ScenarioOp> {
    let mut rng = StdRng::seed_from_u64(seed);
    let free_ratio = config.free_ratio.clamp(0.0, 1.0);
    let max_request = config.max_request.max(1);
    let mut held = 0usize;
    (0..config.operations)
        .map(|_| {
            if held > 0 && rng.random_bool(free_ratio) {
                let slot = rng.random_range(0..held);
                held -= 1;
                ScenarioOp::Free { slot }
            } else {
                held += 1;
                ScenarioOp::Alloc {
                    size: rng.random_range(1..=max_request),
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> SimulatorConfig {
        SimulatorConfig {
            seed,
            operations: 500,
            max_request: 80,
            free_ratio: 0.5,
            threads: 1,
        }
    }

    fn reference_layout() -> Vec<PoolDescriptor> {
        vec![PoolDescriptor::new(16, 4), PoolDescriptor::new(64, 2)]
    }

    #[test]
    fn test_generation_is_seeded() {
        let a = Scenario::generate(reference_layout(), Features::default(), &small_config(7));
        let b = Scenario::generate(reference_layout(), Features::default(), &small_config(7));
        let c = Scenario::generate(reference_layout(), Features::default(), &small_config(8));
        assert_eq!(a, b);
        assert_ne!(a.ops, c.ops);
        assert_eq!(a.ops.len(), 500);
        assert!(a.ops.iter().all(|op| match op {
            ScenarioOp::Alloc { size } => (1..=80).contains(size),
            ScenarioOp::Free { .. } => true,
        }));
    }

    #[test]
    fn test_replay_is_deterministic() {
        let scenario =
            Scenario::generate(reference_layout(), Features::diagnostic(), &small_config(42));
        let first = scenario.run().unwrap();
        let second = scenario.run().unwrap();
        assert_eq!(first, second);
        assert!(first.failures > 0, "tiny pools should overflow");
    }

    #[test]
    fn test_features_do_not_change_hash() {
        let plain = Scenario::generate(reference_layout(), Features::default(), &small_config(3));
        let checked = Scenario {
            features: Features::diagnostic(),
            ..plain.clone()
        };
        assert_eq!(
            plain.run().unwrap().state_hash,
            checked.run().unwrap().state_hash
        );
    }

    #[test]
    fn test_expected_hash_is_enforced() {
        let mut scenario =
            Scenario::generate(reference_layout(), Features::default(), &small_config(1));
        let hash = scenario.run().unwrap().state_hash;

        scenario.expected_hash = Some(hash.to_uppercase());
        scenario.run().unwrap();

        scenario.expected_hash = Some("00".repeat(32));
        assert!(matches!(
            scenario.run(),
            Err(SimulationError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_yaml_round_trip_replays_identically() {
        let scenario =
            Scenario::generate(reference_layout(), Features::default(), &small_config(11));
        let path = std::env::temp_dir().join(format!("fixpool-scenario-{}.yaml", std::process::id()));
        scenario.save(&path).unwrap();
        let loaded = Scenario::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, scenario);
        assert_eq!(
            loaded.run().unwrap().state_hash,
            scenario.run().unwrap().state_hash
        );
    }

    #[test]
    fn test_hand_written_scenario() {
        let yaml = r#"
seed: 0
pools:
  - { element_size: 16, element_count: 1 }
ops:
  - { op: alloc, size: 4 }
  - { op: alloc, size: 4 }
  - { op: free, slot: 0 }
  - { op: alloc, size: 4 }
"#;
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        let report = scenario.run().unwrap();
        assert_eq!(report.allocations, 2);
        assert_eq!(report.failures, 1);
        assert_eq!(report.pool_stats[0].max_allocated, 1);
    }

    #[test]
    fn test_layout_mismatch_rejected() {
        let scenario =
            Scenario::generate(reference_layout(), Features::default(), &small_config(5));
        let other = build_owned_allocator(&[PoolDescriptor::new(16, 4)], &Features::default())
            .unwrap();
        assert!(matches!(
            scenario.run_on(&*other),
            Err(SimulationError::Scenario(_))
        ));
    }

    #[test]
    fn test_empty_scenario_rejected() {
        let path = std::env::temp_dir().join(format!("fixpool-empty-{}.yaml", std::process::id()));
        std::fs::write(&path, "seed: 0\npools: []\nops: []\n").unwrap();
        let result = Scenario::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(SimulationError::Scenario(_))));
    }
}
