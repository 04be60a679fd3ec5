//! Workload simulation configuration.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// Parameters of the seeded alloc/free workload.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Seed for deterministic simulation.
    pub seed: u64,

    /// Number of alloc/free operations to simulate.
    #[validate(range(min = 1))]
    pub operations: usize,

    /// Largest request length generated, in bytes.
    #[validate(range(min = 1, max = 1048576))]
    pub max_request: usize,

    /// Probability that a step frees a held buffer instead of allocating.
    #[validate(range(min = 0.0, max = 1.0))]
    pub free_ratio: f64,

    /// Worker threads for the stress run.
    #[validate(range(min = 1, max = 256))]
    pub threads: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            operations: 10_000,
            max_request: 1536,
            free_ratio: 0.45,
            threads: 4,
        }
    }
}
