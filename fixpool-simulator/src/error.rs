use fixpool_config::ConfigError;
use fixpool_core::InitError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Allocator initialization failed: {0}")]
    Init(#[from] InitError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid scenario: {0}")]
    Scenario(String),

    #[error("State hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Buffer {handle} was modified while allocated (detected at op {op})")]
    Corrupted { op: usize, handle: String },

    #[error("{leaked} buffers still allocated after the run")]
    Leak { leaked: usize },

    #[error("Stress worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("Scenario I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scenario format error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
