//! # fixpool Telemetry
//!
//! Logging and metrics for the buffer pool allocator and its tools.

pub mod logging;
pub mod metrics;

pub use logging::PoolLogger;
pub use metrics::MetricsRecorder;
