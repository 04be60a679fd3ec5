//! Optional allocator behaviour.

use fixpool_core::alloc::{Features, HistogramFeature};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation;

/// Allocator feature switches.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct FeatureConfig {
    /// Count failed allocations per pool.
    #[serde(default = "default_true")]
    pub overflow_counters: bool,

    /// Track every slot and panic on a double free.
    #[serde(default)]
    pub free_check: bool,

    /// Panic on any failed allocation instead of returning the error.
    #[serde(default)]
    pub fatal_on_exhaustion: bool,

    /// Request-length histogram.
    #[serde(default)]
    #[validate(nested)]
    pub histogram: HistogramConfig,
}

fn default_true() -> bool {
    true
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            overflow_counters: default_true(),
            free_check: false,
            fatal_on_exhaustion: false,
            histogram: HistogramConfig::default(),
        }
    }
}

impl FeatureConfig {
    pub fn to_features(&self) -> Features {
        Features {
            overflow_counters: self.overflow_counters,
            free_check: self.free_check,
            fatal_on_exhaustion: self.fatal_on_exhaustion,
            histogram: self.histogram.enabled.then_some(HistogramFeature {
                bucket_width: self.histogram.bucket_width,
                bucket_count: self.histogram.bucket_count,
            }),
        }
    }
}

/// Histogram bucketing.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct HistogramConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Width of each bucket in bytes.
    #[serde(default = "default_bucket_width")]
    #[validate(
        range(min = 1, max = 65536),
        custom(function = validation::validate_power_of_two_value)
    )]
    pub bucket_width: usize,

    /// Number of buckets; the last one absorbs all larger requests.
    #[serde(default = "default_bucket_count")]
    #[validate(range(min = 1, max = 1024))]
    pub bucket_count: usize,
}

fn default_bucket_width() -> usize {
    16
}

fn default_bucket_count() -> usize {
    32
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bucket_width: default_bucket_width(),
            bucket_count: default_bucket_count(),
        }
    }
}
