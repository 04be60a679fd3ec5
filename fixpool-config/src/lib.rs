//! # fixpool Configuration System
//!
//! Hierarchical configuration for the buffer pool allocator and its tools.
//!
//! ## Features
//! - **Single source of truth**: pool layout, feature switches, telemetry
//!   and workload parameters in one document
//! - **Validation**: field ranges, pool ordering and the region budget are
//!   checked before anything is built
//! - **Environment awareness**: per-environment overrides and `FIXPOOL_*`
//!   variables

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use fixpool_core::alloc::{calc_size, PoolDescriptor};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use validator::Validate;

mod error;
mod features;
mod pools;
mod simulator;
mod telemetry;
mod validation;

pub use error::ConfigError;
pub use features::{FeatureConfig, HistogramConfig};
pub use pools::PoolLayoutConfig;
pub use simulator::SimulatorConfig;
pub use telemetry::TelemetryConfig;

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
#[serde(default)]
pub struct FixpoolConfig {
    /// Size classes in non-decreasing element size.
    #[validate(
        length(min = 1, max = 65535),
        custom(function = validation::validate_pool_order),
        nested
    )]
    pub pools: Vec<PoolLayoutConfig>,

    /// Upper bound on the backing region, in bytes.
    pub region_limit: Option<usize>,

    /// Optional allocator behaviour.
    #[validate(nested)]
    pub features: FeatureConfig,

    /// Telemetry and observability configuration.
    #[validate(nested)]
    pub telemetry: TelemetryConfig,

    /// Workload simulation parameters.
    #[validate(nested)]
    pub simulator: SimulatorConfig,
}

impl Default for FixpoolConfig {
    fn default() -> Self {
        Self {
            pools: pools::default_pools(),
            region_limit: None,
            features: FeatureConfig::default(),
            telemetry: TelemetryConfig::default(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl FixpoolConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/fixpool.yaml`, if present
    /// 3. `config/<FIXPOOL_ENV>.yaml` (default `production`), if present
    /// 4. `FIXPOOL_*` environment variables, `__` separating sections
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(FixpoolConfig::default()));

        if Path::new("config/fixpool.yaml").exists() {
            figment = figment.merge(Yaml::file("config/fixpool.yaml"));
        } else {
            info!("config/fixpool.yaml not found, using default configuration");
        }

        let env = std::env::var("FIXPOOL_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            debug!(file = %env_file, "merging environment overrides");
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment.merge(Env::prefixed("FIXPOOL_").split("__")))
    }

    /// Load configuration from a specific file, on top of the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        Self::extract(
            Figment::from(Serialized::defaults(FixpoolConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed("FIXPOOL_").split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.check()?;
        Ok(config)
    }

    /// Field validation plus the region budget.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if let Some(limit) = self.region_limit {
            let required = self.region_size();
            if required > limit {
                return Err(ConfigError::RegionBudget { required, limit });
            }
        }
        Ok(())
    }

    /// Pool layout in allocator form.
    pub fn layout(&self) -> Vec<PoolDescriptor> {
        self.pools.iter().map(PoolDescriptor::from).collect()
    }

    /// Bytes of backing memory the layout needs.
    pub fn region_size(&self) -> usize {
        calc_size(&self.layout())
    }
}
