//! ## fixpool-telemetry::metrics
//! **Prometheus gauges for pool occupancy**
//!
//! Pool statistics are sampled with [`MetricsRecorder::observe`]; the
//! failure counter is bumped from the allocator's diagnostics callback.

use fixpool_core::PoolAllocator;
use prometheus::{IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub allocated: IntGaugeVec,
    pub high_water: IntGaugeVec,
    pub overflows: IntCounterVec,
    pub alloc_failures: IntCounter,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let labels = ["pool", "element_size"];
        let pool_gauge =
            |name: &str, help: &str| IntGaugeVec::new(Opts::new(name, help), &labels);

        let allocated = pool_gauge("fixpool_pool_allocated", "Elements currently allocated")?;
        let high_water = pool_gauge("fixpool_pool_high_water", "Most elements ever allocated at once")?;
        let overflows = IntCounterVec::new(
            Opts::new("fixpool_pool_overflow_total", "Failed allocations against the pool"),
            &labels,
        )?;
        let alloc_failures =
            IntCounter::new("fixpool_alloc_failures_total", "Failed allocation requests")?;

        registry.register(Box::new(allocated.clone()))?;
        registry.register(Box::new(high_water.clone()))?;
        registry.register(Box::new(overflows.clone()))?;
        registry.register(Box::new(alloc_failures.clone()))?;

        Ok(Self {
            registry,
            allocated,
            high_water,
            overflows,
            alloc_failures,
        })
    }

    /// Samples every pool of `allocator` into the gauges.
    pub fn observe(&self, allocator: &dyn PoolAllocator) {
        let overflows = allocator.overflow_counts();
        for (pool, stats) in allocator.all_pool_stats().iter().enumerate() {
            let pool_label = pool.to_string();
            let size_label = stats.element_size.to_string();
            let labels = [pool_label.as_str(), size_label.as_str()];

            self.allocated
                .with_label_values(&labels)
                .set(stats.num_allocated as i64);
            self.high_water
                .with_label_values(&labels)
                .set(stats.max_allocated as i64);
            // Counters only move forward; catch up to the pool's own total.
            if let Some(&count) = overflows.as_ref().and_then(|o| o.get(pool)) {
                let counter = self.overflows.with_label_values(&labels);
                let seen = counter.get();
                if u64::from(count) > seen {
                    counter.inc_by(u64::from(count) - seen);
                }
            }
        }
    }

    pub fn inc_alloc_failures(&self) {
        self.alloc_failures.inc();
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixpool_core::alloc::{BufferPool, PoolDescriptor, PoolOptions};

    #[test]
    fn test_observe_exports_pool_gauges() {
        let pool = BufferPool::with_layout(
            &[PoolDescriptor::new(16, 2), PoolDescriptor::new(64, 1)],
            PoolOptions::default(),
        )
        .unwrap();
        let a = pool.alloc(8).unwrap();
        let _b = pool.alloc(8).unwrap();
        assert!(pool.alloc(8).is_err());
        pool.free(a);

        let metrics = MetricsRecorder::new().unwrap();
        metrics.observe(&pool);
        metrics.inc_alloc_failures();

        assert_eq!(metrics.allocated.with_label_values(&["0", "16"]).get(), 1);
        assert_eq!(metrics.high_water.with_label_values(&["0", "16"]).get(), 2);
        assert_eq!(metrics.overflows.with_label_values(&["0", "16"]).get(), 1);
        metrics.observe(&pool);
        assert_eq!(metrics.overflows.with_label_values(&["0", "16"]).get(), 1);
        assert_eq!(metrics.allocated.with_label_values(&["1", "64"]).get(), 0);

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("fixpool_pool_high_water"));
        assert!(text.contains("fixpool_alloc_failures_total 1"));
    }
}
