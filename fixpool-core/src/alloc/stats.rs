//! ## fixpool-core::alloc::stats
//! **Per-pool statistics and request-length histogram**
//!
//! Snapshots are plain values; the live counters sit next to the free list
//! inside each pool's critical section, except for the overflow counters
//! and histogram buckets which are lock-free atomics.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time statistics of one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Normalized element size in bytes.
    pub element_size: usize,
    pub element_count: usize,
    /// Elements currently handed out.
    pub num_allocated: usize,
    /// High-water mark of `num_allocated`.
    pub max_allocated: usize,
    /// Largest request served by this pool.
    pub max_request_len: usize,
}

/// Per-pool failed-allocation counters.
pub(crate) struct OverflowCounters {
    counts: Box<[AtomicU32]>,
}

impl OverflowCounters {
    pub(crate) fn new(pools: usize) -> Self {
        Self {
            counts: (0..pools).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    #[inline]
    pub(crate) fn increment(&self, pool: usize) {
        self.counts[pool].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> Vec<u32> {
        self.counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }
}

/// Histogram contents at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramSnapshot {
    /// Width of every bucket in bytes.
    pub bucket_width: usize,
    /// `counts[i]` counts requests of `i*width+1 ..= (i+1)*width` bytes; the
    /// last bucket also takes everything larger.
    pub counts: Vec<u64>,
}

impl HistogramSnapshot {
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Lock-free request-length histogram.
pub(crate) struct LengthHistogram {
    bucket_width: usize,
    buckets: Box<[AtomicU64]>,
}

impl LengthHistogram {
    pub(crate) fn new(bucket_width: usize, bucket_count: usize) -> Self {
        Self {
            bucket_width: bucket_width.max(1),
            buckets: (0..bucket_count.max(1)).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    #[inline]
    pub(crate) fn bucket_for(&self, size: usize) -> usize {
        (size.saturating_sub(1) / self.bucket_width).min(self.buckets.len() - 1)
    }

    #[inline]
    pub(crate) fn record(&self, size: usize) {
        self.buckets[self.bucket_for(size)].fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            bucket_width: self.bucket_width,
            counts: self
                .buckets
                .iter()
                .map(|b| b.load(Ordering::Relaxed))
                .collect(),
        }
    }
}
