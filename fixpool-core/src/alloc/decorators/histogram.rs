use std::panic::Location;

use crate::alloc::allocator::{DiagnosticsCallback, PoolAllocator};
use crate::alloc::handle::BufHandle;
use crate::alloc::stats::{HistogramSnapshot, LengthHistogram};
use crate::error::AllocError;

/// Counts every allocation request, successful or not, by requested length.
pub struct Histogram<A> {
    inner: A,
    lengths: LengthHistogram,
}

impl<A: PoolAllocator> Histogram<A> {
    pub fn new(inner: A, bucket_width: usize, bucket_count: usize) -> Self {
        Self {
            inner,
            lengths: LengthHistogram::new(bucket_width, bucket_count),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

impl<A: PoolAllocator> PoolAllocator for Histogram<A> {
    fn try_alloc(
        &self,
        size: usize,
        caller: &'static Location<'static>,
    ) -> Result<BufHandle, AllocError> {
        if size > 0 {
            self.lengths.record(size);
        }
        self.inner.try_alloc(size, caller)
    }

    fn free(&self, handle: BufHandle) {
        self.inner.free(handle)
    }

    forward_views!();

    fn alloc_histogram(&self) -> Option<HistogramSnapshot> {
        Some(self.lengths.snapshot())
    }

    fn register_diagnostics_callback(&self, callback: Option<DiagnosticsCallback>) -> bool {
        self.inner.register_diagnostics_callback(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::{BufferPool, PoolDescriptor, PoolOptions};

    #[test]
    fn test_histogram_counts_requests() {
        let pool = BufferPool::with_layout(&[PoolDescriptor::new(32, 1)], PoolOptions::default())
            .unwrap();
        let alloc = Histogram::new(pool, 8, 4);

        let held = alloc.alloc(5).unwrap();
        assert!(alloc.alloc(20).is_err()); // exhausted, still counted
        assert!(alloc.alloc(100).is_err()); // too large, lands in the last bucket
        assert!(alloc.alloc(0).is_err()); // not a length, not counted
        alloc.free(held);

        let snap = alloc.alloc_histogram().unwrap();
        assert_eq!(snap.bucket_width, 8);
        assert_eq!(snap.counts, vec![1, 0, 1, 1]);
        assert_eq!(alloc.inner().pool_count(), 1);
    }

    #[test]
    fn test_base_pool_has_no_histogram() {
        let pool = BufferPool::with_layout(&[PoolDescriptor::new(32, 1)], PoolOptions::default())
            .unwrap();
        assert!(pool.alloc_histogram().is_none());
    }
}
