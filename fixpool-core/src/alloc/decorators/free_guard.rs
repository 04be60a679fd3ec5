use std::panic::Location;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::alloc::allocator::{DiagnosticsCallback, PoolAllocator};
use crate::alloc::handle::BufHandle;
use crate::alloc::stats::HistogramSnapshot;
use crate::error::AllocError;

/// Tracks one "allocated" bit per slot and refuses to free a slot that is
/// not currently handed out.
///
/// Unlike the free tag kept inside free-list nodes, the bit does not live
/// in caller-writable memory. It cannot tell a stale handle from a live one
/// once the slot has been handed out again, since both name the same slot.
pub struct FreeGuard<A> {
    inner: A,
    /// First bit of each pool; the final entry is the total slot count.
    offsets: Vec<usize>,
    bits: Box<[AtomicU64]>,
}

impl<A: PoolAllocator> FreeGuard<A> {
    pub fn new(inner: A) -> Self {
        let mut offsets = Vec::with_capacity(inner.pool_count() + 1);
        let mut total = 0;
        for stats in inner.all_pool_stats() {
            offsets.push(total);
            total += stats.element_count;
        }
        offsets.push(total);

        Self {
            inner,
            offsets,
            bits: (0..total.div_ceil(64)).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Bit position of `handle`, or `None` if the handle names no slot of
    /// this layout.
    fn bit(&self, handle: &BufHandle) -> Option<(usize, u64)> {
        let start = *self.offsets.get(handle.pool())?;
        let end = *self.offsets.get(handle.pool() + 1)?;
        let bit = start + handle.index();
        (bit < end).then_some((bit / 64, 1u64 << (bit % 64)))
    }

    /// Whether the slot behind `handle` is currently handed out.
    pub fn is_allocated(&self, handle: &BufHandle) -> bool {
        self.bit(handle)
            .is_some_and(|(word, mask)| self.bits[word].load(Ordering::Acquire) & mask != 0)
    }
}

impl<A: PoolAllocator> PoolAllocator for FreeGuard<A> {
    fn try_alloc(
        &self,
        size: usize,
        caller: &'static Location<'static>,
    ) -> Result<BufHandle, AllocError> {
        let handle = self.inner.try_alloc(size, caller)?;
        if let Some((word, mask)) = self.bit(&handle) {
            let previous = self.bits[word].fetch_or(mask, Ordering::AcqRel);
            assert!(
                previous & mask == 0,
                "{handle:?} handed out while still allocated"
            );
        }
        Ok(handle)
    }

    fn free(&self, handle: BufHandle) {
        assert!(
            self.inner.owns(&handle),
            "{handle:?} belongs to another allocator"
        );
        if let Some((word, mask)) = self.bit(&handle) {
            let previous = self.bits[word].fetch_and(!mask, Ordering::AcqRel);
            assert!(previous & mask != 0, "double free of {handle:?}");
        }
        self.inner.free(handle)
    }

    forward_views!();

    fn alloc_histogram(&self) -> Option<HistogramSnapshot> {
        self.inner.alloc_histogram()
    }

    fn register_diagnostics_callback(&self, callback: Option<DiagnosticsCallback>) -> bool {
        self.inner.register_diagnostics_callback(callback)
    }
}
