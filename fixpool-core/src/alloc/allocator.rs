//! The allocator interface shared by the base pool and its decorators.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::alloc::handle::BufHandle;
use crate::alloc::stats::{HistogramSnapshot, PoolStats};
use crate::error::AllocError;

/// Details of a failed allocation, passed to the diagnostics callback.
#[derive(Debug, Clone, Copy)]
pub struct AllocFailure {
    /// Requested length in bytes.
    pub size: usize,
    pub error: AllocError,
    /// Call site that requested the buffer.
    pub caller: &'static Location<'static>,
}

impl fmt::Display for AllocFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (requested at {})", self.error, self.caller)
    }
}

/// Invoked synchronously on every failed allocation. Meant for diagnosing
/// buffer starvation, not for recovering from it.
pub type DiagnosticsCallback = Arc<dyn Fn(&AllocFailure) + Send + Sync>;

/// Fixed-size buffer allocator.
///
/// Implemented by [`BufferPool`](super::BufferPool) and by the decorators in
/// [`decorators`](super::decorators), which forward everything they do not
/// add themselves.
pub trait PoolAllocator: Send + Sync {
    /// Allocates an element of at least `size` bytes from the first pool
    /// whose element size fits, on behalf of `caller`.
    fn try_alloc(
        &self,
        size: usize,
        caller: &'static Location<'static>,
    ) -> Result<BufHandle, AllocError>;

    /// [`try_alloc`](Self::try_alloc) with the caller's location filled in.
    #[track_caller]
    fn alloc(&self, size: usize) -> Result<BufHandle, AllocError> {
        self.try_alloc(size, Location::caller())
    }

    /// Returns an element to its pool.
    ///
    /// # Panics
    ///
    /// On a handle that does not belong to this allocator, or on a detected
    /// double free. The free list can no longer be trusted at that point.
    fn free(&self, handle: BufHandle);

    /// Whether `handle` was issued by this allocator instance.
    fn owns(&self, handle: &BufHandle) -> bool;

    /// Contents of the element behind `handle`. The slice spans the whole
    /// element, which may be longer than the request.
    fn buffer<'s>(&'s self, handle: &'s BufHandle) -> &'s [u8];

    fn buffer_mut<'s>(&'s self, handle: &'s mut BufHandle) -> &'s mut [u8];

    fn pool_count(&self) -> usize;

    fn pool_stats(&self, pool: usize) -> Option<PoolStats>;

    /// Failed allocations per pool, if overflow counting is enabled.
    fn overflow_counts(&self) -> Option<Vec<u32>>;

    /// Request-length histogram, if enabled.
    fn alloc_histogram(&self) -> Option<HistogramSnapshot> {
        None
    }

    /// Installs (or with `None`, removes) the failure callback. Returns
    /// `false` when no layer of this allocator supports callbacks.
    fn register_diagnostics_callback(&self, _callback: Option<DiagnosticsCallback>) -> bool {
        false
    }

    /// Snapshot of every pool, in layout order.
    fn all_pool_stats(&self) -> Vec<PoolStats> {
        (0..self.pool_count())
            .filter_map(|pool| self.pool_stats(pool))
            .collect()
    }
}

impl<A: PoolAllocator + ?Sized> PoolAllocator for Box<A> {
    #[inline]
    fn try_alloc(
        &self,
        size: usize,
        caller: &'static Location<'static>,
    ) -> Result<BufHandle, AllocError> {
        (**self).try_alloc(size, caller)
    }

    #[inline]
    fn free(&self, handle: BufHandle) {
        (**self).free(handle)
    }

    fn owns(&self, handle: &BufHandle) -> bool {
        (**self).owns(handle)
    }

    fn buffer<'s>(&'s self, handle: &'s BufHandle) -> &'s [u8] {
        (**self).buffer(handle)
    }

    fn buffer_mut<'s>(&'s self, handle: &'s mut BufHandle) -> &'s mut [u8] {
        (**self).buffer_mut(handle)
    }

    fn pool_count(&self) -> usize {
        (**self).pool_count()
    }

    fn pool_stats(&self, pool: usize) -> Option<PoolStats> {
        (**self).pool_stats(pool)
    }

    fn overflow_counts(&self) -> Option<Vec<u32>> {
        (**self).overflow_counts()
    }

    fn alloc_histogram(&self) -> Option<HistogramSnapshot> {
        (**self).alloc_histogram()
    }

    fn register_diagnostics_callback(&self, callback: Option<DiagnosticsCallback>) -> bool {
        (**self).register_diagnostics_callback(callback)
    }
}
