//! ## fixpool-core::alloc::decorators
//! **Optional allocator behaviour as wrappers**
//!
//! Each decorator wraps any [`PoolAllocator`](super::PoolAllocator), adds
//! one concern and forwards everything else to the inner allocator:
//!
//! - [`Histogram`]: request-length histogram.
//! - [`FreeGuard`]: exact double-free detection.
//! - [`FailureHook`]: diagnostics callback and fatal-on-exhaustion switch.
//!
//! [`build_allocator`](super::build_allocator) stacks them according to a
//! [`Features`](super::Features) value.

/// Forwards the read-only parts of [`PoolAllocator`](super::PoolAllocator)
/// to `self.inner`.
macro_rules! forward_views {
    () => {
        fn owns(&self, handle: &$crate::alloc::BufHandle) -> bool {
            self.inner.owns(handle)
        }

        fn buffer<'s>(&'s self, handle: &'s $crate::alloc::BufHandle) -> &'s [u8] {
            self.inner.buffer(handle)
        }

        fn buffer_mut<'s>(&'s self, handle: &'s mut $crate::alloc::BufHandle) -> &'s mut [u8] {
            self.inner.buffer_mut(handle)
        }

        fn pool_count(&self) -> usize {
            self.inner.pool_count()
        }

        fn pool_stats(&self, pool: usize) -> Option<$crate::alloc::PoolStats> {
            self.inner.pool_stats(pool)
        }

        fn overflow_counts(&self) -> Option<Vec<u32>> {
            self.inner.overflow_counts()
        }
    };
}

mod failure_hook;
mod free_guard;
mod histogram;

pub use failure_hook::FailureHook;
pub use free_guard::FreeGuard;
pub use histogram::Histogram;
