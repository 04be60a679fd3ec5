use std::panic::Location;

use parking_lot::RwLock;
use tracing::warn;

use crate::alloc::allocator::{AllocFailure, DiagnosticsCallback, PoolAllocator};
use crate::alloc::handle::BufHandle;
use crate::alloc::stats::HistogramSnapshot;
use crate::error::AllocError;

/// Reports failed allocations to a registered callback and, when built with
/// `fatal_on_exhaustion`, turns them into panics for debugging.
pub struct FailureHook<A> {
    inner: A,
    callback: RwLock<Option<DiagnosticsCallback>>,
    fatal_on_exhaustion: bool,
}

impl<A: PoolAllocator> FailureHook<A> {
    pub fn new(inner: A, fatal_on_exhaustion: bool) -> Self {
        Self {
            inner,
            callback: RwLock::new(None),
            fatal_on_exhaustion,
        }
    }
}

impl<A: PoolAllocator> PoolAllocator for FailureHook<A> {
    fn try_alloc(
        &self,
        size: usize,
        caller: &'static Location<'static>,
    ) -> Result<BufHandle, AllocError> {
        self.inner.try_alloc(size, caller).map_err(|error| {
            warn!(size, %caller, %error, "buffer allocation failed");
            let failure = AllocFailure {
                size,
                error,
                caller,
            };
            // Clone out of the lock so the callback may re-register.
            let callback = self.callback.read().clone();
            if let Some(callback) = callback {
                callback(&failure);
            }
            if self.fatal_on_exhaustion {
                panic!("fatal allocation failure: {failure}");
            }
            error
        })
    }

    fn free(&self, handle: BufHandle) {
        self.inner.free(handle)
    }

    forward_views!();

    fn alloc_histogram(&self) -> Option<HistogramSnapshot> {
        self.inner.alloc_histogram()
    }

    fn register_diagnostics_callback(&self, callback: Option<DiagnosticsCallback>) -> bool {
        *self.callback.write() = callback;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::{BufferPool, PoolDescriptor, PoolOptions};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing_test::traced_test;

    fn hooked(fatal: bool) -> FailureHook<BufferPool<'static>> {
        FailureHook::new(
            BufferPool::with_layout(&[PoolDescriptor::new(16, 1)], PoolOptions::default())
                .unwrap(),
            fatal,
        )
    }

    #[test]
    fn test_callback_sees_failures_with_call_site() {
        let alloc = hooked(false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        assert!(alloc.register_diagnostics_callback(Some(Arc::new(move |f: &AllocFailure| {
            sink.lock().push((f.size, f.error, f.caller.file()));
        }))));

        let _held = alloc.alloc(16).unwrap();
        assert!(alloc.alloc(12).is_err());
        assert!(alloc.alloc(99).is_err());

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 12);
        assert_eq!(seen[0].1, AllocError::Exhausted { pool: 0, size: 12 });
        assert!(matches!(seen[1].1, AllocError::TooLarge { size: 99, .. }));
        assert!(seen[0].2.ends_with("failure_hook.rs"));
    }

    #[test]
    fn test_unregister_stops_callbacks() {
        let alloc = hooked(false);
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        alloc.register_diagnostics_callback(Some(Arc::new(move |_: &AllocFailure| {
            *counter.lock() += 1;
        })));
        assert!(alloc.alloc(64).is_err());
        alloc.register_diagnostics_callback(None);
        assert!(alloc.alloc(64).is_err());
        assert_eq!(*calls.lock(), 1);
    }

    #[traced_test]
    #[test]
    fn test_failures_are_logged() {
        let alloc = hooked(false);
        assert!(alloc.alloc(64).is_err());
        assert!(logs_contain("buffer allocation failed"));
    }

    #[test]
    #[should_panic(expected = "fatal allocation failure")]
    fn test_fatal_on_exhaustion() {
        let alloc = hooked(true);
        let _held = alloc.alloc(16).unwrap();
        let _ = alloc.alloc(16);
    }
}
