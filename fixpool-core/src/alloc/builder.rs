//! Composes the base pool with the decorators a deployment asks for.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alloc::allocator::PoolAllocator;
use crate::alloc::decorators::{FailureHook, FreeGuard, Histogram};
use crate::alloc::layout::PoolDescriptor;
use crate::alloc::pool::{BufferPool, PoolOptions};
use crate::error::InitError;

/// Histogram bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramFeature {
    pub bucket_width: usize,
    pub bucket_count: usize,
}

impl Default for HistogramFeature {
    fn default() -> Self {
        Self {
            bucket_width: 16,
            bucket_count: 32,
        }
    }
}

/// Optional allocator behaviour, chosen at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    pub overflow_counters: bool,
    pub free_check: bool,
    pub histogram: Option<HistogramFeature>,
    /// Panic on any failed allocation instead of returning the error.
    pub fatal_on_exhaustion: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            overflow_counters: true,
            free_check: false,
            histogram: None,
            fatal_on_exhaustion: false,
        }
    }
}

impl Features {
    /// Every check and counter enabled, failures still soft.
    pub fn diagnostic() -> Self {
        Self {
            overflow_counters: true,
            free_check: true,
            histogram: Some(HistogramFeature::default()),
            fatal_on_exhaustion: false,
        }
    }
}

/// Wraps `base` in the decorators selected by `features`.
///
/// [`FailureHook`] is always the outermost layer so a diagnostics callback
/// can be registered regardless of the other features.
pub fn compose<'a>(base: BufferPool<'a>, features: &Features) -> Box<dyn PoolAllocator + 'a> {
    let mut allocator: Box<dyn PoolAllocator + 'a> = Box::new(base);
    if features.free_check {
        allocator = Box::new(FreeGuard::new(allocator));
    }
    if let Some(histogram) = features.histogram {
        allocator = Box::new(Histogram::new(
            allocator,
            histogram.bucket_width,
            histogram.bucket_count,
        ));
    }
    debug!(?features, "allocator composed");
    Box::new(FailureHook::new(allocator, features.fatal_on_exhaustion))
}

/// Initializes `memory` for `layout` and composes the decorators.
pub fn build_allocator<'a>(
    memory: &'a mut [u8],
    layout: &[PoolDescriptor],
    features: &Features,
) -> Result<Box<dyn PoolAllocator + 'a>, InitError> {
    let options = PoolOptions {
        overflow_counters: features.overflow_counters,
    };
    let base = BufferPool::init_with(memory, layout, options)?;
    Ok(compose(base, features))
}

/// Like [`build_allocator`] with an allocator-owned region.
pub fn build_owned_allocator(
    layout: &[PoolDescriptor],
    features: &Features,
) -> Result<Box<dyn PoolAllocator>, InitError> {
    let options = PoolOptions {
        overflow_counters: features.overflow_counters,
    };
    let base = BufferPool::with_layout(layout, options)?;
    Ok(compose(base, features))
}
