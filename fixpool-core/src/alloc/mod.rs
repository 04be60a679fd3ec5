//! ## fixpool-core::alloc
//! **Fixed-size buffer pools for protocol buffers**
//!
//! ### Expectations (Production):
//! - No heap allocation after initialization
//! - Bounded-time alloc/free, O(pool count)
//! - Callable from any thread; critical sections cover a single pool
//!
//! ### Key Submodules:
//! - `layout`: size classes, sizing and the on-region record table
//! - `pool`: the base allocator, [`BufferPool`]
//! - `decorators`: histogram, double-free guard, failure callback
//! - `stats`: statistics snapshots and counters

pub mod decorators;

mod allocator;
mod builder;
mod handle;
mod layout;
mod pool;
mod region;
mod stats;

pub use allocator::{AllocFailure, DiagnosticsCallback, PoolAllocator};
pub use builder::{build_allocator, build_owned_allocator, compose, Features, HistogramFeature};
pub use handle::BufHandle;
pub use layout::{
    calc_size, normalize_element_size, PoolDescriptor, PoolRecord, HEADER_SIZE, MAX_POOLS,
    POOL_RECORD_SIZE,
};
pub use pool::{BufferPool, PoolOptions};
pub use stats::{HistogramSnapshot, PoolStats};
