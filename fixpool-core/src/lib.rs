//! # fixpool-core
//!
//! Deterministic fixed-size buffer pools for embedded communication stacks.
//! Hands out and reclaims short-lived protocol buffers (packets, timer and
//! event records) without a general-purpose heap.
//!
//! ### Expectations (Production):
//! - Fragmentation-free: every buffer comes from a statically sized pool
//! - First-fit by size class, no fallback to larger classes
//! - Misuse (foreign pointers, double frees) is fatal, exhaustion is not
//!
//! ### Key Submodules:
//! - `alloc`: layout, base pool, decorators and statistics
//! - `error`: initialization and allocation errors
//!
//! ```
//! use fixpool_core::prelude::*;
//!
//! let layout = [PoolDescriptor::new(16, 4), PoolDescriptor::new(64, 2)];
//! let mut memory = vec![0u8; calc_size(&layout)];
//! let pool = BufferPool::init(&mut memory, &layout).unwrap();
//!
//! let mut buf = pool.alloc(10).unwrap();
//! pool.buffer_mut(&mut buf)[..5].copy_from_slice(b"hello");
//! pool.free(buf);
//! ```

pub mod alloc;
pub mod error;

pub mod prelude {
    pub use crate::alloc::*;
    pub use crate::error::*;
}

pub use alloc::{BufHandle, BufferPool, PoolAllocator, PoolDescriptor};
pub use error::{AllocError, InitError};
