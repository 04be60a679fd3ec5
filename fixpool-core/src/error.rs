use thiserror::Error;

/// Configuration errors raised while partitioning a region into pools.
///
/// None of these are recoverable at runtime: the layout is a build-time
/// decision and an allocator is only handed out once it is fully built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InitError {
    #[error("Pool layout is empty")]
    EmptyLayout,

    #[error("Pool {index} has an element count of zero")]
    ZeroCount { index: usize },

    #[error("Pool {index} element size {size} is smaller than pool {previous} ({previous_size})")]
    Unordered {
        index: usize,
        size: usize,
        previous: usize,
        previous_size: usize,
    },

    #[error("Layout has {count} pools, at most {max} are supported")]
    TooManyPools { count: usize, max: usize },

    #[error("Pool {index} does not fit in a 32-bit region offset")]
    LayoutOverflow { index: usize },

    #[error("Backing region too small: {required} bytes required, {available} available")]
    RegionTooSmall { required: usize, available: usize },
}

/// Soft allocation failures. Callers are expected to handle these (drop the
/// packet, back off, retry later).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    #[error("Zero-sized allocation request")]
    ZeroSize,

    #[error("Request of {size} bytes exceeds the largest pool element ({largest} bytes)")]
    TooLarge { size: usize, largest: usize },

    #[error("Pool {pool} exhausted by a request of {size} bytes")]
    Exhausted { pool: usize, size: usize },
}

impl AllocError {
    /// Index of the pool that overflowed, if the failure was an exhaustion.
    pub fn pool(&self) -> Option<usize> {
        match self {
            AllocError::Exhausted { pool, .. } => Some(*pool),
            _ => None,
        }
    }
}
