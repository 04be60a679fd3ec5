//! Pool layout configuration.
//!
//! Each entry is one size class. Entries are kept in the order given, which
//! must be non-decreasing in `element_size`.

use fixpool_core::alloc::PoolDescriptor;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One size class of the allocator.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq, Eq)]
pub struct PoolLayoutConfig {
    /// Element size in bytes (rounded up to the free-list header size).
    #[validate(range(min = 1, max = 1048576))]
    pub element_size: usize,

    /// Number of elements in the pool.
    #[validate(range(min = 1, max = 1048576))]
    pub element_count: usize,
}

impl From<&PoolLayoutConfig> for PoolDescriptor {
    fn from(pool: &PoolLayoutConfig) -> Self {
        PoolDescriptor::new(pool.element_size, pool.element_count)
    }
}

/// Default layout: small control records up to a full Ethernet frame.
pub fn default_pools() -> Vec<PoolLayoutConfig> {
    [(32, 64), (128, 32), (512, 16), (1536, 8)]
        .into_iter()
        .map(|(element_size, element_count)| PoolLayoutConfig {
            element_size,
            element_count,
        })
        .collect()
}
