//! ## fixpool-core::alloc::layout
//! **Pool layout, sizing and the on-region record table**
//!
//! A layout is an ordered list of `(element_size, element_count)` pairs.
//! The backing region starts with one [`PoolRecord`] per pool, followed by
//! the element storage of every pool in layout order:
//!
//! ```text
//! | rec 0 | rec 1 | ... | pool 0 elements | pool 1 elements | ... |
//! ```

use serde::{Deserialize, Serialize};

/// Size of the intrusive free-list node every element must be able to host.
///
/// The node stores the index of the next free element and a free tag.
pub const HEADER_SIZE: usize = 8;

/// Bytes reserved per pool at the head of the region.
pub const POOL_RECORD_SIZE: usize = 16;

/// Maximum number of pools in one layout (pool ids are 16 bits wide).
pub const MAX_POOLS: usize = u16::MAX as usize;

/// One size class as requested by the integrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDescriptor {
    pub element_size: usize,
    pub element_count: usize,
}

impl PoolDescriptor {
    pub const fn new(element_size: usize, element_count: usize) -> Self {
        Self {
            element_size,
            element_count,
        }
    }

    /// Element size after clamping to the header size and rounding up to a
    /// multiple of it.
    #[inline]
    pub fn normalized_size(&self) -> usize {
        normalize_element_size(self.element_size)
    }

    /// Storage taken by all elements of this pool, saturating at
    /// `usize::MAX`.
    #[inline]
    pub fn storage_bytes(&self) -> usize {
        self.normalized_size().saturating_mul(self.element_count)
    }
}

/// Clamps `size` to at least [`HEADER_SIZE`] and rounds it up to a multiple
/// of it. Sizes too large to round saturate at `usize::MAX`.
#[inline]
pub fn normalize_element_size(size: usize) -> usize {
    size.max(HEADER_SIZE)
        .div_ceil(HEADER_SIZE)
        .saturating_mul(HEADER_SIZE)
}

/// Bytes of backing memory [`BufferPool::init`](super::BufferPool::init)
/// consumes for `layout`: the record table plus all element storage.
///
/// Pure; use it to size a static buffer before initialization. A layout
/// that does not fit the address space yields `usize::MAX`, which no region
/// satisfies; `init` reports it as [`InitError::LayoutOverflow`].
///
/// [`InitError::LayoutOverflow`]: crate::error::InitError::LayoutOverflow
pub fn calc_size(layout: &[PoolDescriptor]) -> usize {
    layout
        .iter()
        .map(PoolDescriptor::storage_bytes)
        .fold(layout.len().saturating_mul(POOL_RECORD_SIZE), usize::saturating_add)
}

/// Descriptor record persisted at the head of the region.
///
/// Little-endian `element_size`, `element_count`, `region_start` followed by
/// four reserved bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRecord {
    pub element_size: u32,
    pub element_count: u32,
    pub region_start: u32,
}

impl PoolRecord {
    pub(crate) fn encode(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.element_size.to_le_bytes());
        out[4..8].copy_from_slice(&self.element_count.to_le_bytes());
        out[8..12].copy_from_slice(&self.region_start.to_le_bytes());
        out[12..POOL_RECORD_SIZE].fill(0);
    }

    pub(crate) fn decode(raw: &[u8]) -> Self {
        let word = |at: usize| u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
        Self {
            element_size: word(0),
            element_count: word(4),
            region_start: word(8),
        }
    }

    /// Offset one past the last element of the pool.
    #[inline]
    pub fn region_end(&self) -> usize {
        self.region_start as usize + self.element_size as usize * self.element_count as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalizes_to_header_multiples() {
        assert_eq!(normalize_element_size(0), HEADER_SIZE);
        assert_eq!(normalize_element_size(1), 8);
        assert_eq!(normalize_element_size(8), 8);
        assert_eq!(normalize_element_size(9), 16);
        assert_eq!(normalize_element_size(64), 64);
        assert_eq!(normalize_element_size(65), 72);
    }

    #[test]
    fn calc_size_of_reference_layout() {
        let layout = [PoolDescriptor::new(16, 4), PoolDescriptor::new(64, 2)];
        assert_eq!(calc_size(&layout), 2 * POOL_RECORD_SIZE + 4 * 16 + 2 * 64);
    }

    #[test]
    fn calc_size_rounds_small_elements() {
        let layout = [PoolDescriptor::new(3, 10)];
        assert_eq!(calc_size(&layout), POOL_RECORD_SIZE + 10 * HEADER_SIZE);
    }

    #[test]
    fn calc_size_saturates_on_huge_layouts() {
        assert_eq!(normalize_element_size(usize::MAX), usize::MAX);
        let layout = [
            PoolDescriptor::new(64, 1),
            PoolDescriptor::new(usize::MAX / 2, 4),
        ];
        assert_eq!(calc_size(&layout), usize::MAX);
        assert_eq!(layout[1].storage_bytes(), usize::MAX);
    }

    #[test]
    fn record_encoding_is_stable() {
        let record = PoolRecord {
            element_size: 64,
            element_count: 2,
            region_start: 96,
        };
        let mut raw = [0xAAu8; POOL_RECORD_SIZE];
        record.encode(&mut raw);
        assert_eq!(&raw[12..], &[0, 0, 0, 0]);
        assert_eq!(PoolRecord::decode(&raw), record);
        assert_eq!(record.region_end(), 96 + 128);
    }

    proptest! {
        #[test]
        fn calc_size_is_idempotent(sizes in proptest::collection::vec((1usize..512, 1usize..32), 1..8)) {
            let layout: Vec<_> = sizes.iter().map(|&(s, c)| PoolDescriptor::new(s, c)).collect();
            prop_assert_eq!(calc_size(&layout), calc_size(&layout));
            for desc in &layout {
                prop_assert!(desc.normalized_size() >= desc.element_size);
                prop_assert_eq!(desc.normalized_size() % HEADER_SIZE, 0);
            }
        }
    }
}
