//! Ownership token for an allocated element.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Hands out a fresh allocator instance id. Ids are never reused and id 0
/// is never handed out.
pub(crate) fn next_instance_id() -> u64 {
    NEXT_INSTANCE
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| id.checked_add(1))
        .unwrap_or_else(|_| panic!("allocator instance ids exhausted"))
}

/// An allocated element of a specific pool in a specific allocator.
///
/// The handle is the only way to reach the element's bytes and is consumed
/// by `free`. It is deliberately neither `Clone` nor `Copy`.
#[derive(PartialEq, Eq, Hash)]
pub struct BufHandle {
    instance: u64,
    pool: u16,
    index: u32,
}

impl BufHandle {
    #[inline]
    pub(crate) fn new(instance: u64, pool: u16, index: u32) -> Self {
        Self {
            instance,
            pool,
            index,
        }
    }

    /// Index of the pool the element belongs to.
    #[inline]
    pub fn pool(&self) -> usize {
        self.pool as usize
    }

    /// Slot index of the element inside its pool.
    #[inline]
    pub fn index(&self) -> usize {
        self.index as usize
    }

    #[inline]
    pub(crate) fn instance(&self) -> u64 {
        self.instance
    }

    /// Packs the handle into an integer, e.g. to park it in a timer record.
    pub fn into_raw(self) -> u128 {
        (u128::from(self.instance) << 64) | (u128::from(self.pool) << 32) | u128::from(self.index)
    }

    /// Rebuilds a handle from [`into_raw`](Self::into_raw).
    ///
    /// # Safety
    ///
    /// `raw` must come from `into_raw` and must be turned back into a handle
    /// at most once; two live handles for the same slot alias its bytes.
    pub unsafe fn from_raw(raw: u128) -> Self {
        Self {
            instance: (raw >> 64) as u64,
            pool: (raw >> 32) as u16,
            index: raw as u32,
        }
    }
}

impl fmt::Debug for BufHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufHandle({}:{}#{})", self.instance, self.pool, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_form_preserves_fields() {
        let handle = BufHandle::new(u64::from(u32::MAX) + 7, 3, 0xDEAD_BEEF);
        let raw = handle.into_raw();
        // SAFETY: single conversion of a raw value produced above.
        let back = unsafe { BufHandle::from_raw(raw) };
        assert_eq!(back.instance(), u64::from(u32::MAX) + 7);
        assert_eq!(back.pool(), 3);
        assert_eq!(back.index(), 0xDEAD_BEEF);
    }

    #[test]
    fn instance_ids_are_distinct() {
        let a = next_instance_id();
        let ids: std::collections::HashSet<_> =
            (0..=u32::from(u16::MAX) + 1).map(|_| next_instance_id()).collect();
        assert_eq!(ids.len(), usize::from(u16::MAX) + 2);
        assert!(!ids.contains(&a));
        assert_ne!(a, 0);
    }
}
