//! Backing memory for a [`BufferPool`](super::BufferPool).

use std::marker::PhantomData;
use std::ptr::{self, NonNull};

/// Contiguous byte region, either borrowed from the caller for `'a` or owned
/// by the allocator.
///
/// The region is only ever accessed through the raw base pointer so that
/// disjoint slots can be handed out to different owners at the same time.
pub(crate) struct Region<'a> {
    base: NonNull<u8>,
    len: usize,
    owned: bool,
    _marker: PhantomData<&'a mut [u8]>,
}

impl<'a> Region<'a> {
    pub(crate) fn borrowed(memory: &'a mut [u8]) -> Self {
        Self {
            // SAFETY: slice pointers are never null (dangling for len 0).
            base: unsafe { NonNull::new_unchecked(memory.as_mut_ptr()) },
            len: memory.len(),
            owned: false,
            _marker: PhantomData,
        }
    }

    pub(crate) fn owned(len: usize) -> Region<'static> {
        let raw = Box::into_raw(vec![0u8; len].into_boxed_slice());
        Region {
            // SAFETY: Box::into_raw never returns null.
            base: unsafe { NonNull::new_unchecked(raw.cast::<u8>()) },
            len,
            owned: true,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Mutable view of `len` bytes at `offset`.
    ///
    /// # Safety
    ///
    /// `offset + len` must lie inside the region and the caller must hold
    /// exclusive access to that byte range for the returned lifetime.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slice_mut(&self, offset: usize, len: usize) -> &mut [u8] {
        debug_assert!(offset + len <= self.len);
        std::slice::from_raw_parts_mut(self.base.as_ptr().add(offset), len)
    }

    /// Shared view of `len` bytes at `offset`.
    ///
    /// # Safety
    ///
    /// Same range requirements as [`slice_mut`](Self::slice_mut); no
    /// mutable view of the range may be alive.
    #[inline]
    pub(crate) unsafe fn slice(&self, offset: usize, len: usize) -> &[u8] {
        debug_assert!(offset + len <= self.len);
        std::slice::from_raw_parts(self.base.as_ptr().add(offset), len)
    }
}

impl Drop for Region<'_> {
    fn drop(&mut self) {
        if self.owned {
            // SAFETY: produced by Box::into_raw in `owned` with the same length.
            drop(unsafe {
                Box::from_raw(ptr::slice_from_raw_parts_mut(self.base.as_ptr(), self.len))
            });
        }
    }
}

// SAFETY: the region is plain bytes; concurrent access to individual slots is
// coordinated by the per-pool critical sections and handle ownership.
unsafe impl Send for Region<'_> {}
unsafe impl Sync for Region<'_> {}
