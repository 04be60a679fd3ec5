//! ## fixpool-core::alloc::pool
//! **Fixed-size buffer pools over a single region**
//!
//! [`BufferPool`] partitions one region into size classes and serves
//! requests first-fit by class: a request goes to the first pool whose
//! element is large enough and fails if that pool is empty, even when a
//! larger pool still has room. Larger buffers are never consumed by small
//! requests.
//!
//! Every free element hosts a free-list node in its first
//! [`HEADER_SIZE`] bytes: the index of the next free element and a tag that
//! marks the slot as free. Allocation pops the head, freeing pushes onto
//! it (LIFO). Freeing a slot whose node still carries the free tag is a
//! double free; callers must not leave that tag value at bytes 4..8 of a
//! buffer they hand back.
use std::panic::Location;
use std::ptr::NonNull;

use parking_lot::Mutex;
use tracing::{debug, error, info, trace};

use crate::alloc::allocator::PoolAllocator;
use crate::alloc::handle::{next_instance_id, BufHandle};
use crate::alloc::layout::{PoolDescriptor, PoolRecord, HEADER_SIZE, MAX_POOLS, POOL_RECORD_SIZE};
use crate::alloc::region::Region;
use crate::alloc::stats::{OverflowCounters, PoolStats};
use crate::error::{AllocError, InitError};

/// End-of-list marker in a free-list node.
const NIL: u32 = u32::MAX;
/// Tag carried by every element that sits on a free list.
const FREE_TAG: u32 = 0xF4EE_B10C;
/// Tag written over the free tag when an element is handed out.
const ALLOCATED_TAG: u32 = 0xA110_CA7E;

/// Construction options of the base pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Count failed allocations per pool.
    pub overflow_counters: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            overflow_counters: true,
        }
    }
}

#[derive(Debug)]
struct PoolState {
    free_head: u32,
    num_allocated: usize,
    max_allocated: usize,
    max_request_len: usize,
}

/// One size class. Everything but `state` is immutable after init and read
/// without locking.
#[derive(Debug)]
struct Pool {
    element_size: usize,
    element_count: usize,
    region_start: usize,
    state: Mutex<PoolState>,
}

impl Pool {
    #[inline]
    fn slot_offset(&self, index: u32) -> usize {
        self.region_start + index as usize * self.element_size
    }

    #[inline]
    fn region_end(&self) -> usize {
        self.region_start + self.element_size * self.element_count
    }
}

/// Placement of one pool, computed before anything is written.
struct Placement {
    element_size: usize,
    element_count: usize,
    region_start: usize,
}

/// Checks the layout and computes every pool's placement plus the total
/// number of bytes the layout needs.
fn plan(layout: &[PoolDescriptor]) -> Result<(Vec<Placement>, usize), InitError> {
    if layout.is_empty() {
        return Err(InitError::EmptyLayout);
    }
    if layout.len() > MAX_POOLS {
        return Err(InitError::TooManyPools {
            count: layout.len(),
            max: MAX_POOLS,
        });
    }

    let mut placements = Vec::with_capacity(layout.len());
    let mut cursor = layout.len() * POOL_RECORD_SIZE;
    for (index, desc) in layout.iter().enumerate() {
        if desc.element_count == 0 {
            return Err(InitError::ZeroCount { index });
        }
        if index > 0 && desc.element_size < layout[index - 1].element_size {
            return Err(InitError::Unordered {
                index,
                size: desc.element_size,
                previous: index - 1,
                previous_size: layout[index - 1].element_size,
            });
        }

        let element_size = desc.normalized_size();
        let end = element_size
            .checked_mul(desc.element_count)
            .and_then(|bytes| cursor.checked_add(bytes))
            .filter(|_| {
                u32::try_from(cursor).is_ok()
                    && u32::try_from(element_size).is_ok()
                    && desc.element_count < NIL as usize
            })
            .ok_or(InitError::LayoutOverflow { index })?;

        placements.push(Placement {
            element_size,
            element_count: desc.element_count,
            region_start: cursor,
        });
        cursor = end;
    }
    Ok((placements, cursor))
}

#[inline]
fn read_node(node: &[u8]) -> (u32, u32) {
    let next = u32::from_le_bytes([node[0], node[1], node[2], node[3]]);
    let tag = u32::from_le_bytes([node[4], node[5], node[6], node[7]]);
    (next, tag)
}

#[inline]
fn write_node(node: &mut [u8], next: u32, tag: u32) {
    node[0..4].copy_from_slice(&next.to_le_bytes());
    node[4..8].copy_from_slice(&tag.to_le_bytes());
}

/// Fixed-size buffer allocator over one contiguous region.
///
/// Alloc and free are O(pool count): a scan of the immutable pool table
/// followed by an O(1) pop or push inside the owning pool's critical
/// section. Calls against different pools never contend.
pub struct BufferPool<'a> {
    instance: u64,
    region: Region<'a>,
    pools: Box<[Pool]>,
    consumed: usize,
    overflow: Option<OverflowCounters>,
}

impl<'a> BufferPool<'a> {
    /// Partitions `memory` according to `layout` with default options.
    ///
    /// `memory` must be at least [`calc_size`](super::calc_size)`(layout)`
    /// bytes long; the remainder, if any, is left untouched.
    pub fn init(memory: &'a mut [u8], layout: &[PoolDescriptor]) -> Result<Self, InitError> {
        Self::init_with(memory, layout, PoolOptions::default())
    }

    pub fn init_with(
        memory: &'a mut [u8],
        layout: &[PoolDescriptor],
        options: PoolOptions,
    ) -> Result<Self, InitError> {
        let (placements, required) = plan(layout)?;
        if required > memory.len() {
            error!(
                required,
                available = memory.len(),
                "backing region too small for pool layout"
            );
            return Err(InitError::RegionTooSmall {
                required,
                available: memory.len(),
            });
        }
        Ok(Self::build(Region::borrowed(memory), placements, required, options))
    }

    /// Allocates a region of exactly the required size and partitions it.
    pub fn with_layout(
        layout: &[PoolDescriptor],
        options: PoolOptions,
    ) -> Result<BufferPool<'static>, InitError> {
        let (placements, required) = plan(layout)?;
        Ok(BufferPool::build(
            Region::owned(required),
            placements,
            required,
            options,
        ))
    }

    fn build<'r>(
        region: Region<'r>,
        placements: Vec<Placement>,
        consumed: usize,
        options: PoolOptions,
    ) -> BufferPool<'r> {
        debug_assert!(consumed <= region.len());
        let pools: Box<[Pool]> = placements
            .into_iter()
            .map(|p| Pool {
                element_size: p.element_size,
                element_count: p.element_count,
                region_start: p.region_start,
                state: Mutex::new(PoolState {
                    free_head: 0,
                    num_allocated: 0,
                    max_allocated: 0,
                    max_request_len: 0,
                }),
            })
            .collect();

        for (index, pool) in pools.iter().enumerate() {
            let record = PoolRecord {
                element_size: pool.element_size as u32,
                element_count: pool.element_count as u32,
                region_start: pool.region_start as u32,
            };
            // SAFETY: `plan` placed the record table and every pool inside
            // `consumed`, which fits the region; nothing is shared yet.
            unsafe {
                record.encode(region.slice_mut(index * POOL_RECORD_SIZE, POOL_RECORD_SIZE));
                for slot in 0..pool.element_count as u32 {
                    let next = if slot as usize + 1 == pool.element_count {
                        NIL
                    } else {
                        slot + 1
                    };
                    write_node(
                        region.slice_mut(pool.slot_offset(slot), HEADER_SIZE),
                        next,
                        FREE_TAG,
                    );
                }
            }
            debug!(
                pool = index,
                element_size = pool.element_size,
                element_count = pool.element_count,
                region_start = pool.region_start,
                "pool laid out"
            );
        }

        info!(
            pools = pools.len(),
            bytes = consumed,
            "buffer pool initialized"
        );

        BufferPool {
            instance: next_instance_id(),
            overflow: options.overflow_counters.then(|| OverflowCounters::new(pools.len())),
            region,
            pools,
            consumed,
        }
    }

    /// Bytes of the region taken by the record table and all pools.
    pub fn bytes_consumed(&self) -> usize {
        self.consumed
    }

    /// Decodes the pool record table stored at the head of the region.
    pub fn records(&self) -> Vec<PoolRecord> {
        // SAFETY: the record table is written once in `build` and never
        // handed out, so shared reads cannot race with a writer.
        let table = unsafe { self.region.slice(0, self.pools.len() * POOL_RECORD_SIZE) };
        table
            .chunks_exact(POOL_RECORD_SIZE)
            .map(PoolRecord::decode)
            .collect()
    }

    /// Resolves the pool and slot owning `addr`.
    ///
    /// Pools are scanned from the highest base offset down; the first pool
    /// starting at or below `addr` is the only candidate, and `addr` must
    /// fall inside its extent on an element boundary.
    pub fn owner_of(&self, addr: *const u8) -> Option<(usize, usize)> {
        let offset = (addr as usize).checked_sub(self.region.base().as_ptr() as usize)?;
        let (pool_index, pool) = self
            .pools
            .iter()
            .enumerate()
            .rev()
            .find(|(_, pool)| pool.region_start <= offset)?;
        if offset >= pool.region_end() {
            return None;
        }
        let within = offset - pool.region_start;
        (within % pool.element_size == 0).then_some((pool_index, within / pool.element_size))
    }

    /// Gives up `handle` in exchange for the element's address, for callers
    /// that track buffers by pointer.
    pub fn into_ptr(&self, handle: BufHandle) -> NonNull<u8> {
        let (pool, index) = self.checked_slot(&handle);
        let offset = self.pools[pool].slot_offset(index);
        // SAFETY: `checked_slot` guarantees the slot lies inside the region.
        unsafe { NonNull::new_unchecked(self.region.base().as_ptr().add(offset)) }
    }

    /// Frees an element by address.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`into_ptr`](Self::into_ptr) on this allocator
    /// and must not have been freed since. No reference into the element
    /// may outlive this call.
    ///
    /// # Panics
    ///
    /// If no pool owns `ptr`.
    pub unsafe fn free_raw(&self, ptr: NonNull<u8>) {
        match self.owner_of(ptr.as_ptr()) {
            Some((pool, index)) => self.release(pool, index as u32),
            None => panic!("free of {ptr:p}, which is not an element of any pool"),
        }
    }

    /// Validates a handle against this allocator.
    fn checked_slot(&self, handle: &BufHandle) -> (usize, u32) {
        assert!(self.owns(handle), "{handle:?} belongs to another allocator");
        let pool = self
            .pools
            .get(handle.pool())
            .unwrap_or_else(|| panic!("{handle:?} names a pool that does not exist"));
        assert!(
            handle.index() < pool.element_count,
            "{handle:?} is outside its pool"
        );
        (handle.pool(), handle.index() as u32)
    }

    fn release(&self, pool_index: usize, index: u32) {
        let pool = &self.pools[pool_index];
        let mut state = pool.state.lock();
        // SAFETY: the slot is inside the pool and its owner gave it up; only
        // the critical section touches the node now.
        let node = unsafe { self.region.slice_mut(pool.slot_offset(index), HEADER_SIZE) };
        let (_, tag) = read_node(node);
        assert!(
            tag != FREE_TAG && state.free_head != index && state.num_allocated > 0,
            "double free of slot {index} in pool {pool_index}"
        );
        write_node(node, state.free_head, FREE_TAG);
        state.free_head = index;
        state.num_allocated -= 1;
        trace!(pool = pool_index, slot = index, "element freed");
    }
}

impl PoolAllocator for BufferPool<'_> {
    fn try_alloc(
        &self,
        size: usize,
        _caller: &'static Location<'static>,
    ) -> Result<BufHandle, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        let Some((pool_index, pool)) = self
            .pools
            .iter()
            .enumerate()
            .find(|(_, pool)| pool.element_size >= size)
        else {
            return Err(AllocError::TooLarge {
                size,
                largest: self.pools.last().map_or(0, |p| p.element_size),
            });
        };

        let mut state = pool.state.lock();
        let index = state.free_head;
        if index == NIL {
            drop(state);
            if let Some(overflow) = &self.overflow {
                overflow.increment(pool_index);
            }
            debug!(pool = pool_index, size, "pool exhausted");
            return Err(AllocError::Exhausted {
                pool: pool_index,
                size,
            });
        }

        // SAFETY: `index` came off this pool's free list, so the slot is in
        // bounds and unowned; the lock serializes access to its node.
        let node = unsafe { self.region.slice_mut(pool.slot_offset(index), HEADER_SIZE) };
        let (next, tag) = read_node(node);
        if tag != FREE_TAG || (next != NIL && next as usize >= pool.element_count) {
            panic!("free list of pool {pool_index} corrupted at slot {index}");
        }
        node[4..8].copy_from_slice(&ALLOCATED_TAG.to_le_bytes());

        state.free_head = next;
        state.num_allocated += 1;
        state.max_allocated = state.max_allocated.max(state.num_allocated);
        state.max_request_len = state.max_request_len.max(size);
        drop(state);

        trace!(pool = pool_index, slot = index, size, "element allocated");
        Ok(BufHandle::new(self.instance, pool_index as u16, index))
    }

    fn free(&self, handle: BufHandle) {
        let (pool, index) = self.checked_slot(&handle);
        self.release(pool, index);
    }

    fn owns(&self, handle: &BufHandle) -> bool {
        handle.instance() == self.instance
    }

    fn buffer<'s>(&'s self, handle: &'s BufHandle) -> &'s [u8] {
        let (pool, index) = self.checked_slot(handle);
        let pool = &self.pools[pool];
        // SAFETY: the handle owns the slot; it is borrowed for `'s`.
        unsafe { self.region.slice(pool.slot_offset(index), pool.element_size) }
    }

    fn buffer_mut<'s>(&'s self, handle: &'s mut BufHandle) -> &'s mut [u8] {
        let (pool, index) = self.checked_slot(handle);
        let pool = &self.pools[pool];
        // SAFETY: the handle owns the slot and is mutably borrowed for `'s`,
        // so no other view of these bytes exists.
        unsafe { self.region.slice_mut(pool.slot_offset(index), pool.element_size) }
    }

    fn pool_count(&self) -> usize {
        self.pools.len()
    }

    fn pool_stats(&self, pool: usize) -> Option<PoolStats> {
        let pool = self.pools.get(pool)?;
        let state = pool.state.lock();
        Some(PoolStats {
            element_size: pool.element_size,
            element_count: pool.element_count,
            num_allocated: state.num_allocated,
            max_allocated: state.max_allocated,
            max_request_len: state.max_request_len,
        })
    }

    fn overflow_counts(&self) -> Option<Vec<u32>> {
        self.overflow.as_ref().map(OverflowCounters::snapshot)
    }
}
