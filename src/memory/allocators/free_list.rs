use core::mem::size_of;
use core::ptr::{self, NonNull};

use crate::config::{HEAP_ALIGN, MIN_PAYLOAD};
use crate::memory::allocators::common::{align_up, checked_align_up, is_aligned, AllocError};

// ============================================================================
// BLOCK HEADERS
// ============================================================================

/// Marks the last block of the list.
const NIL: u32 = u32::MAX;

/// Header placed in front of every block, allocated or free.
///
/// Blocks are laid out back to back in address order and tile the whole
/// arena, so `next` always equals `offset + HEADER_SIZE + size` (or `NIL`).
/// `next` is an arena offset, never an address.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
struct BlockHeader {
    size: usize,
    next: u32,
    free: bool,
}

pub const HEADER_SIZE: usize = size_of::<BlockHeader>();

#[repr(C, align(16))]
struct Arena<const N: usize>([u8; N]);

/// A block as seen by diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub offset: usize,
    pub size: usize,
    pub free: bool,
}

// ============================================================================
// FIRST-FIT FREE LIST HEAP
// ============================================================================

/// First-fit allocator over a fixed, embedded arena of `N` bytes.
///
/// Not synchronized: callers must make sure only one execution context uses
/// it at a time (the kernel wraps it in `LockedHeap`, which also masks
/// interrupts).
pub struct FreeListHeap<const N: usize> {
    arena: Arena<N>,
    initialized: bool,
}

impl<const N: usize> FreeListHeap<N> {
    const LAYOUT_OK: () = assert!(
        N >= HEADER_SIZE + MIN_PAYLOAD && N == align_up(N, HEAP_ALIGN) && N < NIL as usize,
        "heap arena must hold one block and be a multiple of the heap alignment"
    );

    pub const fn new() -> Self {
        let () = Self::LAYOUT_OK;
        Self {
            arena: Arena([0; N]),
            initialized: false,
        }
    }

    /// Reset the arena to a single free block spanning all of it.
    /// Every pointer handed out before becomes dangling.
    pub fn init(&mut self) {
        self.arena.0.fill(0);
        self.write_header(
            0,
            BlockHeader {
                size: N - HEADER_SIZE,
                next: NIL,
                free: true,
            },
        );
        self.initialized = true;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Allocate `size` bytes, rounded up to the heap alignment.
    ///
    /// Returns `None` when no free block is large enough; nothing is
    /// allocated in that case.
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        if !self.initialized || size == 0 {
            return None;
        }
        let size = checked_align_up(size, HEAP_ALIGN)?;

        let mut offset = 0usize;
        loop {
            let mut header = self.header(offset);
            if header.free && header.size >= size {
                let surplus = header.size - size;
                if surplus > HEADER_SIZE + MIN_PAYLOAD {
                    let split = offset + HEADER_SIZE + size;
                    self.write_header(
                        split,
                        BlockHeader {
                            size: surplus - HEADER_SIZE,
                            next: header.next,
                            free: true,
                        },
                    );
                    header.size = size;
                    header.next = split as u32;
                }
                header.free = false;
                self.write_header(offset, header);
                return NonNull::new(self.payload_ptr(offset));
            }
            if header.next == NIL {
                return None;
            }
            offset = header.next as usize;
        }
    }

    /// Release a payload pointer. Invalid pointers are logged and ignored.
    pub fn free(&mut self, ptr: NonNull<u8>) {
        if let Err(e) = self.try_free(ptr) {
            log::warn!("kfree({:p}) ignored: {}", ptr.as_ptr(), e);
        }
    }

    /// Release a payload pointer, merging the block with its successor when
    /// that one is free too. Coalescing only looks forward.
    pub fn try_free(&mut self, ptr: NonNull<u8>) -> Result<(), AllocError> {
        if !self.initialized {
            return Err(AllocError::Uninitialized);
        }
        let offset = self.block_offset_of(ptr)?;
        let mut header = self.header(offset);
        if header.free {
            return Err(AllocError::DoubleFree);
        }

        header.free = true;
        if header.next != NIL {
            let next = self.header(header.next as usize);
            if next.free {
                header.size += HEADER_SIZE + next.size;
                header.next = next.next;
            }
        }
        self.write_header(offset, header);
        Ok(())
    }

    pub fn contains(&self, ptr: *const u8) -> bool {
        let base = self.arena.0.as_ptr() as usize;
        let addr = ptr as usize;
        addr >= base && addr < base + N
    }

    pub fn blocks(&self) -> Blocks<'_, N> {
        Blocks {
            heap: self,
            next: if self.initialized { 0 } else { NIL },
        }
    }

    pub fn free_bytes(&self) -> usize {
        self.blocks().filter(|b| b.free).map(|b| b.size).sum()
    }

    pub fn used_bytes(&self) -> usize {
        self.blocks().filter(|b| !b.free).map(|b| b.size).sum()
    }

    pub fn largest_free(&self) -> usize {
        self.blocks().filter(|b| b.free).map(|b| b.size).max().unwrap_or(0)
    }

    pub fn block_count(&self) -> usize {
        self.blocks().count()
    }

    /// Map a payload pointer back to its block, refusing anything that is not
    /// the start of a payload in this arena.
    fn block_offset_of(&self, ptr: NonNull<u8>) -> Result<usize, AllocError> {
        let base = self.arena.0.as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;
        if addr < base + HEADER_SIZE || addr >= base + N || !is_aligned(addr - base, HEAP_ALIGN) {
            return Err(AllocError::InvalidAddress);
        }
        let offset = addr - base - HEADER_SIZE;
        if self.blocks().any(|b| b.offset == offset) {
            Ok(offset)
        } else {
            Err(AllocError::InvalidAddress)
        }
    }

    fn payload_ptr(&mut self, offset: usize) -> *mut u8 {
        self.arena.0[offset + HEADER_SIZE..].as_mut_ptr()
    }

    fn header(&self, offset: usize) -> BlockHeader {
        debug_assert!(offset + HEADER_SIZE <= N && is_aligned(offset, HEAP_ALIGN));
        // Safety: offsets are multiples of 16 inside a 16-aligned arena
        unsafe { ptr::read(self.arena.0.as_ptr().add(offset) as *const BlockHeader) }
    }

    fn write_header(&mut self, offset: usize, header: BlockHeader) {
        debug_assert!(offset + HEADER_SIZE <= N && is_aligned(offset, HEAP_ALIGN));
        unsafe { ptr::write(self.arena.0.as_mut_ptr().add(offset) as *mut BlockHeader, header) }
    }
}

impl<const N: usize> Default for FreeListHeap<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks the block list in address order.
pub struct Blocks<'a, const N: usize> {
    heap: &'a FreeListHeap<N>,
    next: u32,
}

impl<const N: usize> Iterator for Blocks<'_, N> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        if self.next == NIL {
            return None;
        }
        let offset = self.next as usize;
        let header = self.heap.header(offset);
        self.next = header.next;
        Some(BlockInfo {
            offset,
            size: header.size,
            free: header.free,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap<const N: usize>() -> Box<FreeListHeap<N>> {
        let mut heap = Box::new(FreeListHeap::<N>::new());
        heap.init();
        heap
    }

    fn assert_tiles_arena<const N: usize>(heap: &FreeListHeap<N>) {
        let mut expected_offset = 0;
        for block in heap.blocks() {
            assert_eq!(block.offset, expected_offset);
            expected_offset += HEADER_SIZE + block.size;
        }
        assert_eq!(expected_offset, N);
    }

    #[test]
    fn test_header_is_one_alignment_unit() {
        assert_eq!(HEADER_SIZE, 16);
    }

    #[test]
    fn test_init_installs_single_free_block() {
        let heap = heap::<1024>();
        let blocks: Vec<_> = heap.blocks().collect();
        assert_eq!(blocks, vec![BlockInfo { offset: 0, size: 1024 - HEADER_SIZE, free: true }]);
        assert_eq!(heap.free_bytes(), 1008);
        assert_eq!(heap.used_bytes(), 0);
    }

    #[test]
    fn test_uninitialized_heap_fails() {
        let mut heap = Box::new(FreeListHeap::<1024>::new());
        assert!(!heap.is_initialized());
        assert!(heap.allocate(16).is_none());
        assert_eq!(heap.block_count(), 0);
    }

    #[test]
    fn test_small_then_oversized_request() {
        let mut heap = heap::<1024>();
        let ptr = heap.allocate(100).expect("100 bytes fit in a 1 KiB arena");
        assert_eq!(ptr.as_ptr() as usize % 16, 0);
        assert!(heap.contains(ptr.as_ptr()));
        assert!(heap.allocate(2000).is_none());
        assert_tiles_arena(&heap);
    }

    #[test]
    fn test_sizes_round_up_to_sixteen() {
        let mut heap = heap::<1024>();
        heap.allocate(100).unwrap();
        let first = heap.blocks().next().unwrap();
        assert_eq!(first.size, 112);
        assert!(!first.free);
    }

    #[test]
    fn test_zero_size_request_fails() {
        let mut heap = heap::<1024>();
        assert!(heap.allocate(0).is_none());
        assert_eq!(heap.block_count(), 1);
    }

    #[test]
    fn test_small_surplus_consumes_whole_block() {
        let mut heap = heap::<1024>();
        // 1008 available, 976 requested: 32 left is not worth a new block
        heap.allocate(976).unwrap();
        assert_eq!(heap.block_count(), 1);
        assert_eq!(heap.used_bytes(), 1008);
        assert!(heap.allocate(16).is_none());
    }

    #[test]
    fn test_alloc_free_round_trip_preserves_free_bytes() {
        let mut heap = heap::<4096>();
        // build some fragmentation first
        let a = heap.allocate(64).unwrap();
        let _b = heap.allocate(200).unwrap();
        let c = heap.allocate(48).unwrap();
        heap.free(a);
        heap.free(c);

        for size in [1, 16, 17, 100, 500, 1024, 2000] {
            let before = heap.free_bytes();
            let ptr = heap.allocate(size).unwrap();
            heap.free(ptr);
            assert_eq!(heap.free_bytes(), before, "size {}", size);
            assert_tiles_arena(&heap);
        }
    }

    #[test]
    fn test_first_fit_reuses_earliest_hole() {
        let mut heap = heap::<1024>();
        let a = heap.allocate(64).unwrap();
        let _b = heap.allocate(64).unwrap();
        heap.free(a);
        let again = heap.allocate(32).unwrap();
        assert_eq!(again, a);
    }

    #[test]
    fn test_coalescing_is_forward_only() {
        let mut heap = heap::<1024>();
        let a = heap.allocate(64).unwrap();
        let b = heap.allocate(64).unwrap();
        let c = heap.allocate(64).unwrap();
        assert_eq!(heap.block_count(), 4);

        heap.free(b);
        assert_eq!(heap.block_count(), 4);
        heap.free(a); // merges with b
        assert_eq!(heap.block_count(), 3);
        heap.free(c); // merges with the tail, never with a+b
        assert_eq!(heap.block_count(), 2);
        assert!(heap.blocks().all(|blk| blk.free));
        assert_tiles_arena(&heap);
    }

    #[test]
    fn test_invalid_frees_are_rejected() {
        let mut heap = heap::<1024>();
        let a = heap.allocate(64).unwrap();

        let mut outside = 0u8;
        assert_eq!(heap.try_free(NonNull::from(&mut outside)), Err(AllocError::InvalidAddress));

        let inside = unsafe { NonNull::new_unchecked(a.as_ptr().add(16)) };
        assert_eq!(heap.try_free(inside), Err(AllocError::InvalidAddress));

        assert_eq!(heap.try_free(a), Ok(()));
        assert_eq!(heap.try_free(a), Err(AllocError::DoubleFree));
        assert_tiles_arena(&heap);
    }

    #[test]
    fn test_init_resets_everything() {
        let mut heap = heap::<1024>();
        heap.allocate(300).unwrap();
        heap.allocate(300).unwrap();
        heap.init();
        assert!(heap.is_initialized());
        assert_eq!(heap.block_count(), 1);
        assert_eq!(heap.largest_free(), 1008);
    }
}
