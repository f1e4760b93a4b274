//! # Kernel Heap
//!
//! `LockedHeap` serializes a `FreeListHeap` behind a `spin::Mutex` and masks
//! interrupts for the duration of every call, so interrupt-driven code can
//! allocate without corrupting an allocation it preempted.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};

use crate::arch::without_interrupts;
use crate::config::HEAP_ALIGN;

pub mod allocators;

pub use allocators::{AllocError, BlockInfo, FreeListHeap};

pub struct LockedHeap<const N: usize> {
    inner: spin::Mutex<FreeListHeap<N>>,
}

impl<const N: usize> LockedHeap<N> {
    pub const fn new() -> Self {
        Self {
            inner: spin::Mutex::new(FreeListHeap::new()),
        }
    }

    fn with_heap<R>(&self, f: impl FnOnce(&mut FreeListHeap<N>) -> R) -> R {
        without_interrupts(|| f(&mut self.inner.lock()))
    }

    /// `mm_init`: reset the arena to one free block.
    pub fn init(&self) {
        let reset = self.with_heap(|heap| {
            let was_live = heap.is_initialized();
            heap.init();
            was_live
        });
        if reset {
            log::warn!("heap: re-initialized, earlier allocations dropped");
        }
        log::debug!("heap: {} byte arena ready", N);
    }

    /// `kmalloc`
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        let ptr = self.with_heap(|heap| heap.allocate(size));
        if ptr.is_none() {
            log::trace!("kmalloc({}) failed", size);
        }
        ptr
    }

    /// `kfree`
    pub fn free(&self, ptr: NonNull<u8>) {
        self.with_heap(|heap| heap.free(ptr))
    }

    pub fn try_free(&self, ptr: NonNull<u8>) -> Result<(), AllocError> {
        self.with_heap(|heap| heap.try_free(ptr))
    }

    pub fn stats(&self) -> HeapStats {
        self.with_heap(|heap| HeapStats {
            capacity: heap.capacity(),
            free_bytes: heap.free_bytes(),
            used_bytes: heap.used_bytes(),
            largest_free: heap.largest_free(),
            blocks: heap.block_count(),
        })
    }
}

impl<const N: usize> Default for LockedHeap<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of heap usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub capacity: usize,
    pub free_bytes: usize,
    pub used_bytes: usize,
    pub largest_free: usize,
    pub blocks: usize,
}

unsafe impl<const N: usize> GlobalAlloc for LockedHeap<N> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > HEAP_ALIGN {
            return ptr::null_mut();
        }
        self.allocate(layout.size())
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            self.free(ptr);
        }
    }
}
