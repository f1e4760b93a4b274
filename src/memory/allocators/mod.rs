//! # Memory Allocators
//!
//! Heap allocation for the kernel.
//!
//! ### FreeListHeap
//! - Fixed arena embedded in the allocator value
//! - Singly linked block list in address order, tiling the arena
//! - First-fit allocation, split in place
//! - Forward-only coalescing on free
//!
//! ## Core Utilities
//!
//! - `AllocError`: failures reported by the checked free path
//! - Alignment helpers: `align_up`, `checked_align_up`

mod common;
pub mod free_list;

pub use common::AllocError;
pub use free_list::{BlockInfo, FreeListHeap, HEADER_SIZE};
