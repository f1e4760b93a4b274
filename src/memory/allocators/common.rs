//! Shared helpers and error types for the heap allocators

use core::fmt;

// ============================================================================
// UTILITY FUNCTIONS
// ============================================================================

/// Round `value` up to the next multiple of `align` (a power of two).
/// Returns `None` on overflow.
#[inline]
pub(crate) const fn checked_align_up(value: usize, align: usize) -> Option<usize> {
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

#[inline]
pub(crate) const fn align_up(addr: usize, align: usize) -> usize {
    (addr + align - 1) & !(align - 1)
}

#[inline]
pub(crate) fn is_aligned(addr: usize, align: usize) -> bool {
    addr & (align - 1) == 0
}

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    InvalidAddress,
    DoubleFree,
    Uninitialized,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::InvalidAddress => write!(f, "pointer was not handed out by this heap"),
            AllocError::DoubleFree => write!(f, "block is already free"),
            AllocError::Uninitialized => write!(f, "heap not initialized"),
        }
    }
}
