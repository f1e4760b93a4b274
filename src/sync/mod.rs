//! # Synchronization
//!
//! The kernel runs on one core, so the only contention comes from interrupt
//! reentrancy. `SpinLock` serializes process-table access; everything else
//! uses `spin::Mutex` from the `spin` crate.

mod spinlock;

pub use spinlock::{SpinLock, SpinLockGuard};
