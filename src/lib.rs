//! A freestanding x86_64 kernel core: interrupt dispatch, a preemptive
//! round-robin scheduler and a first-fit kernel heap.
//!
//! The library builds for the host too, so everything above the hardware
//! seams is covered by ordinary `cargo test`.

#![cfg_attr(not(test), no_std)]
#![feature(abi_x86_interrupt)]

pub mod arch;
pub mod config;
pub mod interrupts;
pub mod kernel;
pub mod logger;
pub mod memory;
pub mod sync;
pub mod syscalls;
pub mod task;
