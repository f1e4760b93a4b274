//! # Kernel Configuration
//!
//! Compile-time knobs for the kernel core. Everything here is a constant:
//! the kernel has no runtime configuration source, and every table it owns
//! is sized at build time.

use log::LevelFilter;

/// Capacity of the process table. Slots are never reclaimed, so this is
/// also the total number of processes the kernel can ever create.
pub const MAX_PROCESSES: usize = 16;

/// Size of the stack embedded in every process slot.
pub const STACK_SIZE: usize = 4096;

/// Size of the static heap arena behind `kmalloc`.
pub const HEAP_SIZE: usize = 1024 * 1024;

/// Every payload handed out by the heap is aligned to this boundary.
pub const HEAP_ALIGN: usize = 16;

/// Smallest payload worth splitting a free block for.
pub const MIN_PAYLOAD: usize = 16;

/// Master 8259 vector offset (IRQ 0-7 -> 32-39).
pub const PIC_1_OFFSET: u8 = 32;

/// Slave 8259 vector offset (IRQ 8-15 -> 40-47).
pub const PIC_2_OFFSET: u8 = 40;

/// Software interrupt used for system calls.
pub const SYSCALL_VECTOR: u8 = 0x80;

/// COM1 base port.
pub const SERIAL_PORT: u16 = 0x3F8;

/// Size of the dedicated double-fault stack in the TSS.
pub const DOUBLE_FAULT_STACK_SIZE: usize = 4096 * 5;

/// Maximum log level emitted by the serial logger.
pub const LOG_LEVEL: LevelFilter = if cfg!(debug_assertions) {
    LevelFilter::Debug
} else {
    LevelFilter::Info
};
