//! # Interrupt Dispatch
//!
//! Owns the vector table and routes every vector:
//! - 0-31: CPU exceptions, reported then halted or resumed per vector
//! - 32-47: PIC lines, acknowledged first, then handed to the kernel's
//!   device logic (the timer line drives the scheduler)
//! - 0x80: system calls

pub mod dispatch;
pub mod exceptions;
mod idt;
pub mod pic;

use pic::{InterruptController, PICS};

/// `idt_init`: load the vector table, remap both PICs to 32/40 and mask
/// every line. Drivers unmask their own lines afterwards.
pub fn init() -> Result<(), &'static str> {
    idt::IDT.load();
    crate::arch::without_interrupts(|| PICS.lock().remap());
    log::debug!("idt loaded, pics remapped and masked");
    Ok(())
}
