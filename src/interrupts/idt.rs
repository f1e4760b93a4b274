use spin::Lazy;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame};
use x86_64::VirtAddr;

use super::dispatch::dispatch_irq;
use super::exceptions;
use super::pic::PICS;
use crate::arch::context::syscall_entry_address;
use crate::config::{PIC_1_OFFSET, SYSCALL_VECTOR};
use crate::kernel::kernel;

macro_rules! irq_handlers {
    ($($name:ident => $irq:expr),* $(,)?) => {
        $(
            extern "x86-interrupt" fn $name(_frame: InterruptStackFrame) {
                dispatch_irq(&PICS, kernel(), PIC_1_OFFSET + $irq);
            }
        )*

        fn install_irqs(idt: &mut InterruptDescriptorTable) {
            $( idt[PIC_1_OFFSET + $irq].set_handler_fn($name); )*
        }
    };
}

irq_handlers! {
    irq0 => 0,
    irq1 => 1,
    irq2 => 2,
    irq3 => 3,
    irq4 => 4,
    irq5 => 5,
    irq6 => 6,
    irq7 => 7,
    irq8 => 8,
    irq9 => 9,
    irq10 => 10,
    irq11 => 11,
    irq12 => 12,
    irq13 => 13,
    irq14 => 14,
    irq15 => 15,
}

pub(super) static IDT: Lazy<InterruptDescriptorTable> = Lazy::new(|| {
    let mut idt = InterruptDescriptorTable::new();

    // CPU EXCEPTIONS (0-31)
    exceptions::install(&mut idt);

    // HARDWARE INTERRUPTS (32-47 after remapping)
    install_irqs(&mut idt);

    // SYSTEM CALLS
    unsafe {
        idt[SYSCALL_VECTOR].set_handler_addr(VirtAddr::new(syscall_entry_address()));
    }

    idt
});
