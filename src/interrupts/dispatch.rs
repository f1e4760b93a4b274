//! Vector demultiplexing for hardware interrupts.

use spin::Mutex;

use super::pic::{Chip, InterruptController, InterruptIndex};
use crate::config::{PIC_1_OFFSET, PIC_2_OFFSET};

/// Device logic behind the IRQ lines. Implemented by the kernel context.
pub trait IrqSink {
    /// IRQ 0: advance the tick counter and run the scheduler.
    fn timer(&self);

    fn keyboard(&self);

    fn mouse(&self);

    /// Any line without a dedicated branch.
    fn other(&self, irq: u8) {
        log::trace!("unhandled irq {}", irq);
    }
}

/// Controllers that must be acknowledged for `vector`, in order.
pub fn chips_to_acknowledge(vector: u8) -> &'static [Chip] {
    if vector >= PIC_2_OFFSET {
        &[Chip::Slave, Chip::Master]
    } else {
        &[Chip::Master]
    }
}

/// Acknowledge the controller(s) for `vector`, then run its device branch.
///
/// The controller lock is released before the branch runs: the timer
/// branch may switch to another process, which can take another interrupt
/// before this call frame ever resumes.
pub fn dispatch_irq<C, S>(pics: &Mutex<C>, sink: &S, vector: u8)
where
    C: InterruptController,
    S: IrqSink + ?Sized,
{
    debug_assert!((PIC_1_OFFSET..PIC_2_OFFSET + 8).contains(&vector));
    {
        let mut pics = pics.lock();
        for &chip in chips_to_acknowledge(vector) {
            pics.end_of_interrupt(chip);
        }
    }

    match InterruptIndex::from_vector(vector) {
        Some(InterruptIndex::Timer) => sink.timer(),
        Some(InterruptIndex::Keyboard) => sink.keyboard(),
        Some(InterruptIndex::Mouse) => sink.mouse(),
        Some(InterruptIndex::Cascade) | None => sink.other(vector - PIC_1_OFFSET),
    }
}
