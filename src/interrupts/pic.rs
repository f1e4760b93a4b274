//! # Programmable Interrupt Controller (8259 PIC)
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │   PIC 1     │◀────│   PIC 2     │
//! │  (Master)   │IRQ2 │  (Slave)    │
//! │ IRQ 0-7     │     │ IRQ 8-15    │
//! └─────────────┘     └─────────────┘
//!       │
//!       ▼
//!     CPU
//! ```
//!
//! IRQ 0-15 would collide with CPU exception vectors, so they are remapped:
//! - PIC 1: vectors 32-39 (IRQ 0-7)
//! - PIC 2: vectors 40-47 (IRQ 8-15)
//!
//! | IRQ | Vector | Device    |
//! |-----|--------|-----------|
//! | 0   | 32     | Timer     |
//! | 1   | 33     | Keyboard  |
//! | 2   | 34     | Cascade   |
//! | 12  | 44     | Mouse     |

use pic8259::ChainedPics;
use spin::Mutex;
use x86_64::instructions::port::Port;

use crate::config::{PIC_1_OFFSET, PIC_2_OFFSET};

const MASTER_COMMAND: u16 = 0x20;
const SLAVE_COMMAND: u16 = 0xA0;
const CMD_END_OF_INTERRUPT: u8 = 0x20;

pub static PICS: Mutex<LegacyPics> = Mutex::new(unsafe { LegacyPics::new() });

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip {
    Master,
    Slave,
}

// Interrupt indices - these are the actual vector numbers the CPU sees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InterruptIndex {
    Timer = PIC_1_OFFSET,
    Keyboard = PIC_1_OFFSET + 1,
    Cascade = PIC_1_OFFSET + 2,
    Mouse = PIC_2_OFFSET + 4,
}

impl InterruptIndex {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn irq(self) -> u8 {
        self.as_u8() - PIC_1_OFFSET
    }

    pub fn from_vector(vector: u8) -> Option<Self> {
        match vector {
            v if v == Self::Timer.as_u8() => Some(Self::Timer),
            v if v == Self::Keyboard.as_u8() => Some(Self::Keyboard),
            v if v == Self::Cascade.as_u8() => Some(Self::Cascade),
            v if v == Self::Mouse.as_u8() => Some(Self::Mouse),
            _ => None,
        }
    }
}

/// Operations the dispatch layer needs from an interrupt controller pair.
pub trait InterruptController {
    /// Move IRQ 0-15 to vectors 32-47 and mask every line.
    fn remap(&mut self);

    fn end_of_interrupt(&mut self, chip: Chip);

    /// Let `irq` (0-15) through.
    fn unmask(&mut self, irq: u8);

    /// Silence every line on both chips.
    fn mask_all(&mut self);
}

/// The two legacy 8259s of the PC, driven through `pic8259`.
pub struct LegacyPics {
    chained: ChainedPics,
    master_command: Port<u8>,
    slave_command: Port<u8>,
}

impl LegacyPics {
    /// # Safety
    /// Only one value may drive the controllers.
    pub const unsafe fn new() -> Self {
        Self {
            chained: ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET),
            master_command: Port::new(MASTER_COMMAND),
            slave_command: Port::new(SLAVE_COMMAND),
        }
    }

    pub fn masks(&mut self) -> [u8; 2] {
        unsafe { self.chained.read_masks() }
    }
}

impl InterruptController for LegacyPics {
    fn remap(&mut self) {
        unsafe { self.chained.initialize() };
        self.mask_all();
    }

    fn end_of_interrupt(&mut self, chip: Chip) {
        let port = match chip {
            Chip::Master => &mut self.master_command,
            Chip::Slave => &mut self.slave_command,
        };
        unsafe { port.write(CMD_END_OF_INTERRUPT) };
    }

    fn unmask(&mut self, irq: u8) {
        let [mut master, mut slave] = self.masks();
        match irq {
            0..=7 => master &= !(1 << irq),
            8..=15 => slave &= !(1 << (irq - 8)),
            _ => {
                log::warn!("pic: no such irq {}", irq);
                return;
            }
        }
        unsafe { self.chained.write_masks(master, slave) };
    }

    fn mask_all(&mut self) {
        unsafe { self.chained.write_masks(0xFF, 0xFF) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_layout() {
        assert_eq!(InterruptIndex::Timer.as_u8(), 32);
        assert_eq!(InterruptIndex::Keyboard.irq(), 1);
        assert_eq!(InterruptIndex::Mouse.as_u8(), 44);
        assert_eq!(InterruptIndex::Mouse.irq(), 12);
        assert_eq!(InterruptIndex::from_vector(44), Some(InterruptIndex::Mouse));
        assert_eq!(InterruptIndex::from_vector(35), None);
    }
}
