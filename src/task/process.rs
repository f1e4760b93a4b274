use core::mem::size_of;
use core::ptr;

use super::{ContextSwitch, EntryPoint, Pid, ProcessState};
use crate::arch::context::{RegisterFrame, INITIAL_RFLAGS};
use crate::config::STACK_SIZE;

#[repr(C, align(16))]
pub struct ProcessStack([u8; STACK_SIZE]);

impl ProcessStack {
    pub const fn new() -> Self {
        Self([0; STACK_SIZE])
    }

    pub fn bottom(&self) -> u64 {
        self.0.as_ptr() as u64
    }

    /// One past the highest byte; 16-byte aligned.
    pub fn top(&self) -> u64 {
        self.bottom() + STACK_SIZE as u64
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.bottom() && addr < self.top()
    }
}

/// Process control block. Lives in a table slot for the kernel's lifetime.
pub struct Process {
    pub(crate) pid: Pid,
    pub(crate) state: ProcessState,
    pub(crate) stack_pointer: u64,
    pub(crate) base_pointer: u64,
    stack: ProcessStack,
}

impl Process {
    pub const EMPTY: Process = Process {
        pid: Pid::new(0),
        state: ProcessState::Terminated,
        stack_pointer: 0,
        base_pointer: 0,
        stack: ProcessStack::new(),
    };

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ProcessState::Ready
    }

    pub fn stack_pointer(&self) -> u64 {
        self.stack_pointer
    }

    pub fn base_pointer(&self) -> u64 {
        self.base_pointer
    }

    pub fn stack(&self) -> &ProcessStack {
        &self.stack
    }

    pub(crate) fn reset(&mut self) {
        self.pid = Pid::new(0);
        self.state = ProcessState::Terminated;
        self.stack_pointer = 0;
        self.base_pointer = 0;
    }

    /// Turn this slot into a READY process that starts at `entry`.
    ///
    /// Stack layout, highest address first:
    ///
    /// ```text
    /// top - 8    return trampoline   <- rsp seen by `entry`
    /// top - 16   padding
    ///            RegisterFrame       <- stack_pointer
    /// ```
    ///
    /// The frame is what the switch primitive pops: zeroed registers, then
    /// rip = entry, the code selector, flags with IF set, rsp and ss.
    pub(crate) fn prepare<S: ContextSwitch>(&mut self, pid: Pid, entry: EntryPoint, arch: &S) {
        const FRAME_OFFSET: usize = STACK_SIZE - 16 - size_of::<RegisterFrame>();
        const RETURN_OFFSET: usize = STACK_SIZE - 8;

        let top = self.stack.top();
        let entry_rsp = top - 8;
        let frame_addr = self.stack.bottom() + FRAME_OFFSET as u64;
        debug_assert!(frame_addr % 16 == 0);

        let frame = RegisterFrame {
            rip: entry as usize as u64,
            cs: arch.code_selector() as u64,
            rflags: INITIAL_RFLAGS,
            rsp: entry_rsp,
            ss: arch.stack_selector() as u64,
            ..RegisterFrame::default()
        };

        let base = self.stack.0.as_mut_ptr();
        // Safety: both offsets are 8-aligned, the stack is 16-aligned, and
        // the writes end at or before the top of the stack
        unsafe {
            ptr::write(base.add(RETURN_OFFSET) as *mut u64, arch.return_trampoline());
            ptr::write(base.add(FRAME_OFFSET) as *mut RegisterFrame, frame);
        }

        self.pid = pid;
        self.state = ProcessState::Ready;
        self.stack_pointer = frame_addr;
        self.base_pointer = frame.rbp;
    }

    /// Read the frame a fresh process will resume from.
    #[cfg(test)]
    pub(crate) fn initial_frame(&self) -> RegisterFrame {
        assert!(self.stack.contains(self.stack_pointer));
        unsafe { ptr::read(self.stack_pointer as *const RegisterFrame) }
    }
}
