//! Process Scheduling
//!
//! Preemptive round-robin over a fixed table of processes.
//!
//! # Process Lifecycle
//! 1. `Scheduler::create(entry)` takes the next free slot and builds a
//!    synthetic interrupt frame on the slot's own stack
//! 2. The timer IRQ calls `Scheduler::schedule()`, which resumes the next
//!    READY slot after the current one
//! 3. `Scheduler::terminate(pid)` marks the slot TERMINATED; the slot and its
//!    stack are never reused
//!
//! # Context Switching
//! The scheduler never touches registers itself. It hands a pointer to the
//! outgoing slot's saved stack pointer and the incoming stack pointer to a
//! `ContextSwitch` implementation (`arch::context::X86Switch` in the kernel).

use core::fmt;

pub mod process;
pub mod scheduler;

pub use process::{Process, ProcessStack};
pub use scheduler::Scheduler;

/// Process entry function. Returning from it terminates the process.
pub type EntryPoint = extern "C" fn();

/// Process identifier. Pids are handed out in creation order and never
/// reused, so a pid is also the index of its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(u32);

impl Pid {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) const fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    /// Reserved: "current" is tracked by the scheduler, not by this field.
    Running,
    Ready,
    /// Reserved: nothing blocks yet.
    Blocked,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    NullEntry,
    TableFull,
    NoSuchProcess(Pid),
    NothingToRun,
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::NullEntry => write!(f, "entry point is null"),
            ProcessError::TableFull => write!(f, "process table is full"),
            ProcessError::NoSuchProcess(pid) => write!(f, "no process with pid {}", pid),
            ProcessError::NothingToRun => write!(f, "no process has been created"),
        }
    }
}

/// Architecture hook that saves one execution context and resumes another.
///
/// The frame `Process::prepare` synthesizes must be exactly what `switch`
/// pops when it resumes a stack pointer for the first time.
pub trait ContextSwitch {
    /// Code segment selector placed in synthetic frames.
    fn code_selector(&self) -> u16;

    /// Stack segment selector placed in synthetic frames.
    fn stack_selector(&self) -> u16;

    /// Address an entry function returns into.
    fn return_trampoline(&self) -> u64;

    /// Push the caller's registers and resume address onto its own stack,
    /// store the resulting stack pointer through `save`, then load `resume`
    /// and continue from the context saved there.
    ///
    /// # Safety
    /// `save` must point to writable storage that outlives the suspended
    /// context, and `resume` must be a stack pointer produced by a previous
    /// `switch` or by frame synthesis. No lock may be held across the call.
    unsafe fn switch(&self, save: *mut u64, resume: u64);
}
