//! # Kernel Context
//!
//! Every piece of mutable kernel state lives in one `Kernel` value, built
//! by a `const fn` into a static: the process table, the heap arena, the
//! tick counter and the driver callbacks. Interrupt handlers and the
//! system-call trap reach it through `kernel()`.
//!
//! The wrappers here mask interrupts around scheduler and heap calls made
//! from interruptible code, so the timer IRQ never spins on a lock its own
//! CPU already holds.

pub mod init;
pub mod status;

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;
use x86_64::instructions::port::Port;

use crate::arch::context::X86Switch;
use crate::arch::{halt_forever, without_interrupts};
use crate::config::HEAP_SIZE;
use crate::interrupts::dispatch::IrqSink;
use crate::interrupts::pic::{InterruptController, InterruptIndex, PICS};
use crate::memory::{HeapStats, LockedHeap};
use crate::syscalls::dispatcher::{SyscallError, SyscallHost};
use crate::task::{EntryPoint, Pid, ProcessError, Scheduler};

pub use init::init_kernel;
pub use status::{register_component, update_component_status, InitStatus};

/// PS/2 controller data port, shared by keyboard and mouse.
const PS2_DATA_PORT: u16 = 0x60;

/// Driver hook for one byte read from the PS/2 data port.
pub type ByteCallback = fn(u8);

pub struct Kernel {
    scheduler: Scheduler<X86Switch>,
    heap: LockedHeap<HEAP_SIZE>,
    ticks: AtomicU64,
    keyboard: Mutex<Option<ByteCallback>>,
    mouse: Mutex<Option<ByteCallback>>,
}

static KERNEL: Kernel = Kernel::new();

pub fn kernel() -> &'static Kernel {
    &KERNEL
}

impl Kernel {
    const fn new() -> Self {
        Self {
            scheduler: Scheduler::new(X86Switch),
            heap: LockedHeap::new(),
            ticks: AtomicU64::new(0),
            keyboard: Mutex::new(None),
            mouse: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------
    // processes

    pub fn scheduler_init(&self) {
        without_interrupts(|| self.scheduler.init());
    }

    pub fn create_process(&self, entry: Option<EntryPoint>) -> Result<Pid, ProcessError> {
        without_interrupts(|| self.scheduler.create(entry))
    }

    pub fn terminate_process(&self, pid: Pid) -> Result<(), ProcessError> {
        without_interrupts(|| self.scheduler.terminate(pid))
    }

    pub fn schedule(&self) {
        without_interrupts(|| self.scheduler.schedule());
    }

    /// Hand the CPU to the first process. Interrupts come on with the
    /// process's own flags.
    pub fn start(&self) -> Result<(), ProcessError> {
        x86_64::instructions::interrupts::disable();
        self.scheduler.start()
    }

    pub fn current_pid(&self) -> Option<Pid> {
        without_interrupts(|| self.scheduler.current_pid())
    }

    pub fn process_count(&self) -> usize {
        without_interrupts(|| self.scheduler.process_count())
    }

    // ------------------------------------------------------------------
    // memory

    pub fn mm_init(&self) {
        self.heap.init();
    }

    pub fn kmalloc(&self, size: usize) -> Option<NonNull<u8>> {
        self.heap.allocate(size)
    }

    pub fn kfree(&self, ptr: NonNull<u8>) {
        self.heap.free(ptr);
    }

    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    // ------------------------------------------------------------------
    // devices

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn enable_timer(&self) {
        without_interrupts(|| PICS.lock().unmask(InterruptIndex::Timer.irq()));
    }

    pub fn register_keyboard(&self, callback: ByteCallback) {
        without_interrupts(|| {
            *self.keyboard.lock() = Some(callback);
            PICS.lock().unmask(InterruptIndex::Keyboard.irq());
        });
    }

    pub fn register_mouse(&self, callback: ByteCallback) {
        without_interrupts(|| {
            *self.mouse.lock() = Some(callback);
            let mut pics = PICS.lock();
            pics.unmask(InterruptIndex::Cascade.irq());
            pics.unmask(InterruptIndex::Mouse.irq());
        });
    }

    fn forward_ps2_byte(&self, callback: &Mutex<Option<ByteCallback>>) {
        let byte = unsafe { Port::<u8>::new(PS2_DATA_PORT).read() };
        let callback = *callback.lock();
        match callback {
            Some(callback) => callback(byte),
            None => log::trace!("ps/2 byte {:#04x} with no driver", byte),
        }
    }
}

impl IrqSink for Kernel {
    fn timer(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.scheduler.schedule();
    }

    fn keyboard(&self) {
        self.forward_ps2_byte(&self.keyboard);
    }

    fn mouse(&self) {
        self.forward_ps2_byte(&self.mouse);
    }
}

/// Runs inside the trap, with interrupts already masked.
impl SyscallHost for Kernel {
    fn write(&self, bytes: &[u8]) {
        crate::logger::write_bytes(bytes);
    }

    fn exit(&self, code: i32) -> Result<Pid, SyscallError> {
        if let Some(pid) = self.scheduler.current_pid() {
            log::info!("process {} exited with code {}", pid, code);
        }
        self.scheduler
            .exit_current()
            .map_err(|_| SyscallError::NoSuchProcess)
    }

    fn current_pid(&self) -> Option<Pid> {
        self.scheduler.current_pid()
    }

    fn yield_now(&self) {
        self.scheduler.schedule();
    }

    fn ticks(&self) -> u64 {
        Kernel::ticks(self)
    }
}

/// Where a process lands when its entry function returns.
pub extern "C" fn process_exit() -> ! {
    match without_interrupts(|| KERNEL.scheduler.exit_current()) {
        Ok(pid) => log::debug!("process {} returned, idling", pid),
        Err(e) => log::error!("process return with {}", e),
    }
    halt_forever()
}

/// `#[global_allocator]` front end for the kernel heap.
pub struct KernelAllocator;

unsafe impl GlobalAlloc for KernelAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        KERNEL.heap.alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        KERNEL.heap.dealloc(ptr, layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_context() {
        let k = kernel();

        k.mm_init();
        let ptr = k.kmalloc(100).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 16, 0);
        assert_eq!(k.heap_stats().used_bytes, 112);
        k.kfree(ptr);
        assert_eq!(k.heap_stats().used_bytes, 0);
        assert!(k.kmalloc(HEAP_SIZE).is_none());

        // no processes yet: the timer only counts
        k.scheduler_init();
        let before = k.ticks();
        k.timer();
        k.timer();
        assert_eq!(k.ticks(), before + 2);
        assert_eq!(k.current_pid(), None);
        assert_eq!(SyscallHost::current_pid(k), None);
        assert_eq!(k.exit(0), Err(SyscallError::NoSuchProcess));
    }
}
