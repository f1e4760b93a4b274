//! x86_64 specifics: segmentation, the context switch, CPU control.

pub mod context;
pub mod gdt;

pub fn halt_forever() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}

/// Run `f` with maskable interrupts disabled, restoring the previous state.
#[cfg(not(test))]
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    x86_64::instructions::interrupts::without_interrupts(f)
}

/// Host tests run in user mode, where `cli` would fault.
#[cfg(test)]
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}
