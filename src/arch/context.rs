//! Register frames and the x86_64 context switch.
//!
//! Three pieces of code agree on one layout, `RegisterFrame`:
//! `gamer_switch_context`, the system-call entry stub, and
//! `Process::prepare`, which synthesizes a frame for a process that has
//! never run. The switch and the stub both end in `iretq`, so the five
//! words above the general-purpose registers are an interrupt return frame.

use core::arch::global_asm;

use crate::arch::gdt;
use crate::task::ContextSwitch;

/// Flags for a fresh process: IF set plus the always-one bit 1.
pub const INITIAL_RFLAGS: u64 = 0x202;

/// General-purpose registers in pop order, then the `iretq` frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rbp: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

const _: () = assert!(core::mem::size_of::<RegisterFrame>() == 20 * 8);

// switch_context(save: *mut u64, resume: u64)
//
// Builds an iretq frame that returns to our caller, pushes all general
// purpose registers on top of it, stores rsp through `save`, then unwinds
// the same layout from `resume`.
global_asm!(
    r#"
.global gamer_switch_context
gamer_switch_context:
    pop rax
    mov rcx, rsp
    xor edx, edx
    mov dx, ss
    push rdx
    push rcx
    pushfq
    mov dx, cs
    push rdx
    push rax

    push rax
    push rbx
    push rcx
    push rdx
    push rbp
    push rsi
    push rdi
    push r8
    push r9
    push r10
    push r11
    push r12
    push r13
    push r14
    push r15

    mov [rdi], rsp
    mov rsp, rsi

    pop r15
    pop r14
    pop r13
    pop r12
    pop r11
    pop r10
    pop r9
    pop r8
    pop rdi
    pop rsi
    pop rbp
    pop rdx
    pop rcx
    pop rbx
    pop rax
    iretq

.global gamer_process_return
gamer_process_return:
    and rsp, -16
    call {exit}
    ud2

.global gamer_syscall_entry
gamer_syscall_entry:
    push rax
    push rbx
    push rcx
    push rdx
    push rbp
    push rsi
    push rdi
    push r8
    push r9
    push r10
    push r11
    push r12
    push r13
    push r14
    push r15

    mov rdi, rsp
    cld
    call {syscall}

    pop r15
    pop r14
    pop r13
    pop r12
    pop r11
    pop r10
    pop r9
    pop r8
    pop rdi
    pop rsi
    pop rbp
    pop rdx
    pop rcx
    pop rbx
    pop rax
    iretq
"#,
    exit = sym crate::kernel::process_exit,
    syscall = sym crate::syscalls::syscall_trap,
);

extern "C" {
    fn gamer_switch_context(save: *mut u64, resume: u64);
    fn gamer_process_return();
    fn gamer_syscall_entry();
}

/// Entry point for the system-call gate. The CPU pushes the interrupt
/// frame; the stub completes it to a `RegisterFrame` and passes it to
/// `syscalls::syscall_trap`, which may rewrite it before `iretq`.
pub fn syscall_entry_address() -> u64 {
    gamer_syscall_entry as usize as u64
}

/// `ContextSwitch` for the real CPU.
pub struct X86Switch;

impl ContextSwitch for X86Switch {
    fn code_selector(&self) -> u16 {
        gdt::selectors().code.0
    }

    fn stack_selector(&self) -> u16 {
        gdt::selectors().data.0
    }

    fn return_trampoline(&self) -> u64 {
        gamer_process_return as usize as u64
    }

    unsafe fn switch(&self, save: *mut u64, resume: u64) {
        gamer_switch_context(save, resume)
    }
}
