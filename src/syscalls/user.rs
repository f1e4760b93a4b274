//! Process-side wrappers around `int 0x80`.

use core::arch::asm;

use super::dispatcher::STDOUT;
use super::numbers::SyscallNumber;

#[inline(always)]
unsafe fn syscall3(num: SyscallNumber, arg0: usize, arg1: usize, arg2: usize) -> isize {
    let ret: isize;
    asm!(
        "int 0x80",
        inlateout("rax") num as usize => ret,
        in("rdi") arg0,
        in("rsi") arg1,
        in("rdx") arg2,
    );
    ret
}

pub fn write(fd: usize, bytes: &[u8]) -> isize {
    unsafe { syscall3(SyscallNumber::Write, fd, bytes.as_ptr() as usize, bytes.len()) }
}

pub fn print(text: &str) -> isize {
    write(STDOUT, text.as_bytes())
}

pub fn getpid() -> isize {
    unsafe { syscall3(SyscallNumber::GetPid, 0, 0, 0) }
}

pub fn yield_now() {
    unsafe { syscall3(SyscallNumber::Yield, 0, 0, 0) };
}

pub fn ticks() -> u64 {
    unsafe { syscall3(SyscallNumber::GetTicks, 0, 0, 0) as u64 }
}

/// Never returns. If no other process is ready the caller keeps the CPU,
/// so it idles here until one is created.
pub fn exit(code: i32) -> ! {
    unsafe { syscall3(SyscallNumber::Exit, code as usize, 0, 0) };
    crate::arch::halt_forever()
}
