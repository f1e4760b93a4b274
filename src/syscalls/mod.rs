//! System calls through `int 0x80`.
//!
//! The number goes in rax and arguments in rdi, rsi, rdx, r10, r8, r9. The
//! result (or a negative errno) comes back in rax.

pub mod dispatcher;
pub mod numbers;
pub mod user;

use crate::arch::context::RegisterFrame;
use dispatcher::{dispatch_syscall, encode_result, SyscallContext};

/// Called by the entry stub with the caller's saved registers.
pub extern "C" fn syscall_trap(frame: &mut RegisterFrame) {
    let ctx = SyscallContext::from_frame(frame);
    frame.rax = encode_result(dispatch_syscall(crate::kernel::kernel(), ctx));
}
