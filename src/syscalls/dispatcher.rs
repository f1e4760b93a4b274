use core::fmt;

use crate::arch::context::RegisterFrame;
use crate::syscalls::numbers::SyscallNumber;
use crate::task::Pid;

/// System call result type
pub type SyscallResult = Result<usize, SyscallError>;

/// System call errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    InvalidArgument,
    BadFileDescriptor,
    NoSuchProcess,
    NotImplemented,
}

impl SyscallError {
    pub fn as_errno(self) -> isize {
        match self {
            Self::InvalidArgument => -22,  // EINVAL
            Self::BadFileDescriptor => -9, // EBADF
            Self::NoSuchProcess => -3,     // ESRCH
            Self::NotImplemented => -38,   // ENOSYS
        }
    }
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::BadFileDescriptor => write!(f, "bad file descriptor"),
            Self::NoSuchProcess => write!(f, "no such process"),
            Self::NotImplemented => write!(f, "function not implemented"),
        }
    }
}

pub const STDOUT: usize = 1;
pub const STDERR: usize = 2;

/// Kernel services reachable from the system-call boundary.
pub trait SyscallHost {
    fn write(&self, bytes: &[u8]);

    /// Terminate the calling process and give up the CPU.
    fn exit(&self, code: i32) -> Result<Pid, SyscallError>;

    fn current_pid(&self) -> Option<Pid>;

    fn yield_now(&self);

    fn ticks(&self) -> u64;
}

/// System call context - the registers a call reads
///
///   rax = syscall number
///   rdi = arg0
///   rsi = arg1
///   rdx = arg2
///   r10 = arg3
///   r8  = arg4
///   r9  = arg5
#[derive(Debug, Clone, Copy, Default)]
pub struct SyscallContext {
    pub syscall_num: usize,
    pub arg0: usize,
    pub arg1: usize,
    pub arg2: usize,
    pub arg3: usize,
    pub arg4: usize,
    pub arg5: usize,
}

impl SyscallContext {
    pub fn from_frame(frame: &RegisterFrame) -> Self {
        Self {
            syscall_num: frame.rax as usize,
            arg0: frame.rdi as usize,
            arg1: frame.rsi as usize,
            arg2: frame.rdx as usize,
            arg3: frame.r10 as usize,
            arg4: frame.r8 as usize,
            arg5: frame.r9 as usize,
        }
    }
}

/// Value placed in rax on return: the result, or a negative errno.
pub fn encode_result(result: SyscallResult) -> u64 {
    match result {
        Ok(value) => value as u64,
        Err(e) => e.as_errno() as u64,
    }
}

/// Main syscall dispatcher
pub fn dispatch_syscall<H: SyscallHost + ?Sized>(host: &H, ctx: SyscallContext) -> SyscallResult {
    let syscall = SyscallNumber::from(ctx.syscall_num);
    log::trace!("syscall {:?}({:#x}, {:#x}, {:#x})", syscall, ctx.arg0, ctx.arg1, ctx.arg2);

    match syscall {
        SyscallNumber::Write => sys_write(host, ctx.arg0, ctx.arg1 as *const u8, ctx.arg2),
        SyscallNumber::Exit => host.exit(ctx.arg0 as i32).map(|_| 0),
        SyscallNumber::GetPid => host
            .current_pid()
            .map(|pid| pid.as_u32() as usize)
            .ok_or(SyscallError::NoSuchProcess),
        SyscallNumber::Yield => {
            host.yield_now();
            Ok(0)
        }
        SyscallNumber::GetTicks => Ok(host.ticks() as usize),
        SyscallNumber::Unknown => Err(SyscallError::NotImplemented),
    }
}

fn sys_write<H: SyscallHost + ?Sized>(host: &H, fd: usize, buf: *const u8, len: usize) -> SyscallResult {
    if fd != STDOUT && fd != STDERR {
        return Err(SyscallError::BadFileDescriptor);
    }
    if len == 0 {
        return Ok(0);
    }
    if buf.is_null() {
        return Err(SyscallError::InvalidArgument);
    }
    // Safety: there is a single address space; the caller vouches for the buffer
    let bytes = unsafe { core::slice::from_raw_parts(buf, len) };
    host.write(bytes);
    Ok(len)
}
