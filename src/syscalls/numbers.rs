//! System call numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum SyscallNumber {
    // I/O Operations (0-19)
    Write = 1,

    // Process Management (20-39)
    Exit = 20,
    GetPid = 24,
    Yield = 25,

    // Time (60-79)
    GetTicks = 61,

    // Unknown
    Unknown = usize::MAX,
}

impl From<usize> for SyscallNumber {
    fn from(num: usize) -> Self {
        match num {
            1 => Self::Write,
            20 => Self::Exit,
            24 => Self::GetPid,
            25 => Self::Yield,
            61 => Self::GetTicks,
            _ => Self::Unknown,
        }
    }
}
