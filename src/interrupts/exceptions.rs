//! CPU exceptions (vectors 0-31): description table, policy and handlers.

use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame, PageFaultErrorCode};

use crate::arch::{gdt, halt_forever};

pub const EXCEPTION_NAMES: [&str; 32] = [
    "Divide Error",
    "Debug",
    "Non Maskable Interrupt",
    "Breakpoint",
    "Overflow",
    "Bound Range Exceeded",
    "Invalid Opcode",
    "Device Not Available",
    "Double Fault",
    "Coprocessor Segment Overrun",
    "Invalid TSS",
    "Segment Not Present",
    "Stack Segment Fault",
    "General Protection Fault",
    "Page Fault",
    "Reserved",
    "x87 Floating Point",
    "Alignment Check",
    "Machine Check",
    "SIMD Floating Point",
    "Virtualization",
    "Control Protection",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Hypervisor Injection",
    "VMM Communication",
    "Security Exception",
    "Reserved",
];

pub const BREAKPOINT: u8 = 3;
pub const DOUBLE_FAULT: u8 = 8;
pub const PAGE_FAULT: u8 = 14;
pub const MACHINE_CHECK: u8 = 18;

pub fn describe(vector: u8) -> &'static str {
    EXCEPTION_NAMES
        .get(vector as usize)
        .copied()
        .unwrap_or("Unknown Interrupt")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Report and halt forever.
    Fatal,
    /// Report and return to the faulting context.
    Resume,
}

/// Page faults resume without any repair; the faulting instruction will
/// usually fault again.
pub fn policy(vector: u8) -> FaultPolicy {
    match vector {
        BREAKPOINT | PAGE_FAULT => FaultPolicy::Resume,
        _ => FaultPolicy::Fatal,
    }
}

/// What a handler knows about the fault it caught.
#[derive(Debug, Clone, Copy)]
pub struct FaultInfo {
    pub vector: u8,
    pub error_code: Option<u64>,
    pub instruction_pointer: u64,
    pub stack_pointer: u64,
    /// CR2 for page faults.
    pub fault_address: Option<u64>,
}

/// Report a fault and decide what happens next.
pub fn dispatch_fault(info: &FaultInfo) -> FaultPolicy {
    let policy = policy(info.vector);
    let name = describe(info.vector);
    match policy {
        FaultPolicy::Fatal => log::error!(
            "EXCEPTION {} ({}) at rip={:#x} rsp={:#x} code={:?}",
            info.vector,
            name,
            info.instruction_pointer,
            info.stack_pointer,
            info.error_code
        ),
        FaultPolicy::Resume => log::warn!(
            "EXCEPTION {} ({}) at rip={:#x} code={:?} addr={:?}, resuming",
            info.vector,
            name,
            info.instruction_pointer,
            info.error_code,
            info.fault_address
        ),
    }
    policy
}

fn handle(vector: u8, error_code: Option<u64>, frame: &InterruptStackFrame, fault_address: Option<u64>) {
    let info = FaultInfo {
        vector,
        error_code,
        instruction_pointer: frame.instruction_pointer.as_u64(),
        stack_pointer: frame.stack_pointer.as_u64(),
        fault_address,
    };
    if dispatch_fault(&info) == FaultPolicy::Fatal {
        halt_forever();
    }
}

macro_rules! fault_handler {
    ($name:ident, $vector:expr) => {
        extern "x86-interrupt" fn $name(frame: InterruptStackFrame) {
            handle($vector, None, &frame, None);
        }
    };
    ($name:ident, $vector:expr, error_code) => {
        extern "x86-interrupt" fn $name(frame: InterruptStackFrame, error_code: u64) {
            handle($vector, Some(error_code), &frame, None);
        }
    };
}

fault_handler!(divide_error_handler, 0);
fault_handler!(debug_handler, 1);
fault_handler!(nmi_handler, 2);
fault_handler!(breakpoint_handler, BREAKPOINT);
fault_handler!(overflow_handler, 4);
fault_handler!(bound_range_handler, 5);
fault_handler!(invalid_opcode_handler, 6);
fault_handler!(device_not_available_handler, 7);
fault_handler!(invalid_tss_handler, 10, error_code);
fault_handler!(segment_not_present_handler, 11, error_code);
fault_handler!(stack_segment_handler, 12, error_code);
fault_handler!(general_protection_handler, 13, error_code);
fault_handler!(x87_handler, 16);
fault_handler!(alignment_check_handler, 17, error_code);
fault_handler!(simd_handler, 19);
fault_handler!(virtualization_handler, 20);
fault_handler!(security_handler, 30, error_code);

extern "x86-interrupt" fn double_fault_handler(frame: InterruptStackFrame, error_code: u64) -> ! {
    handle(DOUBLE_FAULT, Some(error_code), &frame, None);
    halt_forever()
}

extern "x86-interrupt" fn machine_check_handler(frame: InterruptStackFrame) -> ! {
    handle(MACHINE_CHECK, None, &frame, None);
    halt_forever()
}

extern "x86-interrupt" fn page_fault_handler(frame: InterruptStackFrame, error_code: PageFaultErrorCode) {
    use x86_64::registers::control::Cr2;

    let address = Cr2::read().ok().map(|addr| addr.as_u64());
    handle(PAGE_FAULT, Some(error_code.bits()), &frame, address);
}

/// Point entries 0-31 at their handlers.
pub fn install(idt: &mut InterruptDescriptorTable) {
    idt.divide_error.set_handler_fn(divide_error_handler);
    idt.debug.set_handler_fn(debug_handler);
    idt.non_maskable_interrupt.set_handler_fn(nmi_handler);
    idt.breakpoint.set_handler_fn(breakpoint_handler);
    idt.overflow.set_handler_fn(overflow_handler);
    idt.bound_range_exceeded.set_handler_fn(bound_range_handler);
    idt.invalid_opcode.set_handler_fn(invalid_opcode_handler);
    idt.device_not_available.set_handler_fn(device_not_available_handler);
    // Double fault needs its own stack to avoid cascading failures
    unsafe {
        idt.double_fault
            .set_handler_fn(double_fault_handler)
            .set_stack_index(gdt::DOUBLE_FAULT_IST_INDEX);
    }
    idt.invalid_tss.set_handler_fn(invalid_tss_handler);
    idt.segment_not_present.set_handler_fn(segment_not_present_handler);
    idt.stack_segment_fault.set_handler_fn(stack_segment_handler);
    idt.general_protection_fault.set_handler_fn(general_protection_handler);
    idt.page_fault.set_handler_fn(page_fault_handler);
    idt.x87_floating_point.set_handler_fn(x87_handler);
    idt.alignment_check.set_handler_fn(alignment_check_handler);
    idt.machine_check.set_handler_fn(machine_check_handler);
    idt.simd_floating_point.set_handler_fn(simd_handler);
    idt.virtualization.set_handler_fn(virtualization_handler);
    idt.security_exception.set_handler_fn(security_handler);
}
