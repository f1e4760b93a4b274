use spin::Lazy;
use x86_64::structures::gdt::{Descriptor, GlobalDescriptorTable, SegmentSelector};
use x86_64::structures::tss::TaskStateSegment;
use x86_64::VirtAddr;

use crate::config::DOUBLE_FAULT_STACK_SIZE;

/// IST slot the double-fault gate switches to. A kernel stack overflow
/// faults again on the broken stack, so that handler gets its own.
pub const DOUBLE_FAULT_IST_INDEX: u16 = 0;

static mut FAULT_STACK: [u8; DOUBLE_FAULT_STACK_SIZE] = [0; DOUBLE_FAULT_STACK_SIZE];

static TSS: Lazy<TaskStateSegment> = Lazy::new(|| {
    #[allow(unused_unsafe)]
    let base = VirtAddr::from_ptr(unsafe { core::ptr::addr_of!(FAULT_STACK) });

    let mut tss = TaskStateSegment::new();
    // stacks grow down, the IST entry holds the top
    tss.interrupt_stack_table[DOUBLE_FAULT_IST_INDEX as usize] =
        base + DOUBLE_FAULT_STACK_SIZE as u64;
    tss
});

/// Selectors of the flat kernel segments. `code` and `data` double as the
/// CS and SS written into every synthetic process frame.
pub struct Selectors {
    pub code: SegmentSelector,
    pub data: SegmentSelector,
    pub tss: SegmentSelector,
}

static GDT: Lazy<(GlobalDescriptorTable, Selectors)> = Lazy::new(|| {
    let mut table = GlobalDescriptorTable::new();
    let selectors = Selectors {
        code: table.append(Descriptor::kernel_code_segment()),
        data: table.append(Descriptor::kernel_data_segment()),
        tss: table.append(Descriptor::tss_segment(&TSS)),
    };
    (table, selectors)
});

/// Kernel selectors; valid before `init` too, the table is built lazily.
pub fn selectors() -> &'static Selectors {
    &GDT.1
}

/// Load the GDT, reload every segment register and the task register.
pub fn init() -> Result<(), &'static str> {
    let (gdt, selectors) = &*GDT;
    gdt.load();

    unsafe {
        use x86_64::instructions::segmentation::{Segment, CS, DS, ES, SS};

        CS::set_reg(selectors.code);
        DS::set_reg(selectors.data);
        ES::set_reg(selectors.data);
        SS::set_reg(selectors.data);

        x86_64::instructions::tables::load_tss(selectors.tss);
    }

    log::debug!(
        "gdt: cs={:#x} ds={:#x} tss={:#x}",
        selectors.code.0,
        selectors.data.0,
        selectors.tss.0
    );
    Ok(())
}
