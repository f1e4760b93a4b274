//! Kernel initialization phases

use crate::kernel::status::{register_component, update_component_status, InitStatus};
use crate::kernel::Kernel;
use crate::println;

const PHASES: [&str; 4] = ["Segmentation", "Interrupts", "Heap", "Scheduler"];

/// Initialize kernel in proper order with error handling.
///
/// Leaves every PIC line masked and interrupts disabled; the caller unmasks
/// what it needs and `Scheduler::start` turns interrupts on.
pub fn init_kernel(kernel: &Kernel) -> Result<(), &'static str> {
    for name in PHASES {
        register_component(name);
    }

    println!("╔════════════════════════════════════════╗");
    println!("║       Gamer Kernel Initialization      ║");
    println!("╚════════════════════════════════════════╝\n");

    init_phase(1, "Segmentation", crate::arch::gdt::init)?;
    init_phase(2, "Interrupts", crate::interrupts::init)?;
    init_phase(3, "Heap", || {
        kernel.mm_init();
        Ok(())
    })?;
    init_phase(4, "Scheduler", || {
        kernel.scheduler_init();
        Ok(())
    })?;

    println!("\n✅ Kernel initialization complete!\n");
    Ok(())
}

fn init_phase(
    step: usize,
    name: &'static str,
    init_fn: impl FnOnce() -> Result<(), &'static str>,
) -> Result<(), &'static str> {
    update_component_status(name, InitStatus::InProgress);
    println!("[{}/{}] Initializing {}...", step, PHASES.len(), name);

    match init_fn() {
        Ok(()) => {
            update_component_status(name, InitStatus::Completed);
            println!("    ✓ {} initialized successfully\n", name);
            Ok(())
        }
        Err(e) => {
            update_component_status(name, InitStatus::Failed(e));
            println!("    ✗ {} failed: {}\n", name, e);
            Err(e)
        }
    }
}
