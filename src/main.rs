#![cfg_attr(target_os = "none", no_std, no_main)]

#[cfg(target_os = "none")]
mod boot {
    extern crate alloc;
    extern crate rlibc;

    use alloc::vec::Vec;
    use bootloader_api::{entry_point, BootInfo};
    use core::panic::PanicInfo;

    use gamer_kernel::arch::halt_forever;
    use gamer_kernel::config::LOG_LEVEL;
    use gamer_kernel::kernel::{self, KernelAllocator};
    use gamer_kernel::task::EntryPoint;
    use gamer_kernel::{logger, println, syscalls::user};

    #[global_allocator]
    static ALLOCATOR: KernelAllocator = KernelAllocator;

    entry_point!(kernel_main);

    fn kernel_main(_boot_info: &'static mut BootInfo) -> ! {
        if let Err(e) = logger::init(LOG_LEVEL) {
            println!("{}", e);
        }

        let k = kernel::kernel();
        if let Err(e) = kernel::init_kernel(k) {
            println!("Kernel initialization failed: {}", e);
            halt_forever();
        }
        kernel::status::report();

        match k.kmalloc(100) {
            Some(ptr) => {
                log::info!("kmalloc(100) -> {:p}", ptr);
                k.kfree(ptr);
            }
            None => log::error!("kmalloc(100) failed"),
        }

        let demos: [EntryPoint; 3] = [heartbeat, greeter, quitter];
        let pids: Vec<_> = demos
            .iter()
            .filter_map(|&entry| k.create_process(Some(entry)).ok())
            .collect();
        log::info!("created processes {:?}", pids);

        let stats = k.heap_stats();
        log::info!(
            "heap: {} used, {} free in {} blocks",
            stats.used_bytes,
            stats.free_bytes,
            stats.blocks
        );

        k.enable_timer();
        k.register_keyboard(on_scancode);

        if let Err(e) = k.start() {
            log::error!("scheduler did not start: {}", e);
        }
        halt_forever()
    }

    extern "C" fn heartbeat() {
        let pid = user::getpid();
        let mut last = 0;
        loop {
            let now = user::ticks();
            if now >= last + 100 {
                log::info!("process {} alive at tick {}", pid, now);
                last = now;
            }
            x86_64::instructions::hlt();
        }
    }

    extern "C" fn greeter() {
        user::print("hello from a process\n");
    }

    extern "C" fn quitter() {
        for _ in 0..3 {
            user::yield_now();
        }
        user::exit(0)
    }

    fn on_scancode(scancode: u8) {
        log::debug!("scancode {:#04x}", scancode);
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        println!("PANIC : {} | {:?}", info.message(), info.location());
        halt_forever()
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}
