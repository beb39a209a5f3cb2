#![feature(alloc_error_handler)]
#![feature(allocator_api)]
#![feature(abi_x86_interrupt)]
#![feature(step_trait)]
#![feature(array_chunks)]
#![no_main]
#![no_std]
#![allow(clippy::cast_possible_truncation, clippy::missing_panics_doc)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate qemu_logger;

extern crate alloc;

use core::panic::PanicInfo;

use stivale_boot::v2::StivaleStruct;

mod boot;
mod elf;
mod init;
pub mod mem;
mod syscall;
mod usermode;

#[no_mangle]
extern "C" fn _start(info: &'static StivaleStruct) -> ! {
    qemu_logger::init().expect("unable to initialize logger");
    info!("kernel loaded");

    let boot_info = boot::parse(info);

    mem::initialize_memory(boot_info.hhdm_base, boot_info.usable_regions.iter().copied());

    {
        let mut frame_alloc = mem::FRAME_ALLOC.lock();
        let mut space_guard = mem::KERNEL_SPACE.lock();
        let space = space_guard.as_mut().expect("memory initialized above");

        space.tear_down_lower_half(&mut frame_alloc);
        trace!("bootloader's lower-half identity map torn down");

        mem::galloc::GLOBAL_ALLOC
            .map(space, &mut frame_alloc)
            .expect("unable to map the global allocator");
    }

    boot::set_boot_info(boot_info);

    init::kinit();
    libx64::sti();

    info!("jumping to init");
    syscall::exec_module("init");

    libx64::diverging_hlt();
}

#[panic_handler]
fn ph(info: &PanicInfo) -> ! {
    error!("PANIC => {}", info);
    libx64::diverging_hlt();
}
