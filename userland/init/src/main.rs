//! The first user-mode module, mirroring `original_source/init/init.c`: a
//! trivial diagnostic that exercises `malloc`/`printf` before exiting back
//! into the shell.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

struct Node {
    num: i32,
}

#[no_mangle]
pub extern "C" fn _start() -> ! {
    libuser::print_s("I am inside the init program :) which has been called from the shell\n");

    let pointer = libuser::malloc(core::mem::size_of::<Node>()).cast::<Node>();

    libuser::printf("sample malloc result %p\n", &[libuser::Arg::Num(pointer as u64)]);

    unsafe { (*pointer).num = 4 };

    libuser::printf(
        "result of writing to the malloc'ed pointer %d\n",
        &[libuser::Arg::Num(unsafe { (*pointer).num } as u64)],
    );

    libuser::exit()
}

#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    libuser::exit()
}
