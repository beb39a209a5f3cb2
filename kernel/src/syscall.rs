//! The `int 0x80` syscall dispatcher, per spec §4.6 and
//! `original_source/kernel/syscallC.c`.

use core::arch::global_asm;

use kcore::sync::SpinMutex;
use libx64::address::VirtualAddr;

use crate::{boot, elf, mem::KERNEL_SPACE};

global_asm!(include_str!("asm/syscall_entry.s"));

extern "C" {
    /// Raw trap-gate entry point installed at IDT vector `0x80`. Defined in
    /// `asm/syscall_entry.s`; never called directly from Rust.
    pub fn syscall_entry();
}

const SYS_WRITE: u64 = 0;
const SYS_READ: u64 = 1;
const SYS_MMAP: u64 = 2;
const SYS_EXEC: u64 = 3;
const SYS_EXIT: u64 = 4;

/// Bump pointer for `mmap`, per `syscallC.c`'s `malloc_pointer`. Starts at a
/// high canonical address and only ever grows.
static MMAP_BUMP: SpinMutex<u64> = SpinMutex::new(elf::MMAP_BASE);

/// Called from `syscall_entry` with the marshaled arguments in C-ABI
/// registers. Every path returns a value; only `exec`/`exit` may instead
/// fail to return control to the caller at all (they re-enter ring 3
/// directly via a fresh [`crate::usermode::enter_usermode`]).
#[no_mangle]
extern "C" fn syscall_dispatch(num: u64, arg0: u64, arg1: u64, arg2: u64, arg3: u64, arg4: u64) -> u64 {
    match num {
        SYS_WRITE => sys_write(arg0, arg1, arg2),
        SYS_READ => sys_read(arg0, arg1, arg2),
        SYS_MMAP => sys_mmap(arg1 != 0, arg2 != 0, arg3 != 0, arg4),
        SYS_EXEC => sys_exec(arg0),
        SYS_EXIT => sys_exit(),
        other => {
            error!("you've called a syscall that doesn't exist!! ({})", other);
            other
        }
    }
}

fn sys_write(fd: u64, buf: u64, count: u64) -> u64 {
    if fd != 1 && fd != 2 {
        return u64::MAX;
    }
    let bytes = unsafe { core::slice::from_raw_parts(buf as *const u8, count as usize) };
    boot::term_write(bytes);
    count
}

fn sys_read(fd: u64, buf: u64, count: u64) -> u64 {
    if fd != 0 {
        return u64::MAX;
    }

    let base = buf as *mut u8;
    let mut cursor: isize = 0;
    let mut i: i64 = 0;
    while i < count as i64 {
        let ch = keyboard::Keyboard::getc(&crate::init::KEYBOARD);
        if ch == 8 {
            // backspace: zero the eaten byte and step the cursor back two
            // slots, matching syscallC.c's `char_buf -= 1; i -= 2;`.
            unsafe { *base.offset(cursor) = 0 };
            cursor -= 1;
            i -= 2;
        } else {
            unsafe { *base.offset(cursor) = ch };
            cursor += 1;
        }
        i += 1;
    }
    count
}

/// One page is mapped per call irrespective of `len` (documented quirk);
/// the bump pointer still advances by the full rounded-up length.
fn sys_mmap(user: bool, writable: bool, executable: bool, len: u64) -> u64 {
    let mut bump = MMAP_BUMP.lock();
    let addr = *bump;

    let mut frame_alloc = crate::mem::FRAME_ALLOC.lock();
    let mut space_guard = KERNEL_SPACE.lock();
    let space = space_guard.as_mut().expect("memory not initialized");

    let frame = frame_alloc.alloc();
    if frame.is_null() {
        return 0;
    }
    let frame = libx64::paging::frame::PhysicalFrame::containing(frame);

    if !space.map(&mut frame_alloc, VirtualAddr::new(addr), frame, user, writable, executable) {
        return 0;
    }

    let pages = (len + 4095) / 4096;
    *bump += pages * 4096;
    addr
}

/// Looks up `name` among the bootloader-provided modules and, if found,
/// execs it. Does not return on success; does not tear down the caller's
/// old address space beyond the structural unmap `elf::exec` already does.
pub(crate) fn exec_module(name: &str) -> u64 {
    let Some((begin, end)) = boot::find_module(name) else {
        return 1;
    };
    let len = (end.as_u64() - begin.as_u64()) as usize;
    let image = unsafe { core::slice::from_raw_parts(begin.ptr::<u8>().unwrap().as_ptr(), len) };

    let entry = elf::exec(image);

    let (_, selectors) = &*crate::init::GDT;
    unsafe {
        crate::usermode::enter_usermode(selectors.user_code_segment, selectors.user_data_segment, entry.rip, entry.rsp)
    }
}

fn sys_exec(name_ptr: u64) -> u64 {
    let name = unsafe { read_cstr(name_ptr as *const u8) };
    exec_module(name)
}

fn sys_exit() -> u64 {
    exec_module("shell")
}

/// # Safety
///
/// `ptr` must point at a valid NUL-terminated, UTF-8 byte sequence.
unsafe fn read_cstr<'a>(ptr: *const u8) -> &'a str {
    let mut len = 0usize;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    core::str::from_utf8_unchecked(core::slice::from_raw_parts(ptr, len))
}
