//! ELF64 loading for the single user-mode module carried by the bootloader.
//!
//! Grounded in `exec.c`'s `exec()`: map each `PT_LOAD` segment permissively,
//! copy in its file bytes, then drop the mapping down to its real
//! permissions — matching the original's behaviour bug-for-bug, including
//! never reclaiming the caller's old leaf data frames.

use xmas_elf::{
    program::{ProgramHeader, Type},
    ElfFile,
};

use kmem::{frame_alloc::FreeListAllocator, vmm::AddressSpace};
use libx64::{
    address::VirtualAddr,
    paging::{frame::PhysicalFrame, Page4Kb},
};

use crate::mem::{hhdm_base, FRAME_ALLOC, KERNEL_SPACE};

/// Top of the region `mmap` bumps out of, per `syscallC.c`'s `malloc_pointer`.
pub const MMAP_BASE: u64 = 0x8000_0000_0000;

/// Where the user stack for a freshly-exec'd module is mapped, per `exec.c`.
const USER_STACK_TOP: u64 = 0x7000_0000_0000;
const USER_STACK_PAGES: u64 = 8;

/// Everything needed to jump into a freshly loaded ELF image in ring 3.
pub struct EntryPoint {
    pub rip: VirtualAddr,
    pub rsp: VirtualAddr,
}

/// Loads `image` into the current address space and maps a fresh user
/// stack, returning the ring-3 entry point.
///
/// Does not tear down a previous exec's mappings: the lower half is only
/// ever torn down once, at boot (see `main.rs`). Leaf data frames from a
/// prior exec are intentionally leaked, matching the original kernel.
pub fn exec(image: &[u8]) -> EntryPoint {
    let elf = ElfFile::new(image).expect("malformed ELF image");
    xmas_elf::header::sanity_check(&elf).expect("ELF sanity check failed");

    let mut frame_alloc = FRAME_ALLOC.lock();
    let mut space_guard = KERNEL_SPACE.lock();
    let space = space_guard.as_mut().expect("memory not initialized");

    for ph in elf.program_iter() {
        if ph.get_type() != Ok(Type::Load) || ph.mem_size() == 0 {
            continue;
        }
        load_segment(space, &mut frame_alloc, &elf, ph);
    }

    let stack_top = VirtualAddr::new(USER_STACK_TOP);
    map_user_stack(space, &mut frame_alloc, stack_top);

    EntryPoint {
        rip: VirtualAddr::new(elf.header.pt2.entry_point()),
        rsp: stack_top + USER_STACK_PAGES * Page4Kb,
    }
}

fn load_segment(
    space: &mut AddressSpace,
    alloc: &mut FreeListAllocator,
    elf: &ElfFile,
    ph: ProgramHeader,
) {
    let virt_start = VirtualAddr::new(ph.virtual_addr()).align_down(Page4Kb);
    let virt_end = VirtualAddr::new(ph.virtual_addr() + ph.mem_size()).align_up(Page4Kb);
    let page_count = (virt_end.as_u64() - virt_start.as_u64()) / Page4Kb;

    let data = match ph.get_data(elf).expect("program header data") {
        xmas_elf::program::SegmentData::Undefined(bytes) => bytes,
        _ => &[],
    };

    for i in 0..page_count {
        let page_virt = virt_start + i * Page4Kb;
        let frame = alloc.alloc();
        assert!(!frame.is_null(), "out of physical memory loading segment");
        let frame = PhysicalFrame::containing(frame);

        // Mapped writable regardless of the segment's real permissions so
        // the copy below can always land; dropped to the real flags after.
        assert!(
            space.map(alloc, page_virt, frame, true, true, true),
            "failed to map load segment page"
        );

        let dst = (hhdm_base() + frame.ptr().as_u64())
            .ptr::<u8>()
            .expect("frame not HHDM-addressable")
            .as_ptr();

        let page_file_off = (virt_start.as_u64() + i * Page4Kb) as i64 - ph.virtual_addr() as i64;
        unsafe { core::ptr::write_bytes(dst, 0, Page4Kb as usize) };
        copy_segment_bytes(dst, data, page_file_off, ph.file_size());
    }

    let writable = ph.flags().is_write();
    let executable = ph.flags().is_execute();
    for i in 0..page_count {
        let page_virt = virt_start + i * Page4Kb;
        space.protect(page_virt, true, writable, executable);
    }
}

/// Copies the slice of `data` (the segment's on-file bytes) that overlaps a
/// single destination page, given that page's signed byte offset into the
/// segment's file image.
fn copy_segment_bytes(dst_page: *mut u8, data: &[u8], page_file_off: i64, file_size: u64) {
    let file_size = file_size as i64;
    for byte in 0..Page4Kb as i64 {
        let file_off = page_file_off + byte;
        if file_off < 0 || file_off >= file_size {
            continue;
        }
        unsafe { *dst_page.offset(byte as isize) = data[file_off as usize] };
    }
}

fn map_user_stack(space: &mut AddressSpace, alloc: &mut FreeListAllocator, top: VirtualAddr) {
    for i in 0..USER_STACK_PAGES {
        let frame = alloc.alloc();
        assert!(!frame.is_null(), "out of physical memory for user stack");
        let frame = PhysicalFrame::containing(frame);
        assert!(
            space.map(alloc, top + i * Page4Kb, frame, true, true, false),
            "failed to map user stack page"
        );
    }
}
