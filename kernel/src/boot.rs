//! stivale2 handshake: header tags requested from the bootloader, and the
//! thin translation from the struct tags it hands back into this kernel's
//! own `(PhysicalAddr, PhysicalAddr)` / `VirtualAddr` vocabulary.
//!
//! Everything that knows about `stivale_boot`'s wire types lives here; the
//! rest of the kernel only sees the plain types in [`mem`](crate::mem).

use kcore::sync::SpinMutex;
use libx64::address::{PhysicalAddr, VirtualAddr};

use stivale_boot::v2::{
    StivaleHeader, StivaleMemoryMapEntryType, StivaleStruct, StivaleTerminalHeaderTag,
    StivaleUnmapNullHeaderTag,
};

const STACK_SIZE: usize = 4096 * 8;

#[repr(C, align(16))]
struct Stack([u8; STACK_SIZE]);
static STACK: Stack = Stack([0; STACK_SIZE]);

static TERMINAL_HDR_TAG: StivaleTerminalHeaderTag = StivaleTerminalHeaderTag::new();
static UNMAP_NULL_HDR_TAG: StivaleUnmapNullHeaderTag =
    StivaleUnmapNullHeaderTag::new().next((&TERMINAL_HDR_TAG as *const StivaleTerminalHeaderTag).addr());

/// Flags requested: higher-half pointers (bit 1), PMRs (bit 2), virtual
/// kernel mappings (bit 3), required (bit 4) — `0x1E`.
const STIVALE_HDR_FLAGS: u64 = 0x1E;

#[link_section = ".stivale2hdr"]
#[used]
static STIVALE_HDR: StivaleHeader = StivaleHeader::new()
    .stack(STACK.0.as_ptr_range().end)
    .flags(STIVALE_HDR_FLAGS)
    .tags((&UNMAP_NULL_HDR_TAG as *const StivaleUnmapNullHeaderTag).addr());

/// Everything the kernel's early boot path needs, pulled out of the
/// bootloader's tag list in one pass.
pub struct BootInfo {
    pub hhdm_base: VirtualAddr,
    pub term_write: extern "C" fn(*const u8, usize),
    pub usable_regions: alloc::vec::Vec<(PhysicalAddr, PhysicalAddr)>,
    pub modules: alloc::vec::Vec<Module>,
}

pub struct Module {
    pub name: alloc::string::String,
    pub begin: VirtualAddr,
    pub end: VirtualAddr,
}

impl Module {
    /// Safe only once the HHDM/module mapping this address came from is
    /// still live, which holds for the lifetime of the whole kernel here.
    #[must_use]
    pub fn as_slice(&self) -> &'static [u8] {
        let len = (self.end.as_u64() - self.begin.as_u64()) as usize;
        let ptr = self.begin.ptr::<u8>().expect("module not mapped").as_ptr();
        unsafe { core::slice::from_raw_parts(ptr, len) }
    }
}

/// Walks every struct tag this kernel asked for and reports an absent
/// mandatory tag as a boot-time panic: without HHDM, memory map, or
/// modules there is nothing further the kernel can safely do.
pub fn parse(info: &'static StivaleStruct) -> BootInfo {
    let hhdm = info.hhdm().expect("bootloader did not provide an HHDM tag");
    let memmap = info
        .memory_map()
        .expect("bootloader did not provide a memory map tag");
    let modules = info
        .modules()
        .expect("bootloader did not provide a modules tag");
    let terminal = info
        .terminal()
        .expect("bootloader did not provide a terminal tag");

    let hhdm_base = VirtualAddr::new(hhdm.addr);

    let usable_regions = memmap
        .iter()
        .filter(|e| e.entry_type == StivaleMemoryMapEntryType::Usable)
        .map(|e| {
            (
                PhysicalAddr::new(e.base),
                PhysicalAddr::new(e.base + e.length),
            )
        })
        .collect();

    let modules = modules
        .iter()
        .map(|m| Module {
            name: m.as_str().into(),
            begin: VirtualAddr::new(m.begin),
            end: VirtualAddr::new(m.end),
        })
        .collect();

    BootInfo {
        hhdm_base,
        term_write: terminal.term_write(),
        usable_regions,
        modules,
    }
}

/// Parsed boot info, stashed once at startup so the syscall dispatcher and
/// the shell's `exec` builtin can reach the terminal and the module table
/// without threading a reference through every call.
pub static BOOT_INFO: SpinMutex<Option<BootInfo>> = SpinMutex::new(None);

pub fn set_boot_info(info: BootInfo) {
    *BOOT_INFO.lock() = Some(info);
}

/// Writes `bytes` through the bootloader's terminal callback.
pub fn term_write(bytes: &[u8]) {
    let guard = BOOT_INFO.lock();
    let info = guard.as_ref().expect("boot info not initialized");
    (info.term_write)(bytes.as_ptr(), bytes.len());
}

/// Looks up a module by its exact name among those the bootloader handed
/// over, returning its in-memory byte range.
#[must_use]
pub fn find_module(name: &str) -> Option<(VirtualAddr, VirtualAddr)> {
    let guard = BOOT_INFO.lock();
    let info = guard.as_ref().expect("boot info not initialized");
    info.modules
        .iter()
        .find(|m| m.name == name)
        .map(|m| (m.begin, m.end))
}

trait AsAddr {
    fn addr(&self) -> u64;
}

impl<T> AsAddr for *const T {
    fn addr(&self) -> u64 {
        *self as u64
    }
}
