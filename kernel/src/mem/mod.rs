use alloc::alloc::Layout;

use kcore::sync::SpinMutex;
use kmem::{frame_alloc::FreeListAllocator, vmm::AddressSpace};
use libx64::{
    address::{PhysicalAddr, VirtualAddr},
    control::cr3,
};

pub mod galloc;
pub mod mmo;

/// The physical frame freelist, seeded once from the stivale2 memory map.
pub static FRAME_ALLOC: SpinMutex<FreeListAllocator> = SpinMutex::new(FreeListAllocator::uninit());

/// The kernel's own page tables (the set CR3 pointed at on entry), addressed
/// through the HHDM once it is known. `None` until `initialize_memory` runs.
pub static KERNEL_SPACE: SpinMutex<Option<AddressSpace>> = SpinMutex::new(None);

/// Base of the bootloader's higher-half direct map of all physical memory.
pub static HHDM_BASE: SpinMutex<VirtualAddr> = SpinMutex::new(VirtualAddr::null());

#[must_use]
pub fn hhdm_base() -> VirtualAddr {
    *HHDM_BASE.lock()
}

/// Seeds the frame allocator from the usable ranges of the bootloader's
/// memory map and takes ownership of the page tables CR3 already points at.
///
/// Must run before any other memory-management operation (`exec`, `mmap`,
/// heap allocation) and exactly once.
pub fn initialize_memory(hhdm_base: VirtualAddr, regions: impl Iterator<Item = (PhysicalAddr, PhysicalAddr)>) {
    *HHDM_BASE.lock() = hhdm_base;
    FRAME_ALLOC.lock().init(hhdm_base, regions);
    *KERNEL_SPACE.lock() = Some(AddressSpace::new(cr3().frame(), hhdm_base));
    info!("memory initialized, hhdm_base = {:?}", hhdm_base);
}

#[alloc_error_handler]
fn alloc_error_handler(error: Layout) -> ! {
    error!("ALLOC ERROR => {:?}", error);
    libx64::diverging_hlt();
}
