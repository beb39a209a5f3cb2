mod table;

pub use table::{DescriptorTablePointer, GdtEntry, GlobalDescriptorTable};

pub fn lgdt(ptr: &DescriptorTablePointer) {
    // SAFETY: the pointer was built from a live `GlobalDescriptorTable`.
    unsafe {
        asm!("lgdt [{}]", in(reg) ptr, options(readonly, nostack, preserves_flags));
    }
}
