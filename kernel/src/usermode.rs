//! Ring-0 to ring-3 transition, per spec §4.5: a small trampoline that
//! builds the `iretq` frame by hand and never returns.

use core::arch::asm;

use libx64::{address::VirtualAddr, segments::SegmentSelector};

/// Jumps to ring 3 at `(cs, rip)` with stack `(ss, rsp)` and interrupts
/// enabled. The kernel stack backing this call is the RSP0 slot of the
/// installed TSS, loaded automatically on the next `int 0x80`/exception.
///
/// # Safety
///
/// `cs`/`ss` must be valid ring-3 selectors (RPL=3) in the live GDT, and
/// `rip`/`rsp` must point into mappings this process can execute/write.
pub unsafe fn enter_usermode(cs: SegmentSelector, ss: SegmentSelector, rip: VirtualAddr, rsp: VirtualAddr) -> ! {
    const RFLAGS_IF: u64 = 1 << 9;

    asm!(
        "push {ss}",
        "push {rsp}",
        "push {rflags}",
        "push {cs}",
        "push {rip}",
        "iretq",
        ss = in(reg) u64::from(ss.0),
        rsp = in(reg) rsp.as_u64(),
        rflags = in(reg) RFLAGS_IF,
        cs = in(reg) u64::from(cs.0),
        rip = in(reg) rip.as_u64(),
        options(noreturn)
    );
}
