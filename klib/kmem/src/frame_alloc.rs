//! Single-frame physical allocator.
//!
//! Every usable region handed to us by the bootloader's memory map is walked
//! one 4KiB frame at a time and threaded onto a LIFO freelist. Each free
//! frame stores a single `u64` "next" pointer at its very first byte,
//! addressed through the HHDM so the allocator never needs its own backing
//! storage.

use libx64::{
    address::{PhysicalAddr, VirtualAddr},
    paging::{
        frame::{FrameAllocator, FrameError, PhysicalFrame},
        Page4Kb,
    },
};

/// LIFO freelist of reclaimed 4KiB physical frames.
///
/// Not thread-safe: callers serialize access (see `kcore::sync::SpinMutex`).
pub struct FreeListAllocator {
    head: PhysicalAddr,
    hhdm_base: VirtualAddr,
}

impl FreeListAllocator {
    #[must_use]
    pub const fn uninit() -> Self {
        Self {
            head: PhysicalAddr::null(),
            hhdm_base: VirtualAddr::null(),
        }
    }

    /// Seeds the freelist from a set of `[start, end)` usable physical ranges.
    ///
    /// Ranges are truncated to whole 4KiB frames; a trailing partial frame is
    /// dropped rather than handed out.
    pub fn init(&mut self, hhdm_base: VirtualAddr, regions: impl Iterator<Item = (PhysicalAddr, PhysicalAddr)>) {
        self.hhdm_base = hhdm_base;
        self.head = PhysicalAddr::null();

        for (start, end) in regions {
            let mut frame = start.align_down(Page4Kb) + frame_round_up(start);
            while frame.as_u64() + Page4Kb <= end.as_u64() {
                self.free(frame);
                frame = frame + Page4Kb;
            }
        }
    }

    /// # Safety
    ///
    /// `frame` must be addressable through the HHDM, i.e. it must be a
    /// physical address the bootloader reported as usable.
    unsafe fn node_ptr(&self, frame: PhysicalAddr) -> *mut u64 {
        (self.hhdm_base + frame.as_u64())
            .ptr::<u64>()
            .expect("frame address is not HHDM-addressable")
            .as_ptr()
    }

    /// Returns a free frame, or [`PhysicalAddr::null`] if none remain.
    ///
    /// Returned memory has undefined contents; callers that need a zeroed
    /// frame (e.g. a fresh page table) must zero it themselves.
    #[must_use]
    pub fn alloc(&mut self) -> PhysicalAddr {
        if self.head.is_null() {
            return PhysicalAddr::null();
        }

        let frame = self.head;
        // SAFETY: `frame` was pushed by a previous `free`, so it is a usable
        // frame addressable through the HHDM.
        let next = unsafe { self.node_ptr(frame).read() };
        self.head = PhysicalAddr::new(next);
        frame
    }

    /// Returns a frame to the freelist. A no-op on the null address.
    pub fn free(&mut self, frame: PhysicalAddr) {
        if frame.is_null() {
            return;
        }

        // SAFETY: the caller is returning a frame it previously owned.
        unsafe { self.node_ptr(frame).write(self.head.as_u64()) };
        self.head = frame;
    }
}

impl FrameAllocator<Page4Kb> for FreeListAllocator {
    fn alloc(&mut self) -> Result<PhysicalFrame<Page4Kb>, FrameError> {
        let raw = self.alloc();
        if raw.is_null() {
            Err(FrameError::Alloc)
        } else {
            Ok(PhysicalFrame::containing(raw))
        }
    }
}

const fn frame_round_up(addr: PhysicalAddr) -> u64 {
    let rem = addr.as_u64() % Page4Kb;
    if rem == 0 {
        0
    } else {
        Page4Kb - rem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backing "physical memory" for host tests: the allocator addresses it
    /// through an HHDM base equal to this buffer's own address, so physical
    /// address 0 in these tests is simply `ARENA[0]`.
    #[repr(align(4096))]
    struct Arena([u8; 256 * Page4Kb as usize]);

    fn arena_allocator(arena: &mut Arena) -> FreeListAllocator {
        let hhdm_base = VirtualAddr::from_ptr(arena.0.as_ptr());
        let mut alloc = FreeListAllocator::uninit();
        alloc.init(
            hhdm_base,
            core::iter::once((PhysicalAddr::new(0), PhysicalAddr::new(arena.0.len() as u64))),
        );
        alloc
    }

    #[test]
    fn fill_and_drain_256_frames() {
        let mut arena = Arena([0; 256 * Page4Kb as usize]);
        let mut alloc = arena_allocator(&mut arena);

        let mut frames = alloc::vec::Vec::new();
        loop {
            let f = alloc.alloc();
            if f.is_null() {
                break;
            }
            frames.push(f);
        }

        assert_eq!(frames.len(), 256);

        for f in frames {
            alloc.free(f);
        }

        let mut count = 0;
        while !alloc.alloc().is_null() {
            count += 1;
        }
        assert_eq!(count, 256);
    }

    #[test]
    fn alloc_is_lifo() {
        let mut arena = Arena([0; 256 * Page4Kb as usize]);
        let mut alloc = arena_allocator(&mut arena);

        let a = alloc.alloc();
        let b = alloc.alloc();
        alloc.free(a);
        alloc.free(b);

        // last freed (b) must come back first
        assert_eq!(alloc.alloc(), b);
        assert_eq!(alloc.alloc(), a);
    }

    #[test]
    fn free_of_null_is_noop() {
        let mut arena = Arena([0; 256 * Page4Kb as usize]);
        let mut alloc = arena_allocator(&mut arena);

        let before = alloc.alloc();
        alloc.free(before);
        alloc.free(PhysicalAddr::null());

        assert_eq!(alloc.alloc(), before);
    }
}
