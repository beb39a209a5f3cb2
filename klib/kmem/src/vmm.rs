//! Pure page-table manipulation.
//!
//! Every operation here only ever touches memory reachable through the
//! HHDM: no `invlpg`, no CR3 reload, no privileged instruction of any kind.
//! That split is what makes the walk itself host-testable; the thin
//! hardware-touching half (flushing the TLB after a structural change,
//! switching CR3) lives in the kernel binary that wires this up.

use core::pin::Pin;

use libx64::{
    address::{PhysicalAddr, VirtualAddr},
    paging::{
        entry::{Flags, MappedLevel2Page, MappedLevel3Page},
        frame::{FrameError, PhysicalFrame},
        invlpg,
        page::{Page, PageMapper},
        table::{Level1, Level2, Level3, Level4, PageLevel, PageTable, PageTableIndex},
        Page4Kb,
    },
};

use crate::frame_alloc::FreeListAllocator;

/// An x86-64 four-level page-table hierarchy, addressed through a fixed HHDM
/// window rather than through `CR3`.
pub struct AddressSpace {
    root: PhysicalFrame<Page4Kb>,
    hhdm_base: VirtualAddr,
}

/// # Safety
///
/// `frame` must hold a live `PageTable<L>` and must be addressable through
/// `hhdm_base`.
unsafe fn table_at<'a, L: PageLevel>(
    hhdm_base: VirtualAddr,
    frame: PhysicalFrame<Page4Kb>,
) -> Pin<&'a mut PageTable<L>> {
    let ptr = (hhdm_base + frame.ptr().as_u64())
        .ptr::<PageTable<L>>()
        .expect("frame is not HHDM-addressable");
    Pin::new_unchecked(&mut *ptr.as_ptr())
}

fn zero_frame(hhdm_base: VirtualAddr, frame: PhysicalFrame<Page4Kb>) {
    let ptr = (hhdm_base + frame.ptr().as_u64())
        .ptr::<u8>()
        .expect("frame is not HHDM-addressable")
        .as_ptr();
    // SAFETY: a freshly allocated frame, addressable through the HHDM, 4KiB long.
    unsafe { core::ptr::write_bytes(ptr, 0, Page4Kb as usize) };
}

fn leaf_flags(user: bool, writable: bool, executable: bool) -> Flags {
    let mut flags = Flags::PRESENT;
    flags.set(Flags::US, user);
    flags.set(Flags::RW, writable);
    flags.set(Flags::NO_EXECUTE, !executable);
    flags
}

impl AddressSpace {
    #[must_use]
    pub const fn new(root: PhysicalFrame<Page4Kb>, hhdm_base: VirtualAddr) -> Self {
        Self { root, hhdm_base }
    }

    #[must_use]
    pub const fn root(&self) -> PhysicalFrame<Page4Kb> {
        self.root
    }

    fn take_frame(&self, alloc: &mut FreeListAllocator) -> Option<PhysicalFrame<Page4Kb>> {
        let raw = alloc.alloc();
        if raw.is_null() {
            return None;
        }
        let frame = PhysicalFrame::containing(raw);
        zero_frame(self.hhdm_base, frame);
        Some(frame)
    }

    /// Maps `virt` to `phys`, allocating any missing intermediate page
    /// tables from `alloc`.
    ///
    /// Returns `false` if the allocator runs out of frames partway through
    /// the walk, or if an existing huge-page mapping blocks the path. Any
    /// intermediate tables already created up to the point of failure are
    /// left in place rather than rolled back.
    pub fn map(
        &mut self,
        alloc: &mut FreeListAllocator,
        virt: VirtualAddr,
        phys: PhysicalFrame<Page4Kb>,
        user: bool,
        writable: bool,
        executable: bool,
    ) -> bool {
        let non_leaf = Flags::PRESENT | Flags::US | Flags::RW;

        let mut l4 = unsafe { table_at::<Level4>(self.hhdm_base, self.root) };
        let mut e4 = l4.as_mut().index_pin_mut(virt.page_table_index::<Level4>());
        let l3_frame = if e4.is_present() {
            e4.frame().expect("present level4 entry without frame")
        } else {
            let frame = match self.take_frame(alloc) {
                Some(f) => f,
                None => return false,
            };
            e4.set_frame(frame);
            e4.set_flags(non_leaf);
            frame
        };

        let mut l3 = unsafe { table_at::<Level3>(self.hhdm_base, l3_frame) };
        let mut e3 = l3.as_mut().index_pin_mut(virt.page_table_index::<Level3>());
        let l2_frame = if e3.is_present() {
            match e3.frame().expect("present level3 entry without frame") {
                MappedLevel3Page::Page4Kb(f) => f,
                MappedLevel3Page::Page1Gb(_) => return false,
            }
        } else {
            let frame = match self.take_frame(alloc) {
                Some(f) => f,
                None => return false,
            };
            e3.set_frame(frame);
            e3.set_flags(non_leaf);
            frame
        };

        let mut l2 = unsafe { table_at::<Level2>(self.hhdm_base, l2_frame) };
        let mut e2 = l2.as_mut().index_pin_mut(virt.page_table_index::<Level2>());
        let l1_frame = if e2.is_present() {
            match e2.frame().expect("present level2 entry without frame") {
                MappedLevel2Page::Page4Kb(f) => f,
                MappedLevel2Page::Page2Mb(_) => return false,
            }
        } else {
            let frame = match self.take_frame(alloc) {
                Some(f) => f,
                None => return false,
            };
            e2.set_frame(frame);
            e2.set_flags(non_leaf);
            frame
        };

        let mut l1 = unsafe { table_at::<Level1>(self.hhdm_base, l1_frame) };
        let mut e1 = l1.as_mut().index_pin_mut(virt.page_table_index::<Level1>());
        e1.set_frame(phys);
        e1.set_flags(leaf_flags(user, writable, executable));

        true
    }

    /// Walks down to (but does not allocate) the level-1 table that would
    /// hold `virt`'s leaf entry. `None` if any intermediate table is
    /// missing or a huge page shadows the address.
    fn walk_l1<'a>(&self, virt: VirtualAddr) -> Option<Pin<&'a mut PageTable<Level1>>> {
        let l4 = unsafe { table_at::<Level4>(self.hhdm_base, self.root) };
        let e4 = l4.as_ref().index_pin(virt.page_table_index::<Level4>());
        if !e4.is_present() {
            return None;
        }
        let l3_frame = e4.frame().ok()?;

        let l3 = unsafe { table_at::<Level3>(self.hhdm_base, l3_frame) };
        let e3 = l3.as_ref().index_pin(virt.page_table_index::<Level3>());
        if !e3.is_present() {
            return None;
        }
        let l2_frame = match e3.frame().ok()? {
            MappedLevel3Page::Page4Kb(f) => f,
            MappedLevel3Page::Page1Gb(_) => return None,
        };

        let l2 = unsafe { table_at::<Level2>(self.hhdm_base, l2_frame) };
        let e2 = l2.as_ref().index_pin(virt.page_table_index::<Level2>());
        if !e2.is_present() {
            return None;
        }
        let l1_frame = match e2.frame().ok()? {
            MappedLevel2Page::Page4Kb(f) => f,
            MappedLevel2Page::Page2Mb(_) => return None,
        };

        Some(unsafe { table_at::<Level1>(self.hhdm_base, l1_frame) })
    }

    /// Translates `virt` through the current tables with no permission
    /// check, returning the physical address and the leaf's flags.
    #[must_use]
    pub fn translate(&self, virt: VirtualAddr) -> Option<(PhysicalAddr, Flags)> {
        let l1 = self.walk_l1(virt)?;
        let e1 = l1.as_ref().index_pin(virt.page_table_index::<Level1>());
        if !e1.is_present() {
            return None;
        }
        let frame = e1.frame().ok()?;
        Some((frame.ptr() + u64::from(virt.page_offset()), e1.get_flags()))
    }

    /// Changes only the leaf permission bits for an already-mapped `virt`.
    /// Returns `false` if `virt` is not currently mapped.
    pub fn protect(&mut self, virt: VirtualAddr, user: bool, writable: bool, executable: bool) -> bool {
        let mut l1 = match self.walk_l1(virt) {
            Some(t) => t,
            None => return false,
        };
        let mut e1 = l1.as_mut().index_pin_mut(virt.page_table_index::<Level1>());
        if !e1.is_present() {
            return false;
        }
        e1.set_flags(leaf_flags(user, writable, executable));
        true
    }

    /// Clears `virt`'s leaf entry and returns the physical frame it used to
    /// point at, read from the entry's own address field (not derived from
    /// table-pointer arithmetic). `None` if `virt` was not mapped.
    pub fn unmap(&mut self, virt: VirtualAddr) -> Option<PhysicalFrame<Page4Kb>> {
        let mut l1 = self.walk_l1(virt)?;
        let mut e1 = l1.as_mut().index_pin_mut(virt.page_table_index::<Level1>());
        if !e1.is_present() {
            return None;
        }
        let frame = e1.frame().ok()?;
        e1.clear();
        Some(frame)
    }

    /// Tears down every level-4 entry in the lower half (indices `0..256`),
    /// recursively freeing the L3/L2/L1 *table* frames back to `alloc`.
    /// Leaf data frames are left untouched: the caller owns them.
    pub fn tear_down_lower_half(&mut self, alloc: &mut FreeListAllocator) {
        let mut l4 = unsafe { table_at::<Level4>(self.hhdm_base, self.root) };
        for idx in 0..256u16 {
            let index = PageTableIndex::<Level4>::new_truncate(idx);
            let mut e4 = l4.as_mut().index_pin_mut(index);
            if !e4.is_present() {
                continue;
            }
            if let Ok(l3_frame) = e4.frame() {
                self.free_l3_table(l3_frame, alloc);
                alloc.free(l3_frame.ptr());
            }
            e4.clear();
        }
    }

    fn free_l3_table(&mut self, frame: PhysicalFrame<Page4Kb>, alloc: &mut FreeListAllocator) {
        let mut l3 = unsafe { table_at::<Level3>(self.hhdm_base, frame) };
        for idx in 0..512u16 {
            let index = PageTableIndex::<Level3>::new_truncate(idx);
            let mut e3 = l3.as_mut().index_pin_mut(index);
            if !e3.is_present() {
                continue;
            }
            if let Ok(MappedLevel3Page::Page4Kb(l2_frame)) = e3.frame() {
                self.free_l2_table(l2_frame, alloc);
                alloc.free(l2_frame.ptr());
            }
            e3.clear();
        }
    }

    fn free_l2_table(&mut self, frame: PhysicalFrame<Page4Kb>, alloc: &mut FreeListAllocator) {
        let mut l2 = unsafe { table_at::<Level2>(self.hhdm_base, frame) };
        for idx in 0..512u16 {
            let index = PageTableIndex::<Level2>::new_truncate(idx);
            let mut e2 = l2.as_mut().index_pin_mut(index);
            if !e2.is_present() {
                continue;
            }
            // The L1 table itself is a structural frame and gets freed; its
            // leaf entries (the data frames they point at) are not touched.
            if let Ok(MappedLevel2Page::Page4Kb(l1_frame)) = e2.frame() {
                alloc.free(l1_frame.ptr());
            }
            e2.clear();
        }
    }
}

/// Thin hardware-touching wrapper around the pure walk above: every method
/// here flushes the TLB entry it just invalidated. Kept monomorphic over
/// [`Page4Kb`] since this kernel never maps 2MiB/1GiB leaves.
impl PageMapper<FreeListAllocator, Page4Kb> for AddressSpace {
    fn map(
        &mut self,
        page: Page<Page4Kb>,
        frame: PhysicalFrame<Page4Kb>,
        flags: Flags,
        allocator: &mut FreeListAllocator,
    ) -> Result<(), FrameError> {
        let user = flags.contains(Flags::US);
        let writable = flags.contains(Flags::RW);
        let executable = !flags.contains(Flags::NO_EXECUTE);
        if self.map(allocator, page.ptr(), frame, user, writable, executable) {
            invlpg(page.ptr());
            Ok(())
        } else {
            Err(FrameError::Alloc)
        }
    }

    fn unmap(&mut self, page: Page<Page4Kb>) -> Result<PhysicalFrame<Page4Kb>, FrameError> {
        match self.unmap(page.ptr()) {
            Some(frame) => {
                invlpg(page.ptr());
                Ok(frame)
            }
            None => Err(FrameError::EntryMissing),
        }
    }

    fn protect(&mut self, page: Page<Page4Kb>, flags: Flags) -> Result<(), FrameError> {
        let user = flags.contains(Flags::US);
        let writable = flags.contains(Flags::RW);
        let executable = !flags.contains(Flags::NO_EXECUTE);
        if self.protect(page.ptr(), user, writable, executable) {
            invlpg(page.ptr());
            Ok(())
        } else {
            Err(FrameError::EntryMissing)
        }
    }

    fn translate(&mut self, addr: VirtualAddr) -> Result<PhysicalAddr, FrameError> {
        AddressSpace::translate(self, addr)
            .map(|(phys, _)| phys)
            .ok_or(FrameError::EntryMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(align(4096))]
    struct Arena([u8; 512 * Page4Kb as usize]);

    fn new_space(arena: &mut Arena) -> (AddressSpace, FreeListAllocator) {
        let hhdm_base = VirtualAddr::from_ptr(arena.0.as_ptr());
        let mut alloc = FreeListAllocator::uninit();
        alloc.init(
            hhdm_base,
            core::iter::once((PhysicalAddr::new(0), PhysicalAddr::new(arena.0.len() as u64))),
        );

        let root = PhysicalFrame::containing(alloc.alloc());
        zero_frame(hhdm_base, root);

        (AddressSpace::new(root, hhdm_base), alloc)
    }

    #[test]
    fn map_translate_unmap_roundtrip() {
        let mut arena = Arena([0; 512 * Page4Kb as usize]);
        let (mut space, mut alloc) = new_space(&mut arena);

        let virt = VirtualAddr::new(0x5000_4000);
        let data = PhysicalFrame::containing(alloc.alloc());

        assert!(space.map(&mut alloc, virt, data, true, true, false));

        let (addr, flags) = space.translate(virt).expect("mapped");
        assert_eq!(addr, data.ptr());
        assert!(flags.contains(Flags::PRESENT | Flags::US | Flags::RW));
        assert!(flags.contains(Flags::NO_EXECUTE));

        let freed = space.unmap(virt).expect("was mapped");
        assert_eq!(freed, data);
        assert!(space.translate(virt).is_none());
    }

    #[test]
    fn protect_changes_only_the_leaf() {
        let mut arena = Arena([0; 512 * Page4Kb as usize]);
        let (mut space, mut alloc) = new_space(&mut arena);

        let virt = VirtualAddr::new(0x7000_0000_0000);
        let data = PhysicalFrame::containing(alloc.alloc());
        assert!(space.map(&mut alloc, virt, data, true, true, false));

        assert!(space.protect(virt, true, false, false));
        let (addr, flags) = space.translate(virt).unwrap();
        assert_eq!(addr, data.ptr());
        assert!(!flags.contains(Flags::RW));

        // A neighbouring, never-mapped address must remain untouched.
        assert!(space.translate(virt + Page4Kb).is_none());
    }

    #[test]
    fn unmap_of_unmapped_address_is_none() {
        let mut arena = Arena([0; 512 * Page4Kb as usize]);
        let (mut space, _alloc) = new_space(&mut arena);
        assert!(space.unmap(VirtualAddr::new(0x1234_5000)).is_none());
    }

    #[test]
    fn tear_down_lower_half_reclaims_table_frames_but_not_data() {
        let mut arena = Arena([0; 512 * Page4Kb as usize]);
        let (mut space, mut alloc) = new_space(&mut arena);

        let virt = VirtualAddr::new(0x40_0000);
        let data = PhysicalFrame::containing(alloc.alloc());
        assert!(space.map(&mut alloc, virt, data, true, true, true));

        space.tear_down_lower_half(&mut alloc);
        assert!(space.translate(virt).is_none());

        // The L3/L2/L1 table frames the walk allocated come back, the data
        // frame does not (its owner never freed it).
        let mut reclaimed = 0;
        while !alloc.alloc().is_null() {
            reclaimed += 1;
        }
        assert!(reclaimed >= 3);
    }
}
