use crate::{
    address::PhysicalAddr,
    paging::{
        frame::{FrameError, PhysicalFrame},
        table::{Level1, Level2, Level3, Level4, PageLevel},
        Page1Gb, Page2Mb, Page4Kb, PageCheck, PageSize,
    },
};

bitfield::bitfield! {
    #[derive(Clone, Copy)]
    #[repr(transparent)]
    unsafe struct RawPageEntry: u64 {
        /// This bit indicates whether the page-translation table or physical page is loaded
        /// in physical memory. When the P bit is cleared to 0, the table or physical page is
        /// not loaded in physical memory.
        present: 0..1,

        /// This bit controls read/write access to all physical pages mapped by the
        /// table entry.
        rw: 1..2,

        /// This bit controls user (CPL 3) access to all physical pages mapped
        /// by the table entry.
        us: 2..3,

        /// Writeback (0) or writethrough (1) caching policy.
        pwl: 3..4,

        /// Cacheable (0) or not cacheable (1).
        pcd: 4..5,

        /// Set by the processor the first time the entry is read from or written to.
        access: 5..6,

        /// Set by the processor the first time there is a write to the physical page.
        dirty: 6..7,

        /// Set on PDE/PDPE entries that are the final level of the translation hierarchy.
        page_size: 7..8,

        /// The TLB entry for a global page is not invalidated on a CR3 reload.
        global_page: 8..9,

        /// Available for use by system software.
        avl: 9..10,

        pat: 10..11,

        address: 12..59,

        /// Memory protection key, ignored if CR4.PKE=0.
        mpk: 59..63,

        /// Code cannot be executed from the mapped physical pages when set.
        pub nx: 63..64,
    }
}

bitflags::bitflags! {
    /// Software-facing view of the bits a caller is allowed to set on a [`PageEntry`].
    pub struct Flags: u64 {
        const PRESENT    = 1 << 0;
        const RW         = 1 << 1;
        const US         = 1 << 2;
        const PWT        = 1 << 3;
        const PCD        = 1 << 4;
        const ACCESSED   = 1 << 5;
        const DIRTY      = 1 << 6;
        const HUGE       = 1 << 7;
        const GLOBAL     = 1 << 8;
        const NO_EXECUTE = 1 << 63;
    }
}

#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct PageEntry<L: PageLevel> {
    raw: RawPageEntry,
    _level: core::marker::PhantomData<L>,
}

impl<L: PageLevel> core::fmt::Debug for PageEntry<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PageEntry")
            .field("address", &self.address())
            .field("flags", &self.get_flags())
            .finish()
    }
}

impl<L: PageLevel> PageEntry<L> {
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            raw: RawPageEntry::zero(),
            _level: core::marker::PhantomData,
        }
    }

    #[must_use]
    pub fn address(&self) -> PhysicalAddr {
        PhysicalAddr::new(self.raw.0 & 0x000F_FFFF_FFFF_F000)
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.raw.get_present() != 0
    }

    #[must_use]
    pub fn get_flags(&self) -> Flags {
        let mut flags = Flags::empty();
        flags.set(Flags::PRESENT, self.raw.get_present() != 0);
        flags.set(Flags::RW, self.raw.get_rw() != 0);
        flags.set(Flags::US, self.raw.get_us() != 0);
        flags.set(Flags::PWT, self.raw.get_pwl() != 0);
        flags.set(Flags::PCD, self.raw.get_pcd() != 0);
        flags.set(Flags::ACCESSED, self.raw.get_access() != 0);
        flags.set(Flags::DIRTY, self.raw.get_dirty() != 0);
        flags.set(Flags::HUGE, self.raw.get_page_size() != 0);
        flags.set(Flags::GLOBAL, self.raw.get_global_page() != 0);
        flags.set(Flags::NO_EXECUTE, self.raw.get_nx() != 0);
        flags
    }

    pub fn set_flags(&mut self, flags: Flags) {
        let addr = self.raw.get_address();
        self.raw = RawPageEntry::zero()
            .set_present(u64::from(flags.contains(Flags::PRESENT)))
            .set_rw(u64::from(flags.contains(Flags::RW)))
            .set_us(u64::from(flags.contains(Flags::US)))
            .set_pwl(u64::from(flags.contains(Flags::PWT)))
            .set_pcd(u64::from(flags.contains(Flags::PCD)))
            .set_access(u64::from(flags.contains(Flags::ACCESSED)))
            .set_dirty(u64::from(flags.contains(Flags::DIRTY)))
            .set_page_size(u64::from(flags.contains(Flags::HUGE)))
            .set_global_page(u64::from(flags.contains(Flags::GLOBAL)))
            .set_nx(u64::from(flags.contains(Flags::NO_EXECUTE)))
            .set_address(addr);
    }

    pub fn set_frame<const N: u64>(&mut self, addr: PhysicalFrame<N>)
    where
        PageCheck<N>: PageSize,
    {
        self.raw = self.raw.set_address(addr.ptr().as_u64() >> 12);
    }

    /// Clears the entry back to an empty, not-present state.
    pub fn clear(&mut self) {
        self.raw = RawPageEntry::zero();
    }
}

impl PageEntry<Level4> {
    /// # Errors
    ///
    /// Errors if the entry is not present. Level 4 entries never describe huge pages.
    pub fn frame(&self) -> Result<PhysicalFrame<Page4Kb>, FrameError> {
        if !self.is_present() {
            return Err(FrameError::EntryMissing);
        }
        Ok(PhysicalFrame::containing(self.address()))
    }
}

pub enum MappedLevel3Page {
    Page4Kb(PhysicalFrame<Page4Kb>),
    Page1Gb(PhysicalFrame<Page1Gb>),
}

impl PageEntry<Level3> {
    /// # Errors
    ///
    /// Errors if the entry is not present.
    pub fn frame(&self) -> Result<MappedLevel3Page, FrameError> {
        if !self.is_present() {
            return Err(FrameError::EntryMissing);
        }
        if self.raw.get_page_size() != 0 {
            Ok(MappedLevel3Page::Page1Gb(PhysicalFrame::containing(
                self.address(),
            )))
        } else {
            Ok(MappedLevel3Page::Page4Kb(PhysicalFrame::containing(
                self.address(),
            )))
        }
    }
}

pub enum MappedLevel2Page {
    Page4Kb(PhysicalFrame<Page4Kb>),
    Page2Mb(PhysicalFrame<Page2Mb>),
}

impl PageEntry<Level2> {
    /// # Errors
    ///
    /// Errors if the entry is not present.
    pub fn frame(&self) -> Result<MappedLevel2Page, FrameError> {
        if !self.is_present() {
            return Err(FrameError::EntryMissing);
        }
        if self.raw.get_page_size() != 0 {
            Ok(MappedLevel2Page::Page2Mb(PhysicalFrame::containing(
                self.address(),
            )))
        } else {
            Ok(MappedLevel2Page::Page4Kb(PhysicalFrame::containing(
                self.address(),
            )))
        }
    }
}

impl PageEntry<Level1> {
    /// # Errors
    ///
    /// Errors if the entry is not present.
    pub fn frame(&self) -> Result<PhysicalFrame<Page4Kb>, FrameError> {
        if !self.is_present() {
            return Err(FrameError::EntryMissing);
        }
        Ok(PhysicalFrame::containing(self.address()))
    }
}
