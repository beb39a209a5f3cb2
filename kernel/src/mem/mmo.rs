use alloc::alloc::{AllocError, Allocator, GlobalAlloc, Layout};
use core::ptr::NonNull;

use kmem::{frame_alloc::FreeListAllocator, vmm::AddressSpace};

use libx64::paging::{
    entry::Flags,
    frame::{FrameAllocator, FrameError},
    page::{Page, PageMapper, PageRange},
    Page4Kb, PageCheck, PageSize,
};

/// A resource backed by a fixed run of mapped pages in the kernel's address
/// space: the heap's single `SlabPage`, a stack, an MMIO window, ...
pub struct MemoryMappedObject<T, const P: usize>
where
    PageCheck<P>: PageSize,
{
    resource: T,
    pages: PageRange<P>,
}

impl<T, const P: usize> MemoryMappedObject<T, P>
where
    PageCheck<P>: PageSize,
{
    pub const fn new(resource: T, pages: PageRange<P>) -> Self {
        Self { resource, pages }
    }
    pub const fn resource(&self) -> &T {
        &self.resource
    }

    pub fn into_resource(self) -> T {
        self.resource
    }

    pub const fn pages(&self) -> &PageRange<P> {
        &self.pages
    }
}

impl<T> MemoryMappedObject<T, Page4Kb> {
    /// # Errors
    ///
    /// Errors if `alloc` doesn't have enough frames left to back every page
    /// in this object's range.
    pub fn map(&self, space: &mut AddressSpace, alloc: &mut FreeListAllocator) -> Result<(), FrameError> {
        self.pages.clone().try_for_each(|page| {
            let frame = FrameAllocator::<Page4Kb>::alloc(alloc)?;
            PageMapper::<FreeListAllocator, Page4Kb>::map(
                space,
                page,
                frame,
                Flags::PRESENT | Flags::RW | Flags::US,
                alloc,
            )
        })
    }

    /// # Errors
    ///
    /// Errors if any page in this object's range is not currently mapped.
    pub fn unmap(self, space: &mut AddressSpace) -> Result<(), FrameError> {
        self.pages
            .clone()
            .try_for_each(|page: Page<Page4Kb>| PageMapper::<FreeListAllocator, Page4Kb>::unmap(space, page).map(drop))
    }
}

unsafe impl<T, const P: usize> GlobalAlloc for MemoryMappedObject<T, P>
where
    T: Allocator,
    PageCheck<P>: PageSize,
{
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        <T as Allocator>::allocate(self.resource(), layout)
            .unwrap_or_else(|_| alloc::alloc::handle_alloc_error(layout))
            .as_mut()
            .as_mut_ptr()
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        <T as Allocator>::deallocate(self.resource(), NonNull::new_unchecked(ptr), layout);
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        <T as Allocator>::allocate_zeroed(self.resource(), layout)
            .unwrap_or_else(|_| alloc::alloc::handle_alloc_error(layout))
            .as_mut()
            .as_mut_ptr()
    }

    unsafe fn realloc(&self, ptr: *mut u8, old_layout: Layout, new_size: usize) -> *mut u8 {
        let new_layout = Layout::from_size_align_unchecked(new_size, old_layout.align());
        let ptr = NonNull::new_unchecked(ptr);
        match old_layout.size().cmp(&new_layout.size()) {
            core::cmp::Ordering::Less => {
                <T as Allocator>::grow(self.resource(), ptr, old_layout, new_layout)
                    .unwrap_or_else(|_| alloc::alloc::handle_alloc_error(new_layout))
                    .as_mut()
                    .as_mut_ptr()
            }
            core::cmp::Ordering::Greater => {
                <T as Allocator>::shrink(self.resource(), ptr, old_layout, new_layout)
                    .unwrap_or_else(|_| alloc::alloc::handle_alloc_error(new_layout))
                    .as_mut()
                    .as_mut_ptr()
            }
            core::cmp::Ordering::Equal => ptr.as_ptr(),
        }
    }
}

unsafe impl<T, const P: usize> Allocator for MemoryMappedObject<T, P>
where
    T: Allocator,
    PageCheck<P>: PageSize,
{
    fn allocate(&self, layout: Layout) -> Result<core::ptr::NonNull<[u8]>, AllocError> {
        <T as Allocator>::allocate(self.resource(), layout)
    }

    fn allocate_zeroed(&self, layout: Layout) -> Result<core::ptr::NonNull<[u8]>, AllocError> {
        <T as Allocator>::allocate_zeroed(self.resource(), layout)
    }

    unsafe fn deallocate(&self, ptr: core::ptr::NonNull<u8>, layout: Layout) {
        <T as Allocator>::deallocate(self.resource(), ptr, layout);
    }

    unsafe fn grow(
        &self,
        ptr: core::ptr::NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<core::ptr::NonNull<[u8]>, AllocError> {
        <T as Allocator>::grow(self.resource(), ptr, old_layout, new_layout)
    }

    unsafe fn grow_zeroed(
        &self,
        ptr: core::ptr::NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<core::ptr::NonNull<[u8]>, AllocError> {
        <T as Allocator>::grow_zeroed(self.resource(), ptr, old_layout, new_layout)
    }

    unsafe fn shrink(
        &self,
        ptr: core::ptr::NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<core::ptr::NonNull<[u8]>, AllocError> {
        <T as Allocator>::shrink(self.resource(), ptr, old_layout, new_layout)
    }

    fn by_ref(&self) -> &Self
    where
        T: Sized,
    {
        self
    }
}
