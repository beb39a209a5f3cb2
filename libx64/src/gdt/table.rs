use crate::{
    address::VirtualAddr,
    descriptors::{
        CallGateDescriptor, CodeSegmentDescriptor, DataSegmentDescriptor, GdtNull,
        SystemSegmentDescriptor,
    },
    segments::SegmentSelector,
};

/// A GDT descriptor, either one 8-byte slot or (for system descriptors like
/// the TSS) two.
pub enum Descriptor {
    Single(u64),
    Double(u64, u64),
}

pub trait GdtEntry {
    fn encode(self) -> Descriptor;
}

impl GdtEntry for GdtNull {
    fn encode(self) -> Descriptor {
        Descriptor::Single(0)
    }
}

impl GdtEntry for CodeSegmentDescriptor {
    fn encode(self) -> Descriptor {
        Descriptor::Single(unsafe { core::mem::transmute(self) })
    }
}

impl GdtEntry for DataSegmentDescriptor {
    fn encode(self) -> Descriptor {
        Descriptor::Single(unsafe { core::mem::transmute(self) })
    }
}

impl GdtEntry for CallGateDescriptor {
    fn encode(self) -> Descriptor {
        let bits: [u64; 2] = unsafe { core::mem::transmute(self) };
        Descriptor::Double(bits[0], bits[1])
    }
}

impl GdtEntry for SystemSegmentDescriptor {
    fn encode(self) -> Descriptor {
        let bits: [u64; 2] = unsafe { core::mem::transmute(self) };
        Descriptor::Double(bits[0], bits[1])
    }
}

/// Bare-bones Global Descriptor Table: a null descriptor followed by up to 7
/// more 8-byte slots.
#[repr(C, align(8))]
pub struct GlobalDescriptorTable {
    table: [u64; 8],
    len: usize,
}

impl GlobalDescriptorTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            table: [0; 8],
            len: 1,
        }
    }

    pub fn add_entry(&mut self, entry: impl GdtEntry) -> SegmentSelector {
        let idx = self.len;
        match entry.encode() {
            Descriptor::Single(word) => {
                self.table[self.len] = word;
                self.len += 1;
            }
            Descriptor::Double(low, high) => {
                self.table[self.len] = low;
                self.table[self.len + 1] = high;
                self.len += 2;
            }
        }
        SegmentSelector::zero().set_index(idx as u16)
    }

    #[must_use]
    pub fn entries(&self) -> &[u64] {
        &self.table[..self.len]
    }

    #[must_use]
    pub fn lgdt_ptr(&self) -> DescriptorTablePointer {
        DescriptorTablePointer {
            limit: (self.entries().len() * core::mem::size_of::<u64>() - 1) as u16,
            addr: VirtualAddr::from_ptr(self.table.as_ptr()),
        }
    }
}

#[repr(C, packed)]
pub struct DescriptorTablePointer {
    pub limit: u16,
    pub addr: VirtualAddr,
}
