use core::arch::asm;

use crate::address::VirtualAddr;
use crate::descriptors::interrupt::InterruptGateDescriptor;
use crate::descriptors::SystemSegmentType;
use crate::gdt::DescriptorTablePointer;

/// A full 256-entry x86-64 Interrupt Descriptor Table.
///
/// Unlike the GDT, every entry exists up front: unused vectors stay
/// not-present rather than being omitted.
#[derive(Clone, Copy)]
#[repr(C, align(16))]
pub struct InterruptDescriptorTable {
    entries: [InterruptGateDescriptor; 256],
}

impl InterruptDescriptorTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: [InterruptGateDescriptor::new(); 256],
        }
    }

    /// Installs `handler` at `vector` as either a trap or interrupt gate,
    /// with the given descriptor privilege level.
    pub fn set_handler(
        &mut self,
        vector: u8,
        handler: VirtualAddr,
        gate_type: SystemSegmentType,
        dpl: u8,
    ) -> &mut InterruptGateDescriptor {
        // SAFETY: reads the currently-loaded code segment selector.
        let cs = unsafe {
            let segment: u16;
            asm!("mov {0:x}, cs", out(reg) segment, options(nomem, nostack, preserves_flags));
            segment
        };

        let entry = &mut self.entries[usize::from(vector)];
        entry.set_target(handler);
        entry.set_selector(cs);
        entry.set_gate_type(gate_type);
        entry.set_dpl(dpl);
        entry.set_present();
        entry
    }

    #[must_use]
    pub fn lidt_ptr(&self) -> DescriptorTablePointer {
        DescriptorTablePointer {
            limit: (core::mem::size_of::<Self>() - 1) as u16,
            addr: VirtualAddr::from_ptr(self.entries.as_ptr()),
        }
    }
}

impl Default for InterruptDescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}
