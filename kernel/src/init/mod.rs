mod gdt;
mod interrupts;

use kcore::sync::SpinMutex;
use keyboard::Keyboard;
use libx64::{
    gdt::lgdt,
    idt::lidt,
    segments::{ltr, set_cs, set_ds, set_ss},
};

klazy! {
    pub ref static KEYBOARD: SpinMutex<Keyboard> = SpinMutex::new(Keyboard::new());
}

pub use gdt::GDT;
pub use interrupts::{user::PICS, IDT};

/// Installs the IDT, then the GDT/TSS and PIC, and unmasks the keyboard IRQ.
///
/// Must run after `initialize_memory` and before any `int`/IRQ can fire. IDT
/// goes in first so that a fault during segment or PIC setup gets a
/// diagnostic instead of a raw triple fault.
#[inline(never)]
pub fn kinit() {
    lidt(&IDT.lidt_ptr());
    trace!("IDT Initialized");

    let (gdt, segments) = &*GDT;

    lgdt(&gdt.lgdt_ptr());
    trace!("GDT Initialized");

    set_cs(segments.code_segment);
    set_ss(segments.data_segment);
    set_ds(segments.data_segment);
    ltr(segments.task_state);

    trace!("Segments switched");

    PICS.lock().init().expect("failed to initialize PIC");
    trace!("PIC Initialized");

    PICS.lock().unmask_irq(1).expect("unmask keyboard IRQ");
    trace!("keyboard IRQ unmasked");

    info!("initialization successful");
}
