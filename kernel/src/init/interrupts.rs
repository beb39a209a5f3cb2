use libx64::{
    address::VirtualAddr,
    descriptors::SystemSegmentType,
    idt::{InterruptDescriptorTable, InterruptFrame},
    paging::PageFaultErrorCode,
};

klazy! {
    pub ref static IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();

        idt.set_handler(0, VirtualAddr::new(divide_error as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(1, VirtualAddr::new(debug as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(2, VirtualAddr::new(nmi as u64), SystemSegmentType::InterruptGate, 0);
        idt.set_handler(3, VirtualAddr::new(breakpoint as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(4, VirtualAddr::new(overflow as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(5, VirtualAddr::new(bound_range as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(6, VirtualAddr::new(invalid_opcode as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(7, VirtualAddr::new(device_not_available as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(8, VirtualAddr::new(double_fault as u64), SystemSegmentType::TrapGate, 0)
            .set_stack_idx(kcore::tables::idt::IstEntry::DoubleFault);
        idt.set_handler(9, VirtualAddr::new(coprocessor_segment_overrun as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(10, VirtualAddr::new(invalid_tss as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(11, VirtualAddr::new(segment_not_present as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(12, VirtualAddr::new(stack_segment_fault as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(13, VirtualAddr::new(general_protection as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(14, VirtualAddr::new(page_fault as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(16, VirtualAddr::new(x87_fpu as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(17, VirtualAddr::new(alignment_check as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(18, VirtualAddr::new(machine_check as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(19, VirtualAddr::new(simd_fp as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(20, VirtualAddr::new(virtualization as u64), SystemSegmentType::TrapGate, 0);
        idt.set_handler(21, VirtualAddr::new(control_protection as u64), SystemSegmentType::TrapGate, 0);

        // IRQ1 (keyboard), PIC-remapped to vector 0x21.
        idt.set_handler(user::PIC_MASTER_OFFSET + 1, VirtualAddr::new(user::keyboard as u64), SystemSegmentType::InterruptGate, 0);

        // Syscall gate: DPL=3 so ring-3 `int 0x80` is permitted. The target
        // is the raw asm trampoline, not an `x86-interrupt` fn: it marshals
        // registers into a plain C-ABI call itself (see `syscall.rs`).
        idt.set_handler(0x80, VirtualAddr::new(crate::syscall::syscall_entry as u64), SystemSegmentType::TrapGate, 3);

        idt
    };
}

fn halt_with(vector: &str, frame: &InterruptFrame) -> ! {
    error!("CPU exception {} @ {:#?}", vector, frame);
    libx64::diverging_hlt();
}

fn halt_with_code(vector: &str, code: u64, frame: &InterruptFrame) -> ! {
    error!("CPU exception {} (code {:#x}) @ {:#?}", vector, code, frame);
    libx64::diverging_hlt();
}

pub extern "x86-interrupt" fn divide_error(f: InterruptFrame) {
    halt_with("#DE divide-by-zero", &f);
}

pub extern "x86-interrupt" fn debug(f: InterruptFrame) {
    halt_with("#DB debug", &f);
}

pub extern "x86-interrupt" fn nmi(f: InterruptFrame) {
    halt_with("NMI", &f);
}

pub extern "x86-interrupt" fn breakpoint(f: InterruptFrame) {
    trace!("#BP breakpoint @ {:#?}", f);
}

pub extern "x86-interrupt" fn overflow(f: InterruptFrame) {
    halt_with("#OF overflow", &f);
}

pub extern "x86-interrupt" fn bound_range(f: InterruptFrame) {
    halt_with("#BR bound-range", &f);
}

pub extern "x86-interrupt" fn invalid_opcode(f: InterruptFrame) {
    halt_with("#UD invalid-opcode", &f);
}

pub extern "x86-interrupt" fn device_not_available(f: InterruptFrame) {
    halt_with("#NM device-not-available", &f);
}

pub extern "x86-interrupt" fn double_fault(f: InterruptFrame, code: u64) -> ! {
    halt_with_code("#DF double-fault", code, &f);
}

pub extern "x86-interrupt" fn coprocessor_segment_overrun(f: InterruptFrame) {
    halt_with("coprocessor-segment-overrun", &f);
}

pub extern "x86-interrupt" fn invalid_tss(f: InterruptFrame, code: u64) {
    halt_with_code("#TS invalid-tss", code, &f);
}

pub extern "x86-interrupt" fn segment_not_present(f: InterruptFrame, code: u64) {
    halt_with_code("#NP segment-not-present", code, &f);
}

pub extern "x86-interrupt" fn stack_segment_fault(f: InterruptFrame, code: u64) {
    halt_with_code("#SS stack-segment-fault", code, &f);
}

pub extern "x86-interrupt" fn general_protection(f: InterruptFrame, code: u64) {
    halt_with_code("#GP general-protection", code, &f);
}

pub extern "x86-interrupt" fn page_fault(f: InterruptFrame, code: u64) {
    let code = PageFaultErrorCode::from_bits_truncate(code);
    error!(
        "#PF page-fault (code {:?}) accessing {:?} @ {:#?}",
        code,
        libx64::control::cr2(),
        f
    );
    libx64::diverging_hlt();
}

pub extern "x86-interrupt" fn x87_fpu(f: InterruptFrame) {
    halt_with("#MF x87-fpu", &f);
}

pub extern "x86-interrupt" fn alignment_check(f: InterruptFrame, code: u64) {
    halt_with_code("#AC alignment-check", code, &f);
}

pub extern "x86-interrupt" fn machine_check(f: InterruptFrame) -> ! {
    halt_with("#MC machine-check", &f);
}

pub extern "x86-interrupt" fn simd_fp(f: InterruptFrame) {
    halt_with("#XF simd-fp", &f);
}

pub extern "x86-interrupt" fn virtualization(f: InterruptFrame) {
    halt_with("#VE virtualization", &f);
}

pub extern "x86-interrupt" fn control_protection(f: InterruptFrame, code: u64) {
    halt_with_code("#CP control-protection", code, &f);
}

pub mod user {
    use super::InterruptFrame;
    use kcore::{klazy, sync::SpinMutex};
    use pic::chained::Chained;

    pub const PIC_MASTER_OFFSET: u8 = libx64::idt::PIC_MASTER_OFFSET;
    pub const PIC_SLAVE_OFFSET: u8 = libx64::idt::PIC_SLAVE_OFFSET;

    klazy! {
        pub ref static PICS: SpinMutex<Chained<PIC_MASTER_OFFSET, PIC_SLAVE_OFFSET>> = {
            SpinMutex::new(Chained::<PIC_MASTER_OFFSET, PIC_SLAVE_OFFSET>::uninit())
        };
    }

    pub extern "x86-interrupt" fn keyboard(_f: InterruptFrame) {
        use libx64::port::RPort;

        static KB: RPort<u8> = RPort::new(0x60);

        let scancode = unsafe { KB.read() };
        crate::init::KEYBOARD.lock().enqueue_scancode(scancode);

        PICS.lock()
            .interupt_fn(PIC_MASTER_OFFSET + 1)
            .expect("keyboard EOI");
    }
}
