//! The bundled command shell, mirroring `original_source/shell/shell.c`.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

const LINE_CAP: usize = 256;
const MAX_ARGS: usize = 4;

#[no_mangle]
pub extern "C" fn _start() -> ! {
    run_shell()
}

fn run_shell() -> ! {
    let mut line = [0u8; LINE_CAP];

    loop {
        libuser::print_s("$ ");

        let mut pos = 0usize;
        let mut ch = 0u8;
        libuser::read(0, &mut ch, 1);

        while ch != b'\n' && ch != 0 && pos < LINE_CAP - 1 {
            line[pos] = ch;
            pos += 1;
            libuser::write(1, &ch, 1);
            libuser::read(0, &mut ch, 1);
        }

        parse_line(&line[..pos]);
    }
}

fn parse_line(cmd: &[u8]) {
    let mut args: [&[u8]; MAX_ARGS] = [&[]; MAX_ARGS];
    let mut n = 0usize;

    let mut save: &[u8] = cmd;
    let mut tok = libuser::strtok_r(Some(cmd), b" \n", &mut save);
    while let Some(t) = tok {
        if n == MAX_ARGS {
            break;
        }
        args[n] = t;
        n += 1;
        tok = libuser::strtok_r(None, b" \n", &mut save);
    }

    if n == 0 {
        return;
    }

    if args[0] == b"exec" && n > 1 {
        libuser::print_s("\n");
        let mut name_buf = [0u8; 64];
        let len = args[1].len().min(name_buf.len() - 1);
        name_buf[..len].copy_from_slice(&args[1][..len]);
        let cname = core::ffi::CStr::from_bytes_with_nul(&name_buf[..=len]).expect("nul-terminated module name");
        libuser::exec(cname);
    } else {
        libuser::print_s("\nunrecognized command: ");
        if let Ok(s) = core::str::from_utf8(args[0]) {
            libuser::print_s(s);
        }
        libuser::print_s("\n");
    }
}

#[panic_handler]
fn panic(_info: &PanicInfo) -> ! {
    libuser::exit()
}
