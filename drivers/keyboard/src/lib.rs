#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

const CIRC_BUFFER_LEN: usize = 10;

/// IBM-PC Set 1 scancode-to-ASCII table.
///
/// citation: <https://gist.github.com/davazp/d2fde634503b2a5bc664>
#[rustfmt::skip]
const KBD_US: [u8; 128] = [
    0,  27, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 8,
    b'\t',
    b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n',
    0,
    b'a', b's', b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0, b'\\',
    b'z', b'x', b'c', b'v', b'b', b'n', b'm', b',', b'.', b'/', 0,
    b'*',
    0,
    b' ',
    0,
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0,
    0,
    0,
    0,
    b'-',
    0, 0, 0,
    b'+',
    0, 0, 0,
    0, 0,
    0, 0, 0,
    0,
    0,
    0,
];

fn is_numeric(key: u8) -> bool {
    (2..=11).contains(&key)
}

fn is_alpha(key: u8) -> bool {
    (16..=25).contains(&key) || (30..=38).contains(&key) || (44..=50).contains(&key)
}

fn is_special(key: u8) -> bool {
    matches!(key, 57 | 14 | 28 | 39)
}

const LEFT_SHIFT_MAKE: u8 = 0x2A;
const LEFT_SHIFT_BREAK: u8 = 0xAA;
const RIGHT_SHIFT_MAKE: u8 = 0x36;
const RIGHT_SHIFT_BREAK: u8 = 0xB6;

/// A blocking PS/2 keyboard driver: a fixed-capacity circular buffer of raw
/// scancodes, written only from IRQ1 context and drained only from non-IRQ
/// context via [`Keyboard::getc`].
pub struct Keyboard {
    buffer: [u8; CIRC_BUFFER_LEN],
    start: usize,
    end: usize,
    count: usize,
    left_shift: bool,
    right_shift: bool,
}

impl Keyboard {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [0; CIRC_BUFFER_LEN],
            start: 0,
            end: 0,
            count: 0,
            left_shift: false,
            right_shift: false,
        }
    }

    fn push(&mut self, scancode: u8) {
        if self.count == CIRC_BUFFER_LEN {
            // drop the oldest entry; the hardware has no backpressure.
            self.start = (self.start + 1) % CIRC_BUFFER_LEN;
            self.count -= 1;
        }
        self.buffer[self.end] = scancode;
        self.end = (self.end + 1) % CIRC_BUFFER_LEN;
        self.count += 1;
    }

    fn pop(&mut self) -> Option<u8> {
        if self.count == 0 {
            return None;
        }
        let item = self.buffer[self.start];
        self.start = (self.start + 1) % CIRC_BUFFER_LEN;
        self.count -= 1;
        Some(item)
    }

    /// Called from IRQ1 context with the raw byte read off port `0x60`.
    ///
    /// Updates shift-key state on make/break codes and pushes the scancode
    /// onto the ring buffer when it maps to a printable character.
    pub fn enqueue_scancode(&mut self, scancode: u8) {
        match scancode {
            LEFT_SHIFT_MAKE => self.left_shift = true,
            LEFT_SHIFT_BREAK => self.left_shift = false,
            RIGHT_SHIFT_MAKE => self.right_shift = true,
            RIGHT_SHIFT_BREAK => self.right_shift = false,
            _ => {}
        }

        if is_numeric(scancode) || is_alpha(scancode) || is_special(scancode) {
            self.push(scancode);
        }
    }

    /// Blocks (busy-waiting) until a key is available, then returns its
    /// ASCII translation, upper-cased if a shift key was held.
    pub fn getc(keyboard: &kcore::sync::SpinMutex<Self>) -> u8 {
        loop {
            let mut guard = keyboard.lock();
            if let Some(scancode) = guard.pop() {
                let shifted = guard.left_shift || guard.right_shift;
                let mut ch = KBD_US[usize::from(scancode)];
                if shifted && is_alpha(scancode) {
                    ch -= 32;
                }
                return ch;
            }
            drop(guard);
            core::hint::spin_loop();
        }
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_buffer_drops_oldest_on_overflow() {
        let mut kb = Keyboard::new();
        for i in 0..(CIRC_BUFFER_LEN as u8 + 2) {
            kb.enqueue_scancode(2 + (i % 10)); // numeric range
        }
        assert_eq!(kb.count, CIRC_BUFFER_LEN);
    }

    #[test]
    fn shift_make_break_toggles_state() {
        let mut kb = Keyboard::new();
        kb.enqueue_scancode(LEFT_SHIFT_MAKE);
        assert!(kb.left_shift);
        kb.enqueue_scancode(LEFT_SHIFT_BREAK);
        assert!(!kb.left_shift);
    }

    #[test]
    fn non_printable_scancodes_are_dropped() {
        let mut kb = Keyboard::new();
        kb.enqueue_scancode(0x3B); // F1, not numeric/alpha/special
        assert_eq!(kb.count, 0);
    }
}
