use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ops::Deref;
use core::sync::atomic::{AtomicU8, Ordering};

const UNINIT: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;

/// A value initialized on first access by its closure `F`.
pub struct Lazy<T, F = fn() -> T> {
    state: AtomicU8,
    init: UnsafeCell<Option<F>>,
    value: UnsafeCell<MaybeUninit<T>>,
}

// The kernel never spreads these statics across cores; the state machine in
// `force` only has to protect against a handler re-entering its own init.
unsafe impl<T, F> Sync for Lazy<T, F> {}

impl<T, F: FnOnce() -> T> Lazy<T, F> {
    pub const fn new(f: F) -> Self {
        Self {
            state: AtomicU8::new(UNINIT),
            init: UnsafeCell::new(Some(f)),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    pub fn force(&self) -> &T {
        loop {
            match self
                .state
                .compare_exchange(UNINIT, RUNNING, Ordering::Acquire, Ordering::Acquire)
            {
                Ok(_) => {
                    // SAFETY: we are the single thread that moved UNINIT -> RUNNING.
                    let f = unsafe { (*self.init.get()).take() }
                        .expect("Lazy initializer ran twice");
                    let value = f();
                    // SAFETY: exclusive writer until state is published as DONE.
                    unsafe {
                        (*self.value.get()).write(value);
                    }
                    self.state.store(DONE, Ordering::Release);
                }
                Err(DONE) => break,
                Err(RUNNING) => {
                    while self.state.load(Ordering::Acquire) == RUNNING {
                        core::hint::spin_loop();
                    }
                }
                Err(_) => unreachable!(),
            }
        }
        // SAFETY: state is DONE only after `value` has been written.
        unsafe { (*self.value.get()).assume_init_ref() }
    }
}

impl<T, F: FnOnce() -> T> Deref for Lazy<T, F> {
    type Target = T;

    fn deref(&self) -> &T {
        self.force()
    }
}

/// Declares one or more statics lazily initialized from a block, evaluated
/// on first deref.
///
/// ```ignore
/// klazy! {
///     pub ref static FOO: Bar = { Bar::new() };
/// }
/// ```
#[macro_export]
macro_rules! klazy {
    () => {};
    ($(#[$meta:meta])* $vis:vis ref static $name:ident : $ty:ty = $init:block; $($rest:tt)*) => {
        $(#[$meta])*
        $vis static $name: $crate::sync::Lazy<$ty> = $crate::sync::Lazy::new(|| $init);

        $crate::klazy! { $($rest)* }
    };
}
