#![no_std]
#![allow(clippy::module_name_repetitions)]

#[cfg(test)]
#[macro_use]
extern crate std;

#[cfg(test)]
extern crate alloc;

pub mod frame_alloc;
pub mod vmm;
