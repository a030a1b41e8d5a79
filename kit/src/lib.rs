//! psx-kit: interrupt-driven hardware abstraction layer for the PlayStation.
//!
//! Everything hangs off one [`System`] value that owns the register backend
//! and the state of each subsystem. Foreground code calls methods on it;
//! interrupt handlers receive it as `&mut System<H>`. There is exactly one
//! execution context plus interrupts, and mutual exclusion comes from
//! masking interrupts around the few places foreground code and handlers
//! share state.
//!
//! The crate is `no_std`. Under `cfg(test)` it links `std` and drives the
//! protocol code against a simulated register file.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_arch = "mips", feature(asm_experimental_arch))]

pub mod cd;
pub mod exscreen;
pub mod gpu;
pub mod mem;
pub mod queue;
pub mod spu;
pub mod sync;
pub mod system;
pub mod timer;
pub mod traps;

#[cfg(target_arch = "mips")]
pub mod runtime;

#[cfg(test)]
mod sim;

pub use phal::Hardware;
pub use system::{Config, System};
