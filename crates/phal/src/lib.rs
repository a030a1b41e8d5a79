//! Hardware Abstraction Layer.
//!
//! Register map and register-access trait for the PlayStation I/O space.
//! Protocol code in `psx-kit` only ever talks to a [`Hardware`]
//! implementation; `mmio::Mmio` is the real one.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_arch = "mips", feature(asm_experimental_arch))]

pub mod hardware;
pub mod irq;
#[cfg(target_arch = "mips")]
pub mod mmio;
pub mod regs;
pub mod tty;

pub use hardware::Hardware;
pub use irq::{Dma, Irq, dpcr_set};
pub use regs::{CdPort, DmaControl, DmaReg, DuartReg, IrqReg, MemCtrl, SpuReg, Timer, TimerReg};
