//! Interrupt and DMA completion dispatch.
//!
//! One callback slot per interrupt-controller bit and one per DMA channel.
//! The DMA slots share the single [`Irq::Dma`] cause: the first DMA
//! callback registered installs the DICR demultiplexer as that cause's
//! callback, and removing the last one takes it away again.

mod frame;
mod handlers;

pub use frame::{ExceptionCode, Frame, Trap};

use bit_field::BitField;
use phal::irq::{DMA_COUNT, IRQ_COUNT};
use phal::{Dma, DmaControl, Hardware, Irq, IrqReg};

use crate::sync;
use crate::system::System;

/// Interrupt and DMA callbacks take the system and nothing else.
pub type Callback<H> = fn(&mut System<H>);

/// DICR bit 23: master interrupt enable.
const DICR_MASTER_ENABLE: usize = 23;
/// DICR bits 16-22: per-channel interrupt enable.
const DICR_ENABLE_BASE: usize = 16;
/// DICR bits 24-30: per-channel interrupt flags (write 1 to clear).
const DICR_FLAG_BASE: usize = 24;
/// Everything below the flag bits.
const DICR_CONTROL_MASK: u32 = 0x00FF_FFFF;
/// Enable bits of all seven channels in DPCR.
const DPCR_ALL_ENABLE: u32 = 0x0888_8888;

pub struct Traps<H: Hardware> {
    irq: [Option<Callback<H>>; IRQ_COUNT],
    dma: [Option<Callback<H>>; DMA_COUNT],
    dma_users: usize,
}

impl<H: Hardware> Traps<H> {
    pub const fn new() -> Self {
        Self {
            irq: [None; IRQ_COUNT],
            dma: [None; DMA_COUNT],
            dma_users: 0,
        }
    }
}

impl<H: Hardware> Default for Traps<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Hardware> System<H> {
    /// Reset the interrupt and DMA controllers. Leaves CPU interrupts masked.
    pub(crate) fn traps_init(&mut self) {
        self.hw.disable_interrupts();
        self.hw.irq_write(IrqReg::Mask, 0);
        self.hw.irq_write(IrqReg::Stat, 0);

        let dpcr = self.hw.dma_control_read(DmaControl::Dpcr);
        self.hw.dma_control_write(DmaControl::Dpcr, dpcr & !DPCR_ALL_ENABLE);
        self.hw.dma_control_write(DmaControl::Dicr, 0);

        self.traps = Traps::new();
    }

    /// Install (or with `None`, remove) the callback for an interrupt cause,
    /// unmasking or masking the cause to match. Returns the previous one.
    pub fn set_irq(&mut self, irq: Irq, callback: Option<Callback<H>>) -> Option<Callback<H>> {
        sync::without_interrupts(self, |sys| {
            let index = irq.index();
            let previous = core::mem::replace(&mut sys.traps.irq[index], callback);
            let mask = sys.hw.irq_read(IrqReg::Mask);
            let mask = if callback.is_some() { mask | irq.mask() } else { mask & !irq.mask() };
            sys.hw.irq_write(IrqReg::Mask, mask);
            previous
        })
    }

    pub fn irq_callback(&self, irq: Irq) -> Option<Callback<H>> {
        self.traps.irq[irq.index()]
    }

    /// Install (or remove) the completion callback for a DMA channel.
    /// Returns the previous one.
    pub fn set_dma(&mut self, channel: Dma, callback: Option<Callback<H>>) -> Option<Callback<H>> {
        sync::without_interrupts(self, |sys| {
            let index = channel.index();
            let previous = core::mem::replace(&mut sys.traps.dma[index], callback);

            match (previous.is_some(), callback.is_some()) {
                (false, true) => {
                    let mut dicr = sys.hw.dma_control_read(DmaControl::Dicr) & DICR_CONTROL_MASK;
                    dicr.set_bit(DICR_ENABLE_BASE + index, true);
                    dicr.set_bit(DICR_MASTER_ENABLE, true);
                    sys.hw.dma_control_write(DmaControl::Dicr, dicr);

                    sys.traps.dma_users += 1;
                    if sys.traps.dma_users == 1 {
                        sys.set_irq(Irq::Dma, Some(handlers::dma_interrupt::<H>));
                    }
                }
                (true, false) => {
                    sys.traps.dma_users -= 1;
                    if sys.traps.dma_users != 0 {
                        let mut dicr = sys.hw.dma_control_read(DmaControl::Dicr) & DICR_CONTROL_MASK;
                        dicr.set_bit(DICR_ENABLE_BASE + index, false);
                        sys.hw.dma_control_write(DmaControl::Dicr, dicr);
                    } else {
                        sys.hw.dma_control_write(DmaControl::Dicr, 0);
                        sys.set_irq(Irq::Dma, None);
                    }
                }
                _ => {}
            }
            previous
        })
    }

    pub fn dma_callback(&self, channel: Dma) -> Option<Callback<H>> {
        self.traps.dma[channel.index()]
    }

    /// Run the callbacks of every pending, unmasked cause until none remain.
    ///
    /// Entered from the exception vector with interrupts masked. Each cause
    /// is acknowledged before its callback runs, so a callback that causes
    /// the same interrupt again is seen on the next pass.
    pub fn service_interrupts(&mut self) {
        loop {
            let pending = self.hw.irq_read(IrqReg::Stat) & self.hw.irq_read(IrqReg::Mask);
            if pending == 0 {
                break;
            }
            for index in 0..IRQ_COUNT {
                if !pending.get_bit(index) {
                    continue;
                }
                self.hw.irq_write(IrqReg::Stat, !(1u16 << index));
                if let Some(callback) = self.traps.irq[index] {
                    callback(self);
                }
            }
        }
    }

    /// First-level exception handling.
    ///
    /// Interrupts are serviced and syscalls skipped. Anything else is not
    /// resumable; the caller hands the frame to the exception screen.
    pub fn handle_exception(&mut self, frame: &mut Frame) -> Trap {
        match frame.exception_code() {
            ExceptionCode::Interrupt => {}
            ExceptionCode::Syscall => frame.epc = frame.epc.wrapping_add(4),
            _ => return Trap::Fatal,
        }
        self.service_interrupts();
        Trap::Resume
    }
}
