//! Register-access trait.

use crate::irq::Dma;
use crate::regs::{CdPort, DmaControl, DmaReg, DuartReg, IrqReg, MemCtrl, SpuReg, Timer, TimerReg};

/// Typed access to every register block the SDK drives.
///
/// The memory-mapping mechanism lives entirely behind this trait. Protocol
/// code never forms an I/O address itself, which is what lets the CD and
/// GPU state machines run against a simulated register file on the host.
///
/// Methods take `&mut self` even for reads: many registers have read side
/// effects (the CD response FIFO pops on read).
pub trait Hardware {
    // ── CD-ROM controller ──────────────────────────────────────────

    fn cd_read(&mut self, port: CdPort) -> u8;
    fn cd_write(&mut self, port: CdPort, value: u8);

    // ── GPU ────────────────────────────────────────────────────────

    fn gp0_write(&mut self, word: u32);
    fn gp1_write(&mut self, word: u32);
    /// GPUSTAT.
    fn gpu_status(&mut self) -> u32;

    // ── DMA ────────────────────────────────────────────────────────

    fn dma_read(&mut self, channel: Dma, reg: DmaReg) -> u32;
    fn dma_write(&mut self, channel: Dma, reg: DmaReg, value: u32);

    /// Point a channel at a buffer in main RAM.
    ///
    /// Separate from [`Hardware::dma_write`] so a simulated DMA engine can
    /// keep the full host address.
    fn dma_set_address(&mut self, channel: Dma, addr: usize) {
        self.dma_write(channel, DmaReg::Madr, addr as u32 & 0x00FF_FFFF);
    }

    fn dma_control_read(&mut self, reg: DmaControl) -> u32;
    fn dma_control_write(&mut self, reg: DmaControl, value: u32);

    // ── Interrupt controller ───────────────────────────────────────

    fn irq_read(&mut self, reg: IrqReg) -> u16;
    fn irq_write(&mut self, reg: IrqReg, value: u16);

    // ── Root counters, bus config, SPU, DUART ─────────────────────

    fn timer_write(&mut self, timer: Timer, reg: TimerReg, value: u16);
    fn mem_ctrl_write(&mut self, reg: MemCtrl, value: u32);
    fn spu_read(&mut self, reg: SpuReg) -> u16;
    fn spu_write(&mut self, reg: SpuReg, value: u16);
    fn duart_read(&mut self, reg: DuartReg) -> u8;
    fn duart_write(&mut self, reg: DuartReg, value: u8);

    /// Controller buttons that went down since the previous call.
    ///
    /// The pad protocol itself is an external collaborator; this is the one
    /// bit of it the exception screen needs.
    fn pad_pressed(&mut self) -> u16;

    // ── CPU ────────────────────────────────────────────────────────

    fn interrupts_enabled(&mut self) -> bool;

    /// Mask CPU interrupts, returning whether they were enabled before.
    fn disable_interrupts(&mut self) -> bool;

    /// Undo a [`Hardware::disable_interrupts`]; only re-enables if `was_enabled`.
    fn restore_interrupts(&mut self, was_enabled: bool);

    /// One iteration of a busy-wait.
    #[inline]
    fn relax(&mut self) {
        core::hint::spin_loop();
    }

    /// Report whether an interrupt should be serviced now.
    ///
    /// Real hardware delivers interrupts through the exception vector, so
    /// the MMIO backend always answers `false`. A simulator uses this hook
    /// to advance its devices and ask the caller to run the dispatcher.
    #[inline]
    fn poll_interrupt(&mut self) -> bool {
        false
    }
}
