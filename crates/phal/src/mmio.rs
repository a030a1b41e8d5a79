//! Memory-mapped register backend for the console itself.
//!
//! Every access is a volatile load/store into the uncached KSEG1 mirror of
//! the I/O area. Interrupt enable lives in the COP0 status register
//! (`IEc` bit 0 plus the `Im2` hardware line bit 10).

use core::ptr;
use core::sync::atomic::{Ordering, compiler_fence};

use crate::hardware::Hardware;
use crate::irq::Dma;
use crate::regs::{
    CdPort, DmaControl, DmaReg, DuartReg, GPU_GP0, GPU_GP1, IO_BASE, IrqReg, MemCtrl, SpuReg,
    Timer, TimerReg,
};

/// COP0 status bits that gate hardware interrupts.
const SR_IRQ_BITS: u32 = 0x0401;

#[inline(always)]
unsafe fn read<T: Copy>(offset: usize) -> T {
    unsafe { ptr::read_volatile((IO_BASE + offset) as *const T) }
}

#[inline(always)]
unsafe fn write<T: Copy>(offset: usize, value: T) {
    unsafe { ptr::write_volatile((IO_BASE + offset) as *mut T, value) }
}

#[inline(always)]
fn read_sr() -> u32 {
    let sr: u32;
    // SAFETY: reading the status register has no side effects.
    unsafe {
        core::arch::asm!("mfc0 {}, $12", out(reg) sr, options(nomem, nostack));
    }
    sr
}

/// Also a compiler barrier: memory accesses are not moved across a change
/// of interrupt state.
#[inline(always)]
fn write_sr(sr: u32) {
    // SAFETY: only the interrupt enable bits are ever changed by callers.
    unsafe {
        core::arch::asm!("mtc0 {}, $12", "nop", in(reg) sr, options(nostack));
    }
}

fn no_pad() -> u16 {
    0
}

/// The real register file.
pub struct Mmio {
    pad: fn() -> u16,
}

impl Mmio {
    /// # Safety
    ///
    /// Only one `Mmio` should drive the hardware at a time; the SDK's
    /// state machines assume they own the registers they touch.
    pub const unsafe fn new() -> Self {
        Self { pad: no_pad }
    }

    /// Supply the controller poller used by [`Hardware::pad_pressed`].
    pub fn set_pad_source(&mut self, pad: fn() -> u16) {
        self.pad = pad;
    }
}

impl Hardware for Mmio {
    #[inline]
    fn cd_read(&mut self, port: CdPort) -> u8 {
        unsafe { read(port.offset()) }
    }

    #[inline]
    fn cd_write(&mut self, port: CdPort, value: u8) {
        unsafe { write(port.offset(), value) }
    }

    #[inline]
    fn gp0_write(&mut self, word: u32) {
        unsafe { write(GPU_GP0, word) }
    }

    #[inline]
    fn gp1_write(&mut self, word: u32) {
        unsafe { write(GPU_GP1, word) }
    }

    #[inline]
    fn gpu_status(&mut self) -> u32 {
        unsafe { read(GPU_GP1) }
    }

    #[inline]
    fn dma_read(&mut self, channel: Dma, reg: DmaReg) -> u32 {
        unsafe { read(reg.offset(channel)) }
    }

    #[inline]
    fn dma_write(&mut self, channel: Dma, reg: DmaReg, value: u32) {
        unsafe { write(reg.offset(channel), value) }
    }

    #[inline]
    fn dma_control_read(&mut self, reg: DmaControl) -> u32 {
        unsafe { read(reg.offset()) }
    }

    #[inline]
    fn dma_control_write(&mut self, reg: DmaControl, value: u32) {
        unsafe { write(reg.offset(), value) }
    }

    #[inline]
    fn irq_read(&mut self, reg: IrqReg) -> u16 {
        unsafe { read(reg.offset()) }
    }

    #[inline]
    fn irq_write(&mut self, reg: IrqReg, value: u16) {
        unsafe { write(reg.offset(), value) }
    }

    #[inline]
    fn timer_write(&mut self, timer: Timer, reg: TimerReg, value: u16) {
        unsafe { write(reg.offset(timer), value as u32) }
    }

    #[inline]
    fn mem_ctrl_write(&mut self, reg: MemCtrl, value: u32) {
        unsafe { write(reg.offset(), value) }
    }

    #[inline]
    fn spu_read(&mut self, reg: SpuReg) -> u16 {
        unsafe { read(reg.offset()) }
    }

    #[inline]
    fn spu_write(&mut self, reg: SpuReg, value: u16) {
        unsafe { write(reg.offset(), value) }
    }

    #[inline]
    fn duart_read(&mut self, reg: DuartReg) -> u8 {
        unsafe { read(reg.offset()) }
    }

    #[inline]
    fn duart_write(&mut self, reg: DuartReg, value: u8) {
        unsafe { write(reg.offset(), value) }
    }

    fn pad_pressed(&mut self) -> u16 {
        (self.pad)()
    }

    /// Interrupt handlers may have run since the last iteration; make the
    /// caller reload whatever they wrote.
    #[inline]
    fn relax(&mut self) {
        compiler_fence(Ordering::SeqCst);
        core::hint::spin_loop();
    }

    #[inline]
    fn interrupts_enabled(&mut self) -> bool {
        read_sr() & SR_IRQ_BITS == SR_IRQ_BITS
    }

    #[inline]
    fn disable_interrupts(&mut self) -> bool {
        let sr = read_sr();
        write_sr(sr & !SR_IRQ_BITS);
        sr & SR_IRQ_BITS == SR_IRQ_BITS
    }

    #[inline]
    fn restore_interrupts(&mut self, was_enabled: bool) {
        if was_enabled {
            write_sr(read_sr() | SR_IRQ_BITS);
        }
    }
}
