//! I/O register map.
//!
//! Offsets are relative to [`IO_BASE`]. Each register block has a small
//! selector enum so [`crate::Hardware`] methods stay typed per block
//! instead of taking raw addresses.

/// Uncached KSEG1 mirror of the I/O area.
pub const IO_BASE: usize = 0xBF80_0000;

/// Offset of the CD-ROM controller ports.
pub const CD_BASE: usize = 0x1800;
/// GP0 (write) / GPUREAD (read).
pub const GPU_GP0: usize = 0x1810;
/// GP1 (write) / GPUSTAT (read).
pub const GPU_GP1: usize = 0x1814;
/// Interrupt status register.
pub const IRQ_STAT: usize = 0x1070;
/// Interrupt mask register.
pub const IRQ_MASK: usize = 0x1074;
/// First DMA channel register block; channels are 0x10 apart.
pub const DMA_BASE: usize = 0x1080;
/// DMA priority/enable control.
pub const DMA_DPCR: usize = 0x10F0;
/// DMA interrupt control.
pub const DMA_DICR: usize = 0x10F4;
/// First root counter block; counters are 0x10 apart.
pub const TIMER_BASE: usize = 0x1100;
/// SPU control register block.
pub const SPU_BASE: usize = 0x1D80;
/// Expansion 2 DUART (debug TTY) registers.
pub const DUART_BASE: usize = 0x2020;

/// CPU clock in Hz.
pub const F_CPU: u32 = 33_868_800;

/// CD-ROM controller byte ports.
///
/// Ports 1-3 are banked by the index written to [`CdPort::Status`]; the
/// driver always selects the bank before touching them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CdPort {
    /// Index/status register.
    Status = 0,
    /// Command (bank 0 write) / response FIFO (read).
    Command = 1,
    /// Parameter FIFO (bank 0) / interrupt enable (bank 1) / data FIFO (read).
    Data = 2,
    /// Request register (bank 0) / interrupt flags (bank 1).
    Irq = 3,
}

impl CdPort {
    #[inline]
    pub const fn offset(self) -> usize {
        CD_BASE + self as usize
    }
}

/// Per-channel DMA registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaReg {
    /// Base address.
    Madr,
    /// Block control.
    Bcr,
    /// Channel control; bit 24 is the busy/start bit.
    Chcr,
}

impl DmaReg {
    #[inline]
    pub const fn offset(self, channel: crate::Dma) -> usize {
        let reg = match self {
            DmaReg::Madr => 0x0,
            DmaReg::Bcr => 0x4,
            DmaReg::Chcr => 0x8,
        };
        DMA_BASE + channel as usize * 0x10 + reg
    }
}

/// DMA controller-wide registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaControl {
    Dpcr,
    Dicr,
}

impl DmaControl {
    #[inline]
    pub const fn offset(self) -> usize {
        match self {
            DmaControl::Dpcr => DMA_DPCR,
            DmaControl::Dicr => DMA_DICR,
        }
    }
}

/// Interrupt controller registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqReg {
    /// Writing a 0 bit acknowledges that cause.
    Stat,
    Mask,
}

impl IrqReg {
    #[inline]
    pub const fn offset(self) -> usize {
        match self {
            IrqReg::Stat => IRQ_STAT,
            IrqReg::Mask => IRQ_MASK,
        }
    }
}

/// Root counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Timer {
    /// Counter 0, dot clock source.
    Dot = 0,
    /// Counter 1, hblank source.
    HBlank = 1,
    /// Counter 2, system clock source.
    System = 2,
}

/// Root counter registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerReg {
    Value,
    Mode,
    Target,
}

impl TimerReg {
    #[inline]
    pub const fn offset(self, timer: Timer) -> usize {
        let reg = match self {
            TimerReg::Value => 0x0,
            TimerReg::Mode => 0x4,
            TimerReg::Target => 0x8,
        };
        TIMER_BASE + timer as usize * 0x10 + reg
    }
}

/// Memory control (bus interface) registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemCtrl {
    SpuDelaySize,
    CdDelaySize,
    Exp2DelaySize,
}

impl MemCtrl {
    #[inline]
    pub const fn offset(self) -> usize {
        match self {
            MemCtrl::SpuDelaySize => 0x1014,
            MemCtrl::CdDelaySize => 0x1018,
            MemCtrl::Exp2DelaySize => 0x101C,
        }
    }
}

/// Bus configuration for the CD controller: 3 cycle write delay, 4 cycle
/// read delay, recovery and pre-strobe periods, 4-byte window.
pub const CD_BUS_CONFIG: u32 = 3 | (4 << 4) | (1 << 8) | (1 << 11) | (2 << 16);

/// Bus configuration for the SPU, as the boot ROM leaves it.
pub const SPU_BUS_CONFIG: u32 = 0x2009_31E1;

/// SPU 16-bit registers used during bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpuReg {
    MainVolL,
    MainVolR,
    ReverbVolL,
    ReverbVolR,
    KeyOffLo,
    KeyOffHi,
    FmModeLo,
    FmModeHi,
    NoiseModeLo,
    NoiseModeHi,
    ReverbOnLo,
    ReverbOnHi,
    ReverbAddr,
    Ctrl,
    DmaCtrl,
    Stat,
    CdVolL,
    CdVolR,
    ExtVolL,
    ExtVolR,
}

impl SpuReg {
    #[inline]
    pub const fn offset(self) -> usize {
        SPU_BASE
            + match self {
                SpuReg::MainVolL => 0x00,
                SpuReg::MainVolR => 0x02,
                SpuReg::ReverbVolL => 0x04,
                SpuReg::ReverbVolR => 0x06,
                SpuReg::KeyOffLo => 0x0C,
                SpuReg::KeyOffHi => 0x0E,
                SpuReg::FmModeLo => 0x10,
                SpuReg::FmModeHi => 0x12,
                SpuReg::NoiseModeLo => 0x14,
                SpuReg::NoiseModeHi => 0x16,
                SpuReg::ReverbOnLo => 0x18,
                SpuReg::ReverbOnHi => 0x1A,
                SpuReg::ReverbAddr => 0x22,
                SpuReg::Ctrl => 0x2A,
                SpuReg::DmaCtrl => 0x2C,
                SpuReg::Stat => 0x2E,
                SpuReg::CdVolL => 0x30,
                SpuReg::CdVolR => 0x32,
                SpuReg::ExtVolL => 0x34,
                SpuReg::ExtVolR => 0x36,
            }
    }
}

/// DUART channel A registers on the expansion 2 bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuartReg {
    Mode,
    /// Status (read).
    Sra,
    /// Command (write).
    Cra,
    /// TX holding register (write).
    Hra,
}

impl DuartReg {
    #[inline]
    pub const fn offset(self) -> usize {
        DUART_BASE
            + match self {
                DuartReg::Mode => 0,
                DuartReg::Sra => 1,
                DuartReg::Cra => 2,
                DuartReg::Hra => 3,
            }
    }
}
