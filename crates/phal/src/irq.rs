//! Interrupt causes and DMA channels.
//!
//! The interrupt controller has one status/mask bit per [`Irq`]; the DMA
//! controller has seven channels whose completion flags are folded into the
//! single [`Irq::Dma`] cause.

/// Number of interrupt controller bits the dispatch table covers.
pub const IRQ_COUNT: usize = 16;

/// Number of DMA channel slots the dispatch table covers.
pub const DMA_COUNT: usize = 8;

/// Interrupt cause, numbered by its bit in `I_STAT`/`I_MASK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Irq {
    VBlank = 0,
    Gpu = 1,
    Cdrom = 2,
    Dma = 3,
    Timer0 = 4,
    Timer1 = 5,
    Timer2 = 6,
    Sio0 = 7,
    Sio1 = 8,
    Spu = 9,
    Aux = 10,
}

impl Irq {
    pub const ALL: [Irq; 11] = [
        Irq::VBlank,
        Irq::Gpu,
        Irq::Cdrom,
        Irq::Dma,
        Irq::Timer0,
        Irq::Timer1,
        Irq::Timer2,
        Irq::Sio0,
        Irq::Sio1,
        Irq::Spu,
        Irq::Aux,
    ];

    /// Bit mask of this cause in `I_STAT`/`I_MASK`.
    #[inline]
    pub const fn mask(self) -> u16 {
        1 << self as u16
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// DMA channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Dma {
    MdecIn = 0,
    MdecOut = 1,
    Gpu = 2,
    Cdrom = 3,
    Spu = 4,
    Pio = 5,
    /// Ordering-table clear: writes a reverse linked list of empty tags.
    Otc = 6,
}

impl Dma {
    pub const ALL: [Dma; 7] = [
        Dma::MdecIn,
        Dma::MdecOut,
        Dma::Gpu,
        Dma::Cdrom,
        Dma::Spu,
        Dma::Pio,
        Dma::Otc,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look a channel up by its DICR flag index.
    pub const fn from_index(index: usize) -> Option<Dma> {
        match index {
            0 => Some(Dma::MdecIn),
            1 => Some(Dma::MdecOut),
            2 => Some(Dma::Gpu),
            3 => Some(Dma::Cdrom),
            4 => Some(Dma::Spu),
            5 => Some(Dma::Pio),
            6 => Some(Dma::Otc),
            _ => None,
        }
    }
}

/// Set a channel's priority in DPCR and enable it.
///
/// Each channel owns a nibble: bits 0-2 priority, bit 3 enable.
#[inline]
pub const fn dpcr_set(dpcr: u32, channel: Dma, priority: u32) -> u32 {
    let shift = channel as u32 * 4;
    (dpcr & !(0xF << shift)) | ((priority & 7) << shift) | (8 << shift)
}
