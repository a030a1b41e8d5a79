//! Interrupt-side handlers owned by the dispatch layer itself.

use bit_field::BitField;
use phal::{Dma, DmaControl, Hardware};

use super::{DICR_CONTROL_MASK, DICR_FLAG_BASE};
use crate::system::System;

/// [`phal::Irq::Dma`] callback: fan DICR completion flags out to the
/// per-channel callbacks.
///
/// Each flag is cleared (write 1) before its callback runs. DICR is re-read
/// until no flags remain, so a transfer a callback starts and that finishes
/// immediately is still delivered.
pub(super) fn dma_interrupt<H: Hardware>(sys: &mut System<H>) {
    loop {
        let dicr = sys.hw.dma_control_read(DmaControl::Dicr);
        let flags = dicr.get_bits(DICR_FLAG_BASE..DICR_FLAG_BASE + 7);
        if flags == 0 {
            break;
        }

        let control = dicr & DICR_CONTROL_MASK;
        for index in 0..7 {
            if !flags.get_bit(index) {
                continue;
            }
            sys.hw
                .dma_control_write(DmaControl::Dicr, control | (1 << (DICR_FLAG_BASE + index)));
            let callback = Dma::from_index(index).and_then(|channel| sys.dma_callback(channel));
            if let Some(callback) = callback {
                callback(sys);
            }
        }
    }
}
