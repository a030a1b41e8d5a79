//! SPU bring-up.
//!
//! Leaves the SPU enabled with every voice keyed off, reverb and the
//! external input silenced, and CD audio routed through at full volume.
//! Sound data transfer is not handled here.

use phal::regs::SPU_BUS_CONFIG;
use phal::{Dma, DmaControl, DmaReg, Hardware, MemCtrl, SpuReg, dpcr_set};

use crate::system::System;

/// SPUCNT: SPU enable, unmute, CD audio enable.
const CTRL_ENABLE: u16 = 0xC001;
/// SPU transfer control: normal transfer mode.
const DMA_CTRL_NORMAL: u16 = 0x0004;

impl<H: Hardware> System<H> {
    /// Wait until `SPUSTAT & mask == value`.
    fn spu_status_sync(&mut self, mask: u16, value: u16) -> bool {
        self.wait_for("SPU status", |sys| sys.hw.spu_read(SpuReg::Stat) & mask == value)
    }

    pub fn spu_init(&mut self) {
        self.hw.mem_ctrl_write(MemCtrl::SpuDelaySize, SPU_BUS_CONFIG);

        self.hw.spu_write(SpuReg::Ctrl, 0);
        self.spu_status_sync(0x001F, 0);

        let writes = [
            (SpuReg::MainVolL, 0x3FFF),
            (SpuReg::MainVolR, 0x3FFF),
            (SpuReg::ReverbVolL, 0),
            (SpuReg::ReverbVolR, 0),
            (SpuReg::KeyOffLo, 0xFFFF),
            (SpuReg::KeyOffHi, 0x00FF),
            (SpuReg::FmModeLo, 0),
            (SpuReg::FmModeHi, 0),
            (SpuReg::NoiseModeLo, 0),
            (SpuReg::NoiseModeHi, 0),
            (SpuReg::ReverbOnLo, 0),
            (SpuReg::ReverbOnHi, 0),
            (SpuReg::ReverbAddr, 0xFFFE),
            (SpuReg::CdVolL, 0x7FFF),
            (SpuReg::CdVolR, 0x7FFF),
            (SpuReg::ExtVolL, 0),
            (SpuReg::ExtVolR, 0),
        ];
        for (reg, value) in writes {
            self.hw.spu_write(reg, value);
        }

        let dpcr = self.hw.dma_control_read(DmaControl::Dpcr);
        self.hw.dma_control_write(DmaControl::Dpcr, dpcr_set(dpcr, Dma::Spu, 3));
        self.hw.dma_write(Dma::Spu, DmaReg::Chcr, 0x201);

        self.hw.spu_write(SpuReg::DmaCtrl, DMA_CTRL_NORMAL);
        self.hw.spu_write(SpuReg::Ctrl, CTRL_ENABLE);
        if self.spu_status_sync(0x003F, 0x0001) {
            plog::info!("SPU initialised");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Sim;

    #[test]
    fn init_leaves_the_spu_enabled_and_silent() {
        let mut sys = System::new(Sim::new());
        sys.spu_init();

        assert_eq!(sys.hw.spu(SpuReg::Ctrl), CTRL_ENABLE);
        assert_eq!(sys.hw.spu(SpuReg::MainVolL), 0x3FFF);
        assert_eq!(sys.hw.spu(SpuReg::KeyOffLo), 0xFFFF);
        assert_eq!(sys.hw.spu(SpuReg::KeyOffHi), 0x00FF);
        assert_eq!(sys.hw.spu(SpuReg::ReverbVolR), 0);
        assert_eq!(sys.hw.spu(SpuReg::CdVolR), 0x7FFF);
        assert_eq!(sys.hw.mem_ctrl[0], SPU_BUS_CONFIG);
        assert_eq!(sys.hw.dpcr & 0x000F_0000, 0x000B_0000);
        assert_eq!(sys.hw.dma_read(Dma::Spu, DmaReg::Chcr), 0x201);
    }

    #[test]
    fn status_that_never_settles_times_out() {
        let mut sys = System::new(Sim::new());
        sys.hw.spu_stuck = true;
        assert!(!sys.spu_status_sync(0x3F, 0x01));
    }
}
