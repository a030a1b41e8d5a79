//! The context every subsystem hangs off.

use core::sync::atomic::{Ordering, compiler_fence};

use phal::Hardware;

use crate::cd::CdDriver;
use crate::gpu::Gpu;
use crate::sync::{self, Interrupts};
use crate::traps::Traps;

/// Which optional subsystems [`System::init`] brings up.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Reset the drive, detect the region and leave it ready for reads.
    pub cd: bool,
    /// Reset the SPU to a silent, enabled state.
    pub spu: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { cd: true, spu: true }
    }
}

/// Owns the register backend and the state of every driver.
///
/// Interrupt handlers, queue handlers and user callbacks all receive
/// `&mut System<H>`; nothing in the crate keeps global driver state.
pub struct System<H: Hardware> {
    pub(crate) hw: H,
    pub(crate) traps: Traps<H>,
    pub(crate) cd: CdDriver<H>,
    pub(crate) gpu: Gpu<H>,
}

impl<H: Hardware> System<H> {
    pub fn new(hw: H) -> Self {
        Self {
            hw,
            traps: Traps::new(),
            cd: CdDriver::new(),
            gpu: Gpu::new(),
        }
    }

    /// The register backend.
    pub fn hw(&mut self) -> &mut H {
        &mut self.hw
    }

    /// Bring the machine to a known state: interrupt and DMA controllers
    /// (leaving CPU interrupts enabled), GPU, then the optional subsystems.
    pub fn init(&mut self, config: &Config) {
        self.traps_init();
        self.hw.restore_interrupts(true);
        self.gpu_init();

        if config.cd {
            self.cd_init();
        }
        if config.spu {
            self.spu_init();
        }

        plog::info!("psx-kit initialised");
    }

    /// Bounded spin on `done`; logs `what` on timeout.
    pub(crate) fn wait_for(&mut self, what: &str, done: impl FnMut(&mut Self) -> bool) -> bool {
        if sync::spin_until(self, sync::TIMEOUT, done) {
            return true;
        }
        plog::warn!("{} timeout", what);
        false
    }
}

impl<H: Hardware> Interrupts for System<H> {
    #[inline]
    fn mask_interrupts(&mut self) -> bool {
        self.hw.disable_interrupts()
    }

    #[inline]
    fn restore_interrupts(&mut self, was_enabled: bool) {
        self.hw.restore_interrupts(was_enabled);
    }

    fn relax(&mut self) {
        // Handlers write driver state through their own pointer to the
        // system; nothing read before this point may be reused after it.
        compiler_fence(Ordering::SeqCst);
        self.hw.relax();
        if self.hw.interrupts_enabled() && self.hw.poll_interrupt() {
            let irq_was_enabled = self.hw.disable_interrupts();
            self.service_interrupts();
            self.hw.restore_interrupts(irq_was_enabled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Sim;
    use phal::Irq;

    fn count_vblank(sys: &mut System<Sim>) {
        sys.hw.counters.vblank_callbacks += 1;
    }

    fn system() -> System<Sim> {
        let mut sys = System::new(Sim::new());
        sys.hw.vblank_period = 4;
        sys.set_irq(Irq::VBlank, Some(count_vblank));
        sys
    }

    #[test]
    fn waits_observe_what_handlers_wrote() {
        let mut sys = system();
        sys.hw.interrupts = true;
        assert!(sys.wait_for("vblank", |sys| sys.hw.counters.vblank_callbacks >= 3));
        assert!(sys.hw.interrupts_enabled());
    }

    #[test]
    fn masked_waits_time_out() {
        let mut sys = system();
        sys.hw.interrupts = false;
        assert!(!sys.wait_for("vblank", |sys| sys.hw.counters.vblank_callbacks > 0));
        assert_eq!(sys.hw.counters.vblank_callbacks, 0);
    }
}
