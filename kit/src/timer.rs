//! Periodic timer interrupt on root counter 2.

use phal::regs::F_CPU;
use phal::{Hardware, Irq, Timer, TimerReg};

use crate::system::System;
use crate::traps::Callback;

/// Counter 2 mode: reset at target, IRQ at target, repeat, clock / 8.
const MODE_PERIODIC: u16 = 0x0258;

/// Reload value for `hz` interrupts per second, clamped to the counter.
pub const fn timer_reload(hz: u32) -> u16 {
    let reload = F_CPU / 8 / if hz == 0 { 1 } else { hz };
    if reload > 0xFFFF { 0xFFFF } else { reload as u16 }
}

impl<H: Hardware> System<H> {
    /// Run `callback` `hz` times a second from the timer 2 interrupt.
    /// With `None` the interrupt is masked again. Returns the previous
    /// callback.
    pub fn set_timer_rate(&mut self, hz: u32, callback: Option<Callback<H>>) -> Option<Callback<H>> {
        self.hw.timer_write(Timer::System, TimerReg::Mode, MODE_PERIODIC);
        self.hw.timer_write(Timer::System, TimerReg::Target, timer_reload(hz));
        self.set_irq(Irq::Timer2, callback)
    }
}
