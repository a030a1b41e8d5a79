//! Debug TTY on the expansion 2 DUART.
//!
//! Retail consoles have nothing on expansion 2, so output is dropped unless
//! [`init`] found a DUART and it reports an idle transmitter when a string
//! is written.

use core::fmt;

use bit_field::BitField;
use spin::Mutex;

use crate::hardware::Hardware;
use crate::regs::{DuartReg, MemCtrl};

/// Status register value of an idle, present DUART.
const STATUS_IDLE: u8 = 0x0C;
/// Status bit: transmit holding register empty.
const STATUS_TX_READY: usize = 2;
/// Bus timing for the expansion 2 window.
const EXP2_DELAY_SIZE: u32 = 0x0007_0777;

/// Whether a DUART answered at init.
static PRESENT: Mutex<bool> = Mutex::new(false);

/// Configure the expansion 2 bus and probe for the DUART.
pub fn init<H: Hardware>(hw: &mut H) -> bool {
    hw.mem_ctrl_write(MemCtrl::Exp2DelaySize, EXP2_DELAY_SIZE);
    let present = hw.duart_read(DuartReg::Sra) == STATUS_IDLE;
    *PRESENT.lock() = present;
    present
}

/// Whether [`init`] found a DUART.
pub fn is_present() -> bool {
    *PRESENT.lock()
}

/// A borrowed TTY writer.
pub struct Tty<'a, H: Hardware> {
    hw: &'a mut H,
}

impl<'a, H: Hardware> Tty<'a, H> {
    pub fn new(hw: &'a mut H) -> Self {
        Self { hw }
    }

    fn is_idle(&mut self) -> bool {
        self.hw.duart_read(DuartReg::Sra) == STATUS_IDLE
    }

    /// Write one byte once the transmitter can take it.
    pub fn write_byte(&mut self, byte: u8) {
        while !self.hw.duart_read(DuartReg::Sra).get_bit(STATUS_TX_READY) {
            self.hw.relax();
        }
        self.hw.duart_write(DuartReg::Hra, byte);
    }
}

impl<H: Hardware> fmt::Write for Tty<'_, H> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if !is_present() || !self.is_idle() {
            return Ok(());
        }
        for byte in s.bytes() {
            self.write_byte(byte);
        }
        // Let the string drain before anything else touches the bus.
        while !self.is_idle() {
            self.hw.relax();
        }
        Ok(())
    }
}

/// Write a string to the TTY.
pub fn write_str<H: Hardware>(hw: &mut H, s: &str) {
    use fmt::Write;
    let _ = Tty::new(hw).write_str(s);
}

/// Write formatted arguments to the TTY.
pub fn write_fmt<H: Hardware>(hw: &mut H, args: fmt::Arguments) {
    use fmt::Write;
    let _ = Tty::new(hw).write_fmt(args);
}
