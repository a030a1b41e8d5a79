//! Sector streaming: `SetMode`, `SetLoc`, `ReadN`, one DMA per data-ready
//! interrupt, `Pause` once enough sectors have arrived.

use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

use phal::Hardware;

use super::types::{CdResult, Command, File, IrqStatus, Loc, Mode};
use super::{ReadCallback, SECTOR_WORDS};
use crate::sync::Interrupts;
use crate::system::System;

pub(super) struct ReadState<H: Hardware> {
    callback: Option<ReadCallback<H>>,
    start: *mut u32,
    start_sectors: usize,
    cursor: *mut u32,
    remaining: AtomicUsize,
}

impl<H: Hardware> ReadState<H> {
    pub const fn new() -> Self {
        Self {
            callback: None,
            start: ptr::null_mut(),
            start_sectors: 0,
            cursor: ptr::null_mut(),
            remaining: AtomicUsize::new(0),
        }
    }
}

/// Ready callback of the `ReadN` a read issues.
fn read_ready<H: Hardware>(sys: &mut System<H>, status: IrqStatus, _result: &CdResult) {
    if status != IrqStatus::DataReady {
        return;
    }
    // Sectors that arrive while the `Pause` is on its way are dropped.
    let remaining = sys.cd.read.remaining.load(Ordering::Acquire);
    if remaining == 0 {
        return;
    }

    let cursor = sys.cd.read.cursor;
    // SAFETY: `cd_read_sectors` requires room for `start_sectors` whole
    // sectors at `start`, and `cursor` has advanced fewer times than that.
    let sector = unsafe { core::slice::from_raw_parts_mut(cursor, SECTOR_WORDS) };
    sys.cd_get_sector(sector);
    sys.cd.read.cursor = cursor.wrapping_add(SECTOR_WORDS);

    let remaining = remaining - 1;
    sys.cd.read.remaining.store(remaining, Ordering::Release);
    if remaining == 0 {
        sys.cd_issue(Command::Pause, None, None, None, &[]);
        if let Some(callback) = sys.cd.read.callback {
            let (start, sectors) = (sys.cd.read.start, sys.cd.read.start_sectors);
            callback(sys, start, sectors);
        }
    }
}

impl<H: Hardware> System<H> {
    /// Start streaming `sectors` sectors from `loc` into `dst`.
    ///
    /// Waits for any previous read first. `callback` runs from the CD
    /// interrupt with the original `dst` and `sectors` once the last sector
    /// is in. A zero-sector read completes immediately without touching the
    /// drive.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for writes of `sectors * SECTOR_WORDS` words and
    /// must not be accessed by anything else until the read has finished
    /// (see [`System::cd_read_sync`]).
    pub unsafe fn cd_read_sectors(
        &mut self,
        callback: Option<ReadCallback<H>>,
        dst: *mut u32,
        loc: Loc,
        sectors: usize,
        mode: Mode,
    ) {
        self.cd_read_sync();

        let read = &mut self.cd.read;
        read.callback = callback;
        read.start = dst;
        read.start_sectors = sectors;
        read.cursor = dst;

        if sectors == 0 {
            if let Some(callback) = callback {
                callback(self, dst, 0);
            }
            return;
        }
        read.remaining.store(sectors, Ordering::Release);

        self.cd_issue(Command::SetMode, None, None, None, &[mode.bits()]);
        self.cd_issue(Command::SetLoc, None, None, None, &loc.params());
        self.cd_issue(Command::ReadN, None, Some(read_ready::<H>), None, &[]);
    }

    /// [`System::cd_read_sectors`] over a whole file extent.
    ///
    /// # Safety
    ///
    /// `dst` must have room for [`File::size`] bytes; otherwise as for
    /// [`System::cd_read_sectors`].
    pub unsafe fn cd_read_file(
        &mut self,
        callback: Option<ReadCallback<H>>,
        dst: *mut u32,
        file: &File,
        mode: Mode,
    ) {
        unsafe { self.cd_read_sectors(callback, dst, file.loc, file.sectors(), mode) }
    }

    /// Read whole sectors into `dst` and wait for them.
    ///
    /// Reads `dst.len() / SECTOR_WORDS` sectors; a trailing partial sector
    /// of `dst` is left untouched.
    pub fn cd_read(&mut self, dst: &mut [u32], loc: Loc, mode: Mode) {
        let sectors = dst.len() / SECTOR_WORDS;
        // SAFETY: `dst` is borrowed for the whole read, which is finished by
        // the time `cd_read_sync` returns.
        unsafe { self.cd_read_sectors(None, dst.as_mut_ptr(), loc, sectors, mode) };
        self.cd_read_sync();
    }

    /// Spin until the current read, if any, has received all its sectors.
    pub fn cd_read_sync(&mut self) {
        while self.cd.read.remaining.load(Ordering::Acquire) != 0 {
            self.relax();
        }
    }

    /// Sectors the current read is still waiting for.
    pub fn cd_read_remaining(&self) -> usize {
        self.cd.read.remaining.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cd::SECTOR_SIZE;
    use crate::sim::Sim;
    use phal::Irq;

    fn system() -> System<Sim> {
        let mut sys = System::new(Sim::new());
        sys.hw.interrupts = true;
        sys.cd_init();
        sys.hw.cd.commands.clear();
        sys
    }

    fn finished(sys: &mut System<Sim>, start: *mut u32, sectors: usize) {
        sys.hw.counters.reads.push((start as usize, sectors));
    }

    fn sector(fill: u8) -> Vec<u8> {
        vec![fill; SECTOR_SIZE]
    }

    #[test]
    fn read_completes_with_the_original_extent() {
        let mut sys = system();
        for lba in 100..103 {
            sys.hw.cd.disc.insert(lba, sector(lba as u8));
        }

        let mut buffer = vec![0u32; SECTOR_WORDS * 3];
        let start = buffer.as_mut_ptr();
        unsafe { sys.cd_read_sectors(Some(finished), start, Loc::enc(100), 3, Mode::SPEED) };
        sys.cd_read_sync();
        assert_eq!(sys.cd_sync(), crate::cd::IrqStatus::Complete);

        assert_eq!(sys.hw.counters.reads, [(start as usize, 3)]);
        for (index, chunk) in buffer.chunks(SECTOR_WORDS).enumerate() {
            let fill = 100 + index as u32;
            let word = u32::from_ne_bytes([fill as u8; 4]);
            assert!(chunk.iter().all(|&w| w == word), "sector {index}");
        }

        let opcodes: Vec<u8> = sys.hw.cd.commands.iter().map(|(op, _)| *op).collect();
        assert_eq!(opcodes, [0x0E, 0x02, 0x06, 0x09]);
        assert_eq!(sys.hw.cd.commands[0].1, [Mode::SPEED.bits()]);
        assert_eq!(sys.hw.cd.commands[1].1, Loc::enc(100).params());
        assert_eq!(sys.cd_read_remaining(), 0);
    }

    #[test]
    fn read_file_rounds_up_to_whole_sectors() {
        let mut sys = system();
        let file = File { loc: Loc::enc(40), size: SECTOR_SIZE + 1 };
        let mut buffer = vec![0u32; file.size() / 4];
        unsafe { sys.cd_read_file(Some(finished), buffer.as_mut_ptr(), &file, Mode::SPEED) };
        sys.cd_read_sync();
        assert_eq!(sys.hw.counters.reads[0].1, 2);
    }

    #[test]
    fn zero_sector_read_never_reaches_the_drive() {
        let mut sys = system();
        let mut buffer = [0u32; 1];
        unsafe { sys.cd_read_sectors(Some(finished), buffer.as_mut_ptr(), Loc::enc(0), 0, Mode::empty()) };
        assert_eq!(sys.hw.counters.reads.len(), 1);
        assert!(sys.hw.cd.commands.is_empty());
    }

    #[test]
    fn blocking_read_fills_the_slice() {
        let mut sys = system();
        sys.hw.cd.disc.insert(7, sector(0xAB));
        let mut buffer = [0u32; SECTOR_WORDS];
        sys.cd_read(&mut buffer, Loc::enc(7), Mode::SPEED);
        assert!(buffer.iter().all(|&w| w == 0xABAB_ABAB));
        assert!(sys.irq_callback(Irq::Cdrom).is_some());
    }
}
