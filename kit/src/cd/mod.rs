//! CD-ROM driver.
//!
//! Commands go through a 16-entry [`Queue`]: the entry at the head has been
//! written to the controller, the rest wait for it to finish. The CD
//! interrupt reads the controller's interrupt cause and response, sorts it
//! into acknowledge / complete / data-ready / data-end, runs the callbacks
//! the in-flight command was issued with, and then starts the next command
//! unless one of those callbacks already issued one.
//!
//! ```text
//!   cd_issue ──► queue ──► issue_now ──► controller
//!                  ▲                        │ IRQ 2
//!                  └──── dispatch ◄── cd_interrupt ──► callbacks
//! ```

mod irq;
mod iso;
mod read;
mod types;

pub use types::{
    Bcd, CdResult, Command, CommandFlags, DaReport, File, IrqStatus, Loc, Mode, Region, SECTOR_SIZE,
    Status,
};

use core::sync::atomic::{AtomicBool, Ordering};

use phal::regs::CD_BUS_CONFIG;
use phal::{CdPort, Dma, DmaControl, DmaReg, Hardware, Irq, MemCtrl, dpcr_set};

use self::irq::Report;
use self::read::ReadState;
use crate::queue::{Queue, QueueHost};
use crate::sync;
use crate::system::System;

/// Command callback: receives the interrupt outcome and the response.
///
/// The response buffer is reused for the next interrupt; copy out what you
/// need.
pub type CdCallback<H> = fn(&mut System<H>, IrqStatus, &CdResult);

/// Sector-read completion: start address and sector count of the read.
pub type ReadCallback<H> = fn(&mut System<H>, *mut u32, usize);

/// Words in one data sector.
pub const SECTOR_WORDS: usize = SECTOR_SIZE / 4;

/// Controller status register bits.
const STAT_RESULT_READY: u8 = 1 << 5;
const STAT_DATA_READY: u8 = 1 << 6;
const STAT_BUSY: u8 = 1 << 7;

/// DMA `chcr` start bit.
const CHCR_START: u32 = 1 << 24;

/// One queued command.
pub struct CdArgs<H: Hardware> {
    command: Command,
    complete: Option<CdCallback<H>>,
    ready: Option<CdCallback<H>>,
    end: Option<CdCallback<H>>,
    params: [u8; 8],
    len: usize,
}

pub(crate) type CdQueue<H> = Queue<System<H>, CdArgs<H>, 16>;

/// CD driver state, owned by [`System`].
pub struct CdDriver<H: Hardware> {
    region: Region,

    last_command: u8,
    last_status: Status,
    last_error: Status,

    complete: Option<CdCallback<H>>,
    ready: Option<CdCallback<H>>,
    end: Option<CdCallback<H>>,

    acknowledge_report: Report,
    complete_report: Report,
    ready_report: Report,
    end_report: Report,

    complete_pending: AtomicBool,
    dispatch_pending: AtomicBool,
    media_changed: AtomicBool,

    queue: CdQueue<H>,
    read: ReadState<H>,
    all: Option<File>,
}

impl<H: Hardware> CdDriver<H> {
    pub const fn new() -> Self {
        Self {
            region: Region::America,
            last_command: 0,
            last_status: Status::empty(),
            last_error: Status::empty(),
            complete: None,
            ready: None,
            end: None,
            acknowledge_report: Report::NONE,
            complete_report: Report::NONE,
            ready_report: Report::NONE,
            end_report: Report::NONE,
            complete_pending: AtomicBool::new(false),
            dispatch_pending: AtomicBool::new(false),
            media_changed: AtomicBool::new(false),
            queue: CdQueue::new(),
            read: ReadState::new(),
            all: None,
        }
    }
}

impl<H: Hardware> Default for CdDriver<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Hardware> QueueHost<CdQueue<H>> for System<H> {
    #[inline]
    fn queue(&mut self) -> &mut CdQueue<H> {
        &mut self.cd.queue
    }
}

/// Queue handler: write one command to the controller.
fn issue_now<H: Hardware>(sys: &mut System<H>, args: &CdArgs<H>) {
    let cd = &mut sys.cd;
    cd.complete = args.complete;
    cd.ready = args.ready;
    cd.end = args.end;
    cd.last_command = args.command as u8;
    cd.complete_pending.store(true, Ordering::Release);
    cd.dispatch_pending.store(true, Ordering::Release);

    let hw = &mut sys.hw;

    // Parameter FIFO reset.
    while hw.cd_read(CdPort::Status) & STAT_BUSY != 0 {
        hw.relax();
    }
    hw.cd_write(CdPort::Status, 0x01);
    hw.cd_write(CdPort::Irq, 0x40);

    while hw.cd_read(CdPort::Status) & (STAT_BUSY | STAT_DATA_READY | STAT_RESULT_READY) != 0 {
        hw.relax();
    }

    // Acknowledge everything still pending.
    hw.cd_write(CdPort::Status, 0x01);
    hw.cd_write(CdPort::Irq, 0x1F);

    hw.cd_write(CdPort::Status, 0x00);
    for &param in &args.params[..args.len] {
        hw.cd_write(CdPort::Data, param);
    }

    hw.cd_write(CdPort::Status, 0x00);
    hw.cd_write(CdPort::Command, args.command as u8);
}

fn detect_region<H: Hardware>(sys: &mut System<H>, _status: IrqStatus, result: &CdResult) {
    sys.cd.region = Region::from_test_reply(result);
}

impl<H: Hardware> System<H> {
    /// Reset the controller and the drive, then detect the region.
    ///
    /// A drive that answers the reset with a disc error is fatal.
    pub fn cd_init(&mut self) {
        self.set_irq(Irq::Cdrom, Some(irq::cd_interrupt::<H>));

        self.hw.mem_ctrl_write(MemCtrl::CdDelaySize, CD_BUS_CONFIG);

        self.hw.cd_write(CdPort::Status, 0x01);
        self.hw.cd_write(CdPort::Irq, 0x1F);
        self.hw.cd_write(CdPort::Data, 0x1F);

        self.hw.cd_write(CdPort::Status, 0x00);
        self.hw.cd_write(CdPort::Irq, 0x00);

        let dpcr = self.hw.dma_control_read(DmaControl::Dpcr);
        self.hw
            .dma_control_write(DmaControl::Dpcr, dpcr_set(dpcr, Dma::Cdrom, 3));
        self.hw.dma_write(Dma::Cdrom, DmaReg::Chcr, 0);

        self.cd_issue(Command::Nop, None, None, None, &[]);
        self.cd_issue(Command::Init, None, None, None, &[]);
        self.cd.media_changed.store(true, Ordering::Release);

        if self.cd_sync() == IrqStatus::DiscError {
            panic!("CD init failed");
        }

        self.cd_issue(Command::Unmute, None, None, None, &[]);

        self.cd.region = Region::America;
        self.cd_issue(Command::Test, Some(detect_region::<H>), None, None, &[0x22]);
        self.cd_sync();

        plog::info!("CD initialised, region {:?}", self.cd.region);
    }

    /// Queue a command.
    ///
    /// `complete` fires once the command has finished (on the acknowledge
    /// for commands without a second phase), `ready` for every data-ready
    /// and data-end interrupt, `end` on data-end. At most eight parameter
    /// bytes are sent.
    pub fn cd_issue(
        &mut self,
        command: Command,
        complete: Option<CdCallback<H>>,
        ready: Option<CdCallback<H>>,
        end: Option<CdCallback<H>>,
        params: &[u8],
    ) {
        debug_assert!(params.len() <= 8, "CD commands take at most 8 parameters");
        let len = params.len().min(8);
        let mut args = CdArgs {
            command,
            complete,
            ready,
            end,
            params: [0; 8],
            len,
        };
        args.params[..len].copy_from_slice(&params[..len]);
        CdQueue::<H>::enqueue(self, issue_now::<H>, args);
    }

    /// Wait for the command queue to drain and return the outcome of the
    /// last completion.
    pub fn cd_queue_sync(&mut self) -> IrqStatus {
        CdQueue::<H>::sync(self);
        self.cd.complete_report.status
    }

    /// Wait for the queue to drain and the last command to complete.
    ///
    /// Gives up after [`crate::sync::TIMEOUT`] iterations, logging
    /// `CD sync timeout` and returning [`IrqStatus::NoIrq`].
    pub fn cd_sync(&mut self) -> IrqStatus {
        CdQueue::<H>::sync(self);
        if self.wait_for("CD sync", |sys| !sys.cd.complete_pending.load(Ordering::Acquire)) {
            self.cd.complete_report.status
        } else {
            IrqStatus::NoIrq
        }
    }

    /// Pull the sector the drive just reported ready into `dst` by DMA.
    ///
    /// Meant for ready callbacks: each data-ready interrupt must be
    /// answered with exactly one full sector ([`SECTOR_WORDS`] words).
    pub fn cd_get_sector(&mut self, dst: &mut [u32]) {
        let hw = &mut self.hw;
        hw.cd_write(CdPort::Status, 0x00);
        hw.cd_write(CdPort::Irq, 0x80);

        hw.dma_set_address(Dma::Cdrom, dst.as_mut_ptr() as usize);
        hw.dma_write(Dma::Cdrom, DmaReg::Bcr, dst.len() as u32 | (1 << 16));

        while hw.cd_read(CdPort::Status) & STAT_DATA_READY == 0 {
            hw.relax();
        }

        hw.dma_write(Dma::Cdrom, DmaReg::Chcr, 0x1100_0000);
        while hw.dma_read(Dma::Cdrom, DmaReg::Chcr) & CHCR_START != 0 {
            hw.relax();
        }
    }

    /// Play a CD-DA track.
    ///
    /// With a `report` callback the drive is put in report mode and the
    /// callback receives a [`DaReport`]-shaped response on every ready
    /// interrupt. `end` fires when the track ends.
    pub fn cd_play_track(
        &mut self,
        track: u8,
        report: Option<CdCallback<H>>,
        end: Option<CdCallback<H>>,
    ) {
        let mut mode = Mode::AUTO_PAUSE;
        if report.is_some() {
            mode |= Mode::REPORT;
        }
        self.cd_issue(Command::SetMode, None, None, None, &[mode.bits()]);
        self.cd_issue(Command::Play, None, report, end, &[track]);
    }

    /// Take the media-changed flag, clearing it.
    pub fn cd_media_changed(&mut self) -> bool {
        // No compare-and-swap on the R3000.
        sync::without_interrupts(self, |sys| {
            let changed = sys.cd.media_changed.load(Ordering::Acquire);
            sys.cd.media_changed.store(false, Ordering::Release);
            changed
        })
    }

    /// Status byte of the most recent response that carried one.
    pub fn cd_last_status(&self) -> Status {
        self.cd.last_status
    }

    /// Status byte at the most recent transition into the error state.
    pub fn cd_last_error(&self) -> Status {
        self.cd.last_error
    }

    pub fn cd_region(&self) -> Region {
        self.cd.region
    }

    /// Opcode of the command most recently written to the controller.
    pub fn cd_last_command(&self) -> Option<Command> {
        Command::from_u8(self.cd.last_command)
    }
}
