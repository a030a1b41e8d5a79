//! CD interrupt classification.

use bitflags::bitflags;
use core::sync::atomic::Ordering;

use phal::{CdPort, Hardware};

use super::types::{CdResult, Command, CommandFlags, IrqStatus, Status};
use super::{CdQueue, STAT_RESULT_READY};
use crate::system::System;

/// Outcome of one interrupt as handed to a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Report {
    pub status: IrqStatus,
    pub result: CdResult,
}

impl Report {
    pub const NONE: Report = Report { status: IrqStatus::NoIrq, result: [0; 8] };
}

bitflags! {
    /// Which callback slots an interrupt feeds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(super) struct Handled: u8 {
        const ACKNOWLEDGE = 1 << 0;
        const COMPLETE = 1 << 1;
        const DATA_READY = 1 << 2;
        const DATA_END = 1 << 3;
    }
}

impl<H: Hardware> System<H> {
    /// Record a new drive status byte, logging error and lid transitions.
    fn cd_update_status(&mut self, status: Status) {
        let last = core::mem::replace(&mut self.cd.last_status, status);

        if !last.contains(Status::ERROR) && status.contains(Status::ERROR) {
            plog::warn!("CD drive error");
            self.cd.last_error = status;
        }
        if !last.contains(Status::SHELL_OPEN) && status.contains(Status::SHELL_OPEN) {
            plog::info!("CD media changed");
            self.cd.media_changed.store(true, Ordering::Release);
        }
    }

    /// Read, acknowledge and classify one controller interrupt.
    ///
    /// Returns the empty set once no interrupt is pending.
    fn cd_handle_irq(&mut self) -> Handled {
        let hw = &mut self.hw;

        hw.cd_write(CdPort::Status, 0x01);
        let mut cause = hw.cd_read(CdPort::Irq) & 0x07;
        if cause == 0 {
            return Handled::empty();
        }
        // The flag field can still be settling; read until it is stable.
        loop {
            let again = hw.cd_read(CdPort::Irq) & 0x07;
            if again == cause {
                break;
            }
            cause = again;
        }

        let mut result: CdResult = [0; 8];
        let mut results = 0;
        while hw.cd_read(CdPort::Status) & STAT_RESULT_READY != 0 {
            let byte = hw.cd_read(CdPort::Command);
            if results < result.len() {
                result[results] = byte;
                results += 1;
            }
        }

        // Acknowledge and re-enable the interrupt causes.
        hw.cd_write(CdPort::Status, 0x01);
        hw.cd_write(CdPort::Irq, 0x07);
        hw.cd_write(CdPort::Data, 0x07);

        let status = IrqStatus::from_bits(cause);
        let flags = Command::from_u8(self.cd.last_command)
            .map_or(CommandFlags::empty(), Command::flags);

        let mut error = false;
        if status != IrqStatus::Acknowledge || flags.contains(CommandFlags::STATUS) {
            let first = Status::from_bits_retain(result[0]);
            self.cd_update_status(first);
            error = first.intersects(Status::ERROR_MASK);
        }

        let report = |status| Report { status, result };
        let cd = &mut self.cd;
        match status {
            IrqStatus::DataReady => {
                // A data-ready carrying nothing but the status byte is not an
                // error, whatever that byte says.
                if results == 1 {
                    error = false;
                }
                cd.ready_report = report(if error { IrqStatus::DiscError } else { IrqStatus::DataReady });
                Handled::DATA_READY
            }
            IrqStatus::Complete => {
                cd.complete_report = report(if error { IrqStatus::DiscError } else { IrqStatus::Complete });
                Handled::COMPLETE
            }
            IrqStatus::Acknowledge if error => {
                cd.complete_report = report(IrqStatus::DiscError);
                Handled::COMPLETE
            }
            IrqStatus::Acknowledge if !flags.contains(CommandFlags::BLOCKING) => {
                // Single-phase command: the acknowledge is its completion.
                cd.complete_report = report(IrqStatus::Complete);
                Handled::COMPLETE
            }
            IrqStatus::Acknowledge => {
                cd.acknowledge_report = report(IrqStatus::Acknowledge);
                Handled::ACKNOWLEDGE
            }
            IrqStatus::DataEnd => {
                cd.end_report = report(IrqStatus::DataEnd);
                cd.ready_report = report(IrqStatus::DataEnd);
                Handled::DATA_END | Handled::DATA_READY
            }
            IrqStatus::DiscError => {
                cd.complete_report = report(IrqStatus::DiscError);
                cd.ready_report = report(IrqStatus::DiscError);
                Handled::COMPLETE | Handled::DATA_READY
            }
            IrqStatus::NoIrq => Handled::empty(),
        }
    }
}

/// [`phal::Irq::Cdrom`] callback.
pub(super) fn cd_interrupt<H: Hardware>(sys: &mut System<H>) {
    let index = sys.hw.cd_read(CdPort::Status);

    loop {
        let handled = sys.cd_handle_irq();
        if handled.is_empty() {
            break;
        }

        if handled.contains(Handled::COMPLETE) {
            sys.cd.dispatch_pending.store(false, Ordering::Release);
            sys.cd.complete_pending.store(false, Ordering::Release);
            if let Some(callback) = sys.cd.complete {
                let Report { status, result } = sys.cd.complete_report;
                callback(sys, status, &result);
            }
        }
        if handled.contains(Handled::DATA_READY) {
            if let Some(callback) = sys.cd.ready {
                let Report { status, result } = sys.cd.ready_report;
                callback(sys, status, &result);
            }
        }
        if handled.contains(Handled::DATA_END) {
            if let Some(callback) = sys.cd.end {
                let Report { status, result } = sys.cd.end_report;
                callback(sys, status, &result);
            }
        }

        // A callback that issued a command has already started it.
        if !sys.cd.dispatch_pending.load(Ordering::Acquire) {
            CdQueue::<H>::dispatch(sys);
        }
    }

    sys.hw.cd_write(CdPort::Status, index & 0x03);
}
