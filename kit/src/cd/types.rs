//! CD-ROM value types: BCD positions, file extents, opcodes, status bytes.

use bitflags::bitflags;

/// Bytes in one Mode 1 / Mode 2 Form 1 data sector.
pub const SECTOR_SIZE: usize = 2048;

/// Sectors per second of disc time.
const SECTORS_PER_SECOND: u32 = 75;
/// Two-second lead-in before sector 0 of the data track.
const PREGAP: u32 = SECTORS_PER_SECOND * 2;

/// Eight-byte drive response. Shorter responses are zero-padded.
pub type CdResult = [u8; 8];

/// Binary-coded decimal byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Bcd(pub u8);

impl Bcd {
    #[inline]
    pub const fn dec(self) -> u8 {
        self.0 - 6 * (self.0 >> 4)
    }

    #[inline]
    pub const fn enc(dec: u8) -> Bcd {
        Bcd(((dec / 10) << 4) | (dec % 10))
    }
}

/// Disc position as the drive's `SetLoc` parameters: minute, second,
/// sector, all BCD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Loc {
    pub minute: Bcd,
    pub second: Bcd,
    pub sector: Bcd,
}

impl Loc {
    /// Logical sector index (pregap removed).
    ///
    /// Positions inside the lead-in wrap around to the top of the `u32`
    /// range, and [`Loc::enc`] maps them back.
    pub const fn dec(&self) -> u32 {
        let abs = self.minute.dec() as u32 * (SECTORS_PER_SECOND * 60)
            + self.second.dec() as u32 * SECTORS_PER_SECOND
            + self.sector.dec() as u32;
        abs.wrapping_sub(PREGAP)
    }

    /// Position of logical sector `lba`.
    pub const fn enc(lba: u32) -> Loc {
        let abs = lba.wrapping_add(PREGAP);
        Loc {
            minute: Bcd::enc((abs / (SECTORS_PER_SECOND * 60)) as u8),
            second: Bcd::enc(((abs / SECTORS_PER_SECOND) % 60) as u8),
            sector: Bcd::enc((abs % SECTORS_PER_SECOND) as u8),
        }
    }

    /// The three `SetLoc` parameter bytes.
    #[inline]
    pub const fn params(&self) -> [u8; 3] {
        [self.minute.0, self.second.0, self.sector.0]
    }
}

/// A contiguous extent on disc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct File {
    pub loc: Loc,
    pub size: usize,
}

impl File {
    /// Sectors the extent spans, rounding up.
    #[inline]
    pub const fn sectors(&self) -> usize {
        (self.size + 0x7FF) >> 11
    }

    /// Byte size rounded up to whole sectors; the size a read buffer needs.
    #[inline]
    pub const fn size(&self) -> usize {
        self.sectors() << 11
    }
}

/// Console region as reported by the drive's `Test 0x22` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    Japan = 0,
    #[default]
    America = 1,
    Europe = 2,
    Worldwide = 3,
    Debug = 4,
}

impl Region {
    /// Interpret the reply to `Test 0x22`.
    ///
    /// The drive answers with a string such as `for U/C`; only the first
    /// eight bytes survive in a [`CdResult`]. Early Japanese units reject
    /// the sub-command instead. Anything unrecognised is
    /// [`Region::America`].
    pub fn from_test_reply(result: &CdResult) -> Region {
        const PREFIXES: [(&[u8], Region); 6] = [
            (b"for Japan", Region::Japan),
            (b"for U/C", Region::America),
            (b"for Europe", Region::Europe),
            (b"for NETNA", Region::Worldwide),
            (b"for NETEU", Region::Worldwide),
            (b"for US/AEP", Region::Debug),
        ];

        if result[1] == 0x10 {
            return Region::Japan;
        }
        for (prefix, region) in PREFIXES {
            let len = prefix.len().min(result.len());
            if result[..len] == prefix[..len] {
                return region;
            }
        }
        Region::America
    }
}

/// Outcome passed to every command callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum IrqStatus {
    #[default]
    NoIrq = 0,
    DataReady = 1,
    Complete = 2,
    Acknowledge = 3,
    DataEnd = 4,
    DiscError = 5,
}

impl IrqStatus {
    /// Decode the controller's interrupt-flag field.
    pub const fn from_bits(bits: u8) -> IrqStatus {
        match bits & 7 {
            1 => IrqStatus::DataReady,
            2 => IrqStatus::Complete,
            3 => IrqStatus::Acknowledge,
            4 => IrqStatus::DataEnd,
            5 => IrqStatus::DiscError,
            _ => IrqStatus::NoIrq,
        }
    }
}

/// Drive command opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Nop = 0x01,
    SetLoc = 0x02,
    Play = 0x03,
    Forward = 0x04,
    Backward = 0x05,
    ReadN = 0x06,
    Standby = 0x07,
    Stop = 0x08,
    Pause = 0x09,
    Init = 0x0A,
    Mute = 0x0B,
    Unmute = 0x0C,
    SetFilter = 0x0D,
    SetMode = 0x0E,
    GetParam = 0x0F,
    GetLocL = 0x10,
    GetLocP = 0x11,
    SetSession = 0x12,
    GetTN = 0x13,
    GetTD = 0x14,
    SeekL = 0x15,
    SeekP = 0x16,
    Test = 0x19,
    GetID = 0x1A,
    ReadS = 0x1B,
    Reset = 0x1C,
    GetQ = 0x1D,
    ReadTOC = 0x1E,
}

bitflags! {
    /// How a command's interrupts are interpreted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CommandFlags: u8 {
        /// First response byte is the drive status.
        const STATUS = 1 << 0;
        /// Completes on a second (INT2) interrupt, not on the acknowledge.
        const BLOCKING = 1 << 1;
        /// Streams sectors through the data FIFO.
        const SECTOR_BUFFER = 1 << 2;
    }
}

impl Command {
    pub const fn flags(self) -> CommandFlags {
        const S: CommandFlags = CommandFlags::STATUS;
        const SB: CommandFlags = CommandFlags::STATUS.union(CommandFlags::BLOCKING);
        const SS: CommandFlags = CommandFlags::STATUS.union(CommandFlags::SECTOR_BUFFER);
        match self {
            Command::Nop
            | Command::SetLoc
            | Command::Play
            | Command::Forward
            | Command::Backward
            | Command::Mute
            | Command::Unmute
            | Command::SetFilter
            | Command::SetMode
            | Command::GetParam
            | Command::GetTN
            | Command::GetTD
            | Command::Reset => S,
            Command::ReadN | Command::ReadS => SS,
            Command::Standby
            | Command::Stop
            | Command::Pause
            | Command::Init
            | Command::SetSession
            | Command::SeekL
            | Command::SeekP
            | Command::GetID
            | Command::GetQ
            | Command::ReadTOC => SB,
            Command::GetLocL | Command::GetLocP | Command::Test => CommandFlags::empty(),
        }
    }

    pub const fn from_u8(opcode: u8) -> Option<Command> {
        Some(match opcode {
            0x01 => Command::Nop,
            0x02 => Command::SetLoc,
            0x03 => Command::Play,
            0x04 => Command::Forward,
            0x05 => Command::Backward,
            0x06 => Command::ReadN,
            0x07 => Command::Standby,
            0x08 => Command::Stop,
            0x09 => Command::Pause,
            0x0A => Command::Init,
            0x0B => Command::Mute,
            0x0C => Command::Unmute,
            0x0D => Command::SetFilter,
            0x0E => Command::SetMode,
            0x0F => Command::GetParam,
            0x10 => Command::GetLocL,
            0x11 => Command::GetLocP,
            0x12 => Command::SetSession,
            0x13 => Command::GetTN,
            0x14 => Command::GetTD,
            0x15 => Command::SeekL,
            0x16 => Command::SeekP,
            0x19 => Command::Test,
            0x1A => Command::GetID,
            0x1B => Command::ReadS,
            0x1C => Command::Reset,
            0x1D => Command::GetQ,
            0x1E => Command::ReadTOC,
            _ => return None,
        })
    }
}

bitflags! {
    /// `SetMode` parameter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Mode: u8 {
        const DIGITAL_AUDIO = 1 << 0;
        const AUTO_PAUSE = 1 << 1;
        const REPORT = 1 << 2;
        const XA_FILTER = 1 << 3;
        const IGNORE = 1 << 4;
        const SIZE = 1 << 5;
        const XA_INPUT = 1 << 6;
        const SPEED = 1 << 7;
    }
}

bitflags! {
    /// Drive status byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Status: u8 {
        const ERROR = 1 << 0;
        const STANDBY = 1 << 1;
        const SEEK_ERROR = 1 << 2;
        const ID_ERROR = 1 << 3;
        const SHELL_OPEN = 1 << 4;
        const READ = 1 << 5;
        const SEEK = 1 << 6;
        const PLAY = 1 << 7;
    }
}

impl Status {
    /// Bits that turn a response into a disc error.
    pub const ERROR_MASK: Status = Status::ERROR
        .union(Status::SEEK_ERROR)
        .union(Status::ID_ERROR)
        .union(Status::SHELL_OPEN);
}

/// Audio playback report delivered to the report callback of
/// [`crate::System::cd_play_track`] when `Mode::REPORT` is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaReport {
    pub stat: Status,
    pub track: Bcd,
    pub index: Bcd,
    pub minute: Bcd,
    pub second: Bcd,
    pub sector: Bcd,
    pub peak: u16,
}

impl DaReport {
    pub const fn parse(result: &CdResult) -> DaReport {
        DaReport {
            stat: Status::from_bits_retain(result[0]),
            track: Bcd(result[1]),
            index: Bcd(result[2]),
            minute: Bcd(result[3]),
            second: Bcd(result[4]),
            sector: Bcd(result[5]),
            peak: u16::from_le_bytes([result[6], result[7]]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loc_round_trips_across_the_disc() {
        // 80 minute disc, minus the pregap.
        for lba in (0..(80 * 60 * 75 - 150)).step_by(7) {
            assert_eq!(Loc::enc(lba).dec(), lba, "lba {lba}");
        }
        let last = 80 * 60 * 75 - 151;
        assert_eq!(Loc::enc(last).dec(), last);
    }

    #[test]
    fn loc_encodes_the_pregap() {
        let loc = Loc::enc(0);
        assert_eq!(loc.params(), [0x00, 0x02, 0x00]);
        assert_eq!(Loc::enc(16).params(), [0x00, 0x02, 0x16]);
        assert_eq!(Loc::enc(4500 - 150).params(), [0x01, 0x00, 0x00]);
    }

    #[test]
    fn lead_in_positions_wrap() {
        let start = Loc::default();
        assert_eq!(start.dec(), 0u32.wrapping_sub(150));
        assert_eq!(Loc::enc(start.dec()), start);

        let late = Loc { minute: Bcd(0x00), second: Bcd(0x01), sector: Bcd(0x74) };
        assert_eq!(late.dec(), u32::MAX);
        assert_eq!(Loc::enc(u32::MAX), late);
    }

    #[test]
    fn da_report_splits_the_response() {
        let report = DaReport::parse(&[0x82, 0x01, 0x01, 0x03, 0x25, 0x41, 0x34, 0x12]);
        assert_eq!(report.stat, Status::PLAY | Status::STANDBY);
        assert_eq!(report.track, Bcd(0x01));
        assert_eq!(report.index, Bcd(0x01));
        assert_eq!((report.minute.dec(), report.second.dec(), report.sector.dec()), (3, 25, 41));
        assert_eq!(report.peak, 0x1234);
    }

    #[test]
    fn bcd_matches_decimal_digits() {
        assert_eq!(Bcd::enc(59), Bcd(0x59));
        assert_eq!(Bcd(0x74).dec(), 74);
    }

    #[test]
    fn file_rounds_to_whole_sectors() {
        let file = File { loc: Loc::enc(20), size: 2049 };
        assert_eq!(file.sectors(), 2);
        assert_eq!(file.size(), 4096);
        assert_eq!(File { loc: Loc::default(), size: 0 }.sectors(), 0);
    }

    #[test]
    fn command_flags_follow_each_opcode() {
        assert_eq!(Command::Nop.flags(), CommandFlags::STATUS);
        assert!(Command::Init.flags().contains(CommandFlags::BLOCKING));
        assert!(Command::ReadN.flags().contains(CommandFlags::SECTOR_BUFFER));
        assert!(!Command::ReadN.flags().contains(CommandFlags::BLOCKING));
        assert!(Command::Test.flags().is_empty());
        assert!(Command::Pause.flags().contains(CommandFlags::BLOCKING));
        for op in 0..=0x20 {
            if let Some(cmd) = Command::from_u8(op) {
                assert_eq!(cmd as u8, op);
            }
        }
    }

    #[test]
    fn region_replies_are_matched_by_prefix() {
        fn reply(text: &[u8]) -> CdResult {
            let mut result = [0; 8];
            let len = text.len().min(8);
            result[..len].copy_from_slice(&text[..len]);
            result
        }

        assert_eq!(Region::from_test_reply(&reply(b"for Japan")), Region::Japan);
        assert_eq!(Region::from_test_reply(&reply(b"for U/C")), Region::America);
        assert_eq!(Region::from_test_reply(&reply(b"for Europe")), Region::Europe);
        assert_eq!(Region::from_test_reply(&reply(b"for NETEU")), Region::Worldwide);
        assert_eq!(Region::from_test_reply(&reply(b"for US/AEP")), Region::Debug);
        assert_eq!(Region::from_test_reply(&[0x11, 0x10, 0, 0, 0, 0, 0, 0]), Region::Japan);
        assert_eq!(Region::from_test_reply(&reply(b"garbage")), Region::America);
    }

    #[test]
    fn irq_status_decodes_the_flag_field() {
        assert_eq!(IrqStatus::from_bits(0xE3), IrqStatus::Acknowledge);
        assert_eq!(IrqStatus::from_bits(6), IrqStatus::NoIrq);
    }
}
