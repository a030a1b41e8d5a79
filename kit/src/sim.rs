//! Simulated register file for host tests.
//!
//! DMA transfers complete the moment their start bit is written and really
//! touch host memory: OTC writes its chain, GPU linked-list mode walks an
//! ordering table into the GP0 log, CD copies the loaded sector. The CD
//! drive answers commands with scripted interrupt events that [`Sim::step`]
//! raises one at a time, the way the controller holds one interrupt until
//! it is acknowledged.

use std::collections::{HashMap, VecDeque};

use bit_field::BitField;
use phal::{
    CdPort, Dma, DmaControl, DmaReg, DuartReg, Hardware, Irq, IrqReg, MemCtrl, SpuReg, Timer,
    TimerReg,
};

use crate::cd::{Bcd, IrqStatus, Loc, SECTOR_SIZE};

/// Things test callbacks count.
#[derive(Debug, Default)]
pub struct Counters {
    pub vblank_callbacks: usize,
    pub gpu_dma_callbacks: usize,
    pub cd_dma_callbacks: usize,
    pub flip_callbacks: usize,
    pub queue_callbacks: usize,
    pub timer_callbacks: usize,
    pub cd_complete: Vec<IrqStatus>,
    pub cd_ready: Vec<IrqStatus>,
    pub cd_end: Vec<IrqStatus>,
    pub reads: Vec<(usize, usize)>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Channel {
    madr: usize,
    bcr: u32,
    chcr: u32,
}

const CHCR_START: u32 = 1 << 24;
const DICR_MASTER_ENABLE: usize = 23;

/// Drive status byte when idle with the lid shut.
const STAT_IDLE: u8 = 0x02;
const STAT_READ: u8 = 0x20;

const OP_SETLOC: u8 = 0x02;
const OP_PLAY: u8 = 0x03;
const OP_READN: u8 = 0x06;
const OP_PAUSE: u8 = 0x09;
const OP_TEST: u8 = 0x19;
const OP_READS: u8 = 0x1B;
/// Opcodes answered with an acknowledge and then a completion.
const TWO_PHASE: [u8; 9] = [0x07, 0x08, 0x0A, 0x12, 0x15, 0x16, 0x1A, 0x1D, 0x1E];

const INT_READY: u8 = 1;
const INT_COMPLETE: u8 = 2;
const INT_ACK: u8 = 3;
const INT_END: u8 = 4;
const INT_ERROR: u8 = 5;

/// Scripted CD drive behind the four banked controller ports.
pub struct Drive {
    bank: u8,
    enable: u8,
    flag: u8,
    params: Vec<u8>,
    response: VecDeque<u8>,
    data: VecDeque<u8>,
    events: VecDeque<(u8, Vec<u8>)>,
    loc: u32,
    /// Next sector a running read will deliver.
    reading: Option<u32>,
    /// Sector behind the most recent data-ready.
    pending: Option<u32>,

    /// Sector contents by logical sector number; missing sectors read as
    /// zeros.
    pub disc: HashMap<u32, Vec<u8>>,
    pub shell_open: bool,
    /// Reply to `Test 0x22`.
    pub region_reply: Vec<u8>,
    /// Every command written, with its parameters.
    pub commands: Vec<(u8, Vec<u8>)>,
}

impl Drive {
    fn new() -> Self {
        Self {
            bank: 0,
            enable: 0x1F,
            flag: 0,
            params: Vec::new(),
            response: VecDeque::new(),
            data: VecDeque::new(),
            events: VecDeque::new(),
            loc: 0,
            reading: None,
            pending: None,
            disc: HashMap::new(),
            shell_open: false,
            region_reply: b"for U/C".to_vec(),
            commands: Vec::new(),
        }
    }

    /// Queue an interrupt the drive raises unprompted.
    pub fn push_event(&mut self, cause: u8, response: &[u8]) {
        self.events.push_back((cause, response.to_vec()));
    }

    fn stat(&self) -> u8 {
        if self.reading.is_some() { STAT_IDLE | STAT_READ } else { STAT_IDLE }
    }

    fn read(&mut self, port: CdPort) -> u8 {
        match port {
            CdPort::Status => {
                self.bank
                    | 0x18
                    | (!self.response.is_empty() as u8) << 5
                    | (!self.data.is_empty() as u8) << 6
            }
            CdPort::Command => self.response.pop_front().unwrap_or(0),
            CdPort::Data => self.data.pop_front().unwrap_or(0),
            CdPort::Irq => {
                if self.bank & 1 != 0 {
                    self.flag | 0xE0
                } else {
                    self.enable | 0xE0
                }
            }
        }
    }

    fn write(&mut self, port: CdPort, value: u8) {
        match (port, self.bank) {
            (CdPort::Status, _) => self.bank = value & 3,
            (CdPort::Command, 0) => self.execute(value),
            (CdPort::Data, 0) => self.params.push(value),
            (CdPort::Data, 1) => self.enable = value & 0x1F,
            (CdPort::Irq, 0) => {
                if value & 0x80 != 0 {
                    let sector = self.pending.and_then(|lba| self.disc.get(&lba).cloned());
                    self.data = sector.unwrap_or_else(|| vec![0; SECTOR_SIZE]).into();
                } else {
                    self.data.clear();
                }
            }
            (CdPort::Irq, 1) => {
                if value & 0x40 != 0 {
                    self.params.clear();
                }
                self.flag &= !(value & 0x1F);
            }
            _ => {}
        }
    }

    fn execute(&mut self, opcode: u8) {
        let params = core::mem::take(&mut self.params);
        self.commands.push((opcode, params.clone()));

        let stat = self.stat();
        if self.shell_open && opcode != OP_TEST {
            self.events.push_back((INT_ERROR, vec![stat | 0x10 | 0x01, 0x80]));
            return;
        }

        match opcode {
            OP_SETLOC => {
                if let [minute, second, sector] = params[..] {
                    self.loc = Loc { minute: Bcd(minute), second: Bcd(second), sector: Bcd(sector) }.dec();
                }
                self.events.push_back((INT_ACK, vec![stat]));
            }
            OP_READN | OP_READS => {
                self.reading = Some(self.loc);
                self.events.push_back((INT_ACK, vec![stat | STAT_READ]));
            }
            OP_PAUSE => {
                self.events.push_back((INT_ACK, vec![stat]));
                self.reading = None;
                self.pending = None;
                self.events.push_back((INT_COMPLETE, vec![self.stat()]));
            }
            OP_TEST => self.events.push_back((INT_ACK, self.region_reply.clone())),
            OP_PLAY => {
                self.events.push_back((INT_ACK, vec![stat]));
                self.events.push_back((INT_END, vec![stat]));
            }
            op if TWO_PHASE.contains(&op) => {
                self.events.push_back((INT_ACK, vec![stat]));
                self.events.push_back((INT_COMPLETE, vec![stat]));
            }
            _ => self.events.push_back((INT_ACK, vec![stat])),
        }
    }

    /// Raise the next interrupt if none is outstanding. A running read
    /// produces its next data-ready once everything else has been seen.
    fn step(&mut self) -> bool {
        if self.flag != 0 {
            return false;
        }
        if self.events.is_empty() {
            if let Some(lba) = self.reading {
                self.pending = Some(lba);
                self.reading = Some(lba + 1);
                self.events.push_back((INT_READY, vec![self.stat()]));
            }
        }
        let Some((cause, response)) = self.events.pop_front() else {
            return false;
        };
        self.flag = cause;
        self.response = response.into();
        self.flag & self.enable != 0
    }
}

pub struct Sim {
    pub irq_stat: u16,
    pub irq_mask: u16,
    pub dpcr: u32,
    pub dicr: u32,
    channels: [Channel; 7],
    pub interrupts: bool,

    pub mem_ctrl: [u32; 3],
    /// Root counter registers, `[counter][Value, Mode, Target]`.
    pub timers: [[u16; 3]; 3],
    spu: [u16; 20],
    /// Keep SPUSTAT at zero whatever the control register says.
    pub spu_stuck: bool,

    pub gp0: Vec<u32>,
    pub gp1: Vec<u32>,
    pub pal: bool,
    /// Polls between vertical blanks; zero for none.
    pub vblank_period: u32,
    polls: u32,

    /// Successive answers of `pad_pressed`.
    pub pad: VecDeque<u16>,
    pub tty: Vec<u8>,

    pub cd: Drive,
    pub counters: Counters,
}

impl Sim {
    pub fn new() -> Self {
        Self {
            irq_stat: 0,
            irq_mask: 0,
            dpcr: 0,
            dicr: 0,
            channels: [Channel::default(); 7],
            interrupts: false,
            mem_ctrl: [0; 3],
            timers: [[0; 3]; 3],
            spu: [0; 20],
            spu_stuck: false,
            gp0: Vec::new(),
            gp1: Vec::new(),
            pal: false,
            vblank_period: 64,
            polls: 0,
            pad: VecDeque::new(),
            tty: Vec::new(),
            cd: Drive::new(),
            counters: Counters::default(),
        }
    }

    /// Raise the next CD interrupt, if any.
    pub fn step(&mut self) -> bool {
        let raised = self.cd.step();
        if raised {
            self.irq_stat |= Irq::Cdrom.mask();
        }
        raised
    }

    /// Flag a finished transfer on `channel` the way the DMA controller
    /// does.
    pub fn raise_dma(&mut self, channel: Dma) {
        let index = channel.index();
        if self.dicr.get_bit(DICR_MASTER_ENABLE) && self.dicr.get_bit(16 + index) {
            self.dicr.set_bit(24 + index, true);
            self.irq_stat |= Irq::Dma.mask();
        }
    }

    /// Full host address last given to `channel`.
    pub fn dma_madr(&self, channel: Dma) -> usize {
        self.channels[channel.index()].madr
    }

    pub fn spu(&self, reg: SpuReg) -> u16 {
        self.spu[reg as usize]
    }

    fn run_dma(&mut self, channel: Dma) {
        let Channel { madr, bcr, chcr } = self.channels[channel.index()];
        match channel {
            Dma::Otc => {
                let count = match bcr & 0xFFFF {
                    0 => 0x1_0000,
                    n => n as usize,
                };
                let mut addr = madr;
                for i in 0..count {
                    let link = if i == count - 1 { 0x00FF_FFFF } else { (addr - 4) as u32 & 0x00FF_FFFF };
                    // SAFETY: tests point OTC at leaked buffers sized for the chain.
                    unsafe { (addr as *mut u32).write(link) };
                    addr = addr.wrapping_sub(4);
                }
            }
            Dma::Gpu if chcr & 0x600 == 0x400 => self.walk_ordering_table(madr),
            Dma::Gpu if chcr & 1 != 0 => {
                let words = (bcr >> 16) as usize * (bcr & 0xFFFF) as usize;
                for i in 0..words {
                    // SAFETY: the draw queue only submits caller-owned images.
                    self.gp0.push(unsafe { (madr as *const u32).add(i).read() });
                }
            }
            Dma::Cdrom => {
                let words = (bcr & 0xFFFF) as usize * ((bcr >> 16) as usize).max(1);
                for i in 0..words {
                    let mut bytes = [0; 4];
                    for byte in bytes.iter_mut() {
                        *byte = self.cd.data.pop_front().unwrap_or(0);
                    }
                    // SAFETY: `cd_get_sector` hands over a slice of `words` words.
                    unsafe { (madr as *mut u32).add(i).write(u32::from_ne_bytes(bytes)) };
                }
            }
            _ => {}
        }

        self.channels[channel.index()].chcr &= !CHCR_START;
        self.raise_dma(channel);
    }

    /// Send every packet of the chain starting at `start` to GP0.
    fn walk_ordering_table(&mut self, start: usize) {
        let mut addr = start;
        loop {
            // SAFETY: links only ever point into the buffer `start` is in.
            let tag = unsafe { (addr as *const u32).read() };
            for i in 0..(tag >> 24) as usize {
                self.gp0.push(unsafe { (addr as *const u32).add(1 + i).read() });
            }
            let next = tag & 0x00FF_FFFF;
            if next == 0x00FF_FFFF {
                break;
            }
            addr = rebase(start, next);
        }
    }
}

/// Host address of 24-bit bus address `bus`, taking the upper bits from
/// nearby host address `base`.
fn rebase(base: usize, bus: u32) -> usize {
    let delta = bus.wrapping_sub(base as u32) & 0x00FF_FFFF;
    if delta >= 0x0080_0000 {
        base - (0x0100_0000 - delta) as usize
    } else {
        base + delta as usize
    }
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

impl Hardware for Sim {
    fn cd_read(&mut self, port: CdPort) -> u8 {
        self.cd.read(port)
    }

    fn cd_write(&mut self, port: CdPort, value: u8) {
        self.cd.write(port, value);
    }

    fn gp0_write(&mut self, word: u32) {
        self.gp0.push(word);
    }

    fn gp1_write(&mut self, word: u32) {
        self.gp1.push(word);
    }

    fn gpu_status(&mut self) -> u32 {
        (1 << 26) | (1 << 28) | (self.pal as u32) << 20
    }

    fn dma_read(&mut self, channel: Dma, reg: DmaReg) -> u32 {
        let ch = &self.channels[channel.index()];
        match reg {
            DmaReg::Madr => ch.madr as u32 & 0x00FF_FFFF,
            DmaReg::Bcr => ch.bcr,
            DmaReg::Chcr => ch.chcr,
        }
    }

    fn dma_write(&mut self, channel: Dma, reg: DmaReg, value: u32) {
        let ch = &mut self.channels[channel.index()];
        match reg {
            DmaReg::Madr => ch.madr = value as usize,
            DmaReg::Bcr => ch.bcr = value,
            DmaReg::Chcr => {
                ch.chcr = value;
                if value & CHCR_START != 0 {
                    self.run_dma(channel);
                }
            }
        }
    }

    fn dma_set_address(&mut self, channel: Dma, addr: usize) {
        self.channels[channel.index()].madr = addr;
    }

    fn dma_control_read(&mut self, reg: DmaControl) -> u32 {
        match reg {
            DmaControl::Dpcr => self.dpcr,
            DmaControl::Dicr => self.dicr,
        }
    }

    fn dma_control_write(&mut self, reg: DmaControl, value: u32) {
        match reg {
            DmaControl::Dpcr => self.dpcr = value,
            DmaControl::Dicr => {
                let flags = self.dicr & 0x7F00_0000 & !(value & 0x7F00_0000);
                self.dicr = (value & 0x00FF_FFFF) | flags;
            }
        }
    }

    fn irq_read(&mut self, reg: IrqReg) -> u16 {
        match reg {
            IrqReg::Stat => self.irq_stat,
            IrqReg::Mask => self.irq_mask,
        }
    }

    fn irq_write(&mut self, reg: IrqReg, value: u16) {
        match reg {
            IrqReg::Stat => self.irq_stat &= value,
            IrqReg::Mask => self.irq_mask = value,
        }
    }

    fn timer_write(&mut self, timer: Timer, reg: TimerReg, value: u16) {
        self.timers[timer as usize][reg as usize] = value;
    }

    fn mem_ctrl_write(&mut self, reg: MemCtrl, value: u32) {
        self.mem_ctrl[reg as usize] = value;
    }

    fn spu_read(&mut self, reg: SpuReg) -> u16 {
        match reg {
            SpuReg::Stat if self.spu_stuck => 0,
            SpuReg::Stat => self.spu[SpuReg::Ctrl as usize] & 0x3F,
            _ => self.spu[reg as usize],
        }
    }

    fn spu_write(&mut self, reg: SpuReg, value: u16) {
        self.spu[reg as usize] = value;
    }

    fn duart_read(&mut self, reg: DuartReg) -> u8 {
        match reg {
            DuartReg::Sra => 0x0C,
            _ => 0,
        }
    }

    fn duart_write(&mut self, reg: DuartReg, value: u8) {
        if reg == DuartReg::Hra {
            self.tty.push(value);
        }
    }

    fn pad_pressed(&mut self) -> u16 {
        self.pad.pop_front().unwrap_or(0)
    }

    fn interrupts_enabled(&mut self) -> bool {
        self.interrupts
    }

    fn disable_interrupts(&mut self) -> bool {
        core::mem::replace(&mut self.interrupts, false)
    }

    fn restore_interrupts(&mut self, was_enabled: bool) {
        if was_enabled {
            self.interrupts = true;
        }
    }

    fn relax(&mut self) {}

    fn poll_interrupt(&mut self) -> bool {
        self.polls = self.polls.wrapping_add(1);
        if self.vblank_period != 0 && self.polls % self.vblank_period == 0 {
            self.irq_stat |= Irq::VBlank.mask();
        }
        self.step();
        self.irq_stat & self.irq_mask != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dicr_flags_clear_only_where_one_is_written() {
        let mut sim = Sim::new();
        sim.dicr = 0x0680_0000 | 0x00FF_0000;
        sim.dma_control_write(DmaControl::Dicr, 0x0080_0000 | 0x0400_0000);
        assert_eq!(sim.dicr, 0x0280_0000);
    }

    #[test]
    fn rebase_follows_links_on_either_side() {
        assert_eq!(rebase(0x7F00_1000, 0x0000_1010), 0x7F00_1010);
        assert_eq!(rebase(0x7F00_1000, 0x0000_0FF0), 0x7F00_0FF0);
        assert_eq!(rebase(0x7F00_0004, 0x00FF_FFFC), 0x7EFF_FFFC);
    }
}
