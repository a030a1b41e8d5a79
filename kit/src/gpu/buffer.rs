//! One half of the double buffer: ordering table, packet area, and the
//! environment commands that select it.
//!
//! Word layout of a buffer region:
//!
//! ```text
//!   [0]            end-of-chain slot (OTC writes 0x00FFFFFF)
//!   [1 ..= n]      ordering table, slot i at word 1 + i
//!   [n + 1 ..]     packets: tag word followed by the packet body
//! ```
//!
//! Links are computed from word indices and only turned into 24-bit bus
//! addresses when they are stored.

use core::mem::{align_of, size_of};
use core::ptr;

use phal::{Dma, DmaReg, Hardware};

use super::prim::{DrawMode, Packet, Tag, TexPage, Word, command, gp1, op};

/// Largest packet the GPU command FIFO accepts in one go.
pub const MAX_PACKET_WORDS: usize = 16;

const CHCR_START: u32 = 1 << 24;

/// GP0 commands that place drawing in VRAM.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawEnv {
    pub top_left: Word,
    pub bottom_right: Word,
    pub offset: Word,
    pub mode: DrawMode,
}

impl DrawEnv {
    pub const fn new(x: u32, y: u32, w: u32, h: u32, ox: u32, oy: u32) -> DrawEnv {
        DrawEnv {
            top_left: command(op::DRAW_TOP_LEFT) | (x & 0x3FF) | (y & 0x1FF) << 10,
            bottom_right: command(op::DRAW_BOTTOM_RIGHT)
                | ((x + w - 1) & 0x3FF)
                | ((y + h - 1) & 0x1FF) << 10,
            offset: command(op::DRAW_OFFSET) | ((x + ox) & 0x7FF) | ((y + oy) & 0x7FF) << 11,
            mode: DrawMode::new(TexPage(0), false, true),
        }
    }
}

impl Default for DrawEnv {
    fn default() -> Self {
        DrawEnv::new(0, 0, 1, 1, 0, 0)
    }
}

// SAFETY: four command words.
unsafe impl Packet for DrawEnv {}

/// GP1 commands that select the displayed area and video timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayEnv {
    pub vram: Word,
    pub hspan: Word,
    pub vspan: Word,
    pub mode: Word,
}

impl DisplayEnv {
    pub const fn at(x: u32, y: u32) -> DisplayEnv {
        DisplayEnv {
            vram: command(gp1::DISPLAY_VRAM) | (x & 0x3FF) | (y & 0x1FF) << 10,
            hspan: command(gp1::DISPLAY_HSPAN),
            vspan: command(gp1::DISPLAY_VSPAN),
            mode: command(gp1::DISPLAY_MODE),
        }
    }

    pub const fn words(&self) -> [Word; 4] {
        [self.vram, self.hspan, self.vspan, self.mode]
    }
}

impl Default for DisplayEnv {
    fn default() -> Self {
        DisplayEnv::at(0, 0)
    }
}

pub struct Buffer {
    ram: *mut Word,
    len: usize,
    ot_size: usize,
    /// Word index of the next packet's tag.
    prip: usize,
    pub(crate) draw: DrawEnv,
    pub(crate) display: DisplayEnv,
}

impl Buffer {
    pub const fn empty() -> Self {
        Self {
            ram: ptr::null_mut(),
            len: 0,
            ot_size: 0,
            prip: 0,
            draw: DrawEnv::new(0, 0, 1, 1, 0, 0),
            display: DisplayEnv::at(0, 0),
        }
    }

    /// Take `len` words at `ram`. The environments are kept.
    pub(crate) fn assign(&mut self, ram: *mut Word, len: usize, ot_size: usize) {
        self.ram = ram;
        self.len = len;
        self.ot_size = ot_size;
        self.prip = 1 + ot_size;
    }

    pub fn is_assigned(&self) -> bool {
        !self.ram.is_null()
    }

    pub fn ot_size(&self) -> usize {
        self.ot_size
    }

    /// Words of packet data written since the last re-chain.
    pub fn used(&self) -> usize {
        self.prip - (1 + self.ot_size)
    }

    pub fn draw_env(&self) -> &DrawEnv {
        &self.draw
    }

    pub fn display_env(&self) -> &DisplayEnv {
        &self.display
    }

    /// 24-bit bus address of word `index`.
    #[inline]
    fn bus(&self, index: usize) -> u32 {
        (self.ram as usize).wrapping_add(index * 4) as u32 & 0x00FF_FFFF
    }

    /// Host address of word `index`, as handed to a DMA channel.
    #[inline]
    pub(crate) fn host(&self, index: usize) -> usize {
        (self.ram as usize).wrapping_add(index * 4)
    }

    /// Word index a stored link points at.
    #[inline]
    pub fn index_of(&self, tag: Tag) -> usize {
        (tag.addr().wrapping_sub(self.bus(0)) & 0x00FF_FFFF) as usize / 4
    }

    /// Raw word `index` of the region.
    pub fn word(&self, index: usize) -> Word {
        assert!(index < self.len, "buffer word {index} out of range");
        // SAFETY: in bounds; DMA may write these words, hence volatile.
        unsafe { self.ram.add(index).read_volatile() }
    }

    fn set_word(&mut self, index: usize, value: Word) {
        assert!(index < self.len, "buffer word {index} out of range");
        // SAFETY: in bounds.
        unsafe { self.ram.add(index).write_volatile(value) }
    }

    /// Head tag of ordering-table slot `slot`.
    pub fn ot(&self, slot: usize) -> Tag {
        Tag(self.word(1 + slot))
    }

    /// Word index of the slot the GPU starts from (the last one).
    pub(crate) fn kick_index(&self) -> usize {
        self.ot_size
    }

    /// Reset the packet cursor and have the OTC channel link every slot to
    /// the one below it, slot 0 to the end marker.
    pub(crate) fn init<H: Hardware>(&mut self, hw: &mut H) {
        self.prip = 1 + self.ot_size;

        hw.dma_set_address(Dma::Otc, self.host(self.kick_index()));
        hw.dma_write(Dma::Otc, DmaReg::Bcr, ((self.ot_size + 1) & 0xFFFF) as u32);
        hw.dma_write(Dma::Otc, DmaReg::Chcr, 0x1100_0002);
        while hw.dma_read(Dma::Otc, DmaReg::Chcr) & CHCR_START != 0 {
            hw.relax();
        }
    }

    /// Insert a packet at the head of slot `slot` and return it,
    /// default-initialised.
    ///
    /// The new tag takes over the slot's previous link and the slot now
    /// points at the new tag, so within one slot the most recently
    /// allocated packet is reached first.
    pub fn alloc_packet<T: Packet>(&mut self, slot: usize) -> &mut T {
        const {
            assert!(size_of::<T>() % 4 == 0, "packet size must be whole words");
            assert!(size_of::<T>() / 4 <= MAX_PACKET_WORDS, "packet type too big");
            assert!(align_of::<T>() <= 4, "packet alignment must not exceed a word");
        };
        let words = size_of::<T>() / 4;

        assert!(slot < self.ot_size, "OT slot {slot} out of range");
        let tag = self.prip;
        if tag + 1 + words > self.len {
            panic!("GPU packet buffer overflow");
        }

        let head = self.ot(slot);
        self.set_word(tag, Tag::new(head.addr(), words).0);
        self.set_word(1 + slot, Tag::new(self.bus(tag), 0).0);
        self.prip = tag + 1 + words;

        // SAFETY: `tag + 1 .. tag + 1 + words` is inside the region,
        // word-aligned, and not handed out again until the next `init`.
        unsafe {
            let packet = self.ram.add(tag + 1).cast::<T>();
            packet.write(T::default());
            &mut *packet
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::prim::{PolyF3, PolyG4};
    use crate::sim::Sim;

    fn buffer(words: usize, ot_size: usize) -> (Buffer, Sim) {
        let ram: &'static mut [Word] = Box::leak(vec![0; words].into_boxed_slice());
        let mut buffer = Buffer::empty();
        buffer.assign(ram.as_mut_ptr(), ram.len(), ot_size);
        let mut sim = Sim::new();
        buffer.init(&mut sim);
        (buffer, sim)
    }

    #[test]
    fn otc_links_every_slot_down_to_the_end_marker() {
        let (buffer, _) = buffer(64, 8);
        assert!(Tag(buffer.word(0)).is_end());
        for slot in 0..8 {
            let tag = buffer.ot(slot);
            assert_eq!(tag.words(), 0);
            assert_eq!(buffer.index_of(tag), slot);
        }
        assert_eq!(buffer.used(), 0);
    }

    #[test]
    fn packets_in_one_slot_link_in_reverse() {
        let (mut buffer, _) = buffer(64, 4);
        let first = 1 + 4;
        buffer.alloc_packet::<PolyF3>(2);
        let second = first + 1 + 4;
        buffer.alloc_packet::<PolyF3>(2);

        let head = buffer.ot(2);
        assert_eq!(buffer.index_of(head), second);
        assert_eq!(head.words(), 0);

        let second_tag = Tag(buffer.word(second));
        assert_eq!(buffer.index_of(second_tag), first);
        assert_eq!(second_tag.words(), 4);

        // The oldest packet continues to the next slot down.
        let first_tag = Tag(buffer.word(first));
        assert_eq!(buffer.index_of(first_tag), 1 + 1);
        assert_eq!(buffer.word(first + 1), 0x2000_0000);
        assert_eq!(buffer.used(), 10);
    }

    #[test]
    fn returned_packet_lives_after_its_tag() {
        let (mut buffer, _) = buffer(64, 2);
        let packet = buffer.alloc_packet::<PolyG4>(1);
        packet.set_semi(true);
        let at = packet as *mut PolyG4 as usize;
        assert_eq!(at, buffer.host(1 + 2 + 1));
        assert_eq!(buffer.word(4), 0x3A00_0000);
    }

    #[test]
    #[should_panic(expected = "GPU packet buffer overflow")]
    fn running_out_of_packet_space_is_fatal() {
        let (mut buffer, _) = buffer(12, 4);
        buffer.alloc_packet::<PolyF3>(0);
        buffer.alloc_packet::<PolyF3>(0);
    }

    #[test]
    fn draw_env_encodes_area_and_offset() {
        let env = DrawEnv::new(0, 240, 320, 240, 160, 120);
        assert_eq!(env.top_left, 0xE300_0000 | 240 << 10);
        assert_eq!(env.bottom_right, 0xE400_0000 | 319 | 479 << 10);
        assert_eq!(env.offset, 0xE500_0000 | 160 | 360 << 11);
        assert_eq!(env.mode.mode, 0xE100_0400);
    }
}
