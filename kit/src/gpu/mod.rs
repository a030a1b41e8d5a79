//! GPU driver: double-buffered ordering tables, display timing, draw queue.
//!
//! The caller hands [`System::gpu_set_buffer`] one word array; it is split
//! into two [`Buffer`]s. Packets are allocated into the current buffer
//! while the GPU works through the other one. [`System::gpu_flip`] shows
//! the frame drawn last time, sends the current buffer's drawing
//! environment, queues its ordering table for DMA, then switches to the
//! other buffer and re-chains its table.
//!
//! ```text
//!   frame n:   alloc ──► buffer 0          GPU ◄── OT DMA ── buffer 1
//!   flip:      display 0, draw env 0, queue OT 0, current = 1, OTC 1
//!   frame n+1: alloc ──► buffer 1          GPU ◄── OT DMA ── buffer 0
//! ```

mod buffer;
mod draw_queue;
pub mod prim;

pub use buffer::{Buffer, DisplayEnv, DrawEnv, MAX_PACKET_WORDS};
pub use draw_queue::{DrawOp, image_bcr};

use core::sync::atomic::{AtomicU32, Ordering};

use bit_field::BitField;
use phal::{Dma, DmaControl, DmaReg, Hardware, Irq, Timer, TimerReg, dpcr_set};

use self::draw_queue::{DrawQueue, draw_complete, submit};
use self::prim::{Packet, Word, command, gp1, op, words};
use crate::sync;
use crate::system::System;
use crate::traps::Callback;

/// GPUSTAT bits.
const STAT_PAL: usize = 20;
const STAT_CMD_READY: usize = 26;
const STAT_DMA_READY: usize = 28;

/// DMA `chcr` start bit.
pub(crate) const CHCR_START: u32 = 1 << 24;

/// Horizontal display centre in GPU clock ticks.
const HSPAN_CENTER: u32 = 0x760;
/// Middle scanline of a normal TV set.
const VSPAN_CENTER_PAL: u32 = 0xA3;
const VSPAN_CENTER_NTSC: u32 = 0x88;

// Port helpers. Plain spins on the status register: they run from queue
// handlers inside the DMA interrupt too.

pub(crate) fn cmd_sync<H: Hardware>(hw: &mut H) {
    while !hw.gpu_status().get_bit(STAT_CMD_READY) {
        hw.relax();
    }
}

pub(crate) fn data_sync<H: Hardware>(hw: &mut H) {
    while !hw.gpu_status().get_bit(STAT_DMA_READY) {
        hw.relax();
    }
}

pub(crate) fn chcr_sync<H: Hardware>(hw: &mut H) {
    while hw.dma_read(Dma::Gpu, DmaReg::Chcr) & CHCR_START != 0 {
        hw.relax();
    }
}

pub(crate) fn gp0_cmd<H: Hardware>(hw: &mut H, word: Word) {
    cmd_sync(hw);
    hw.gp0_write(word);
}

pub(crate) fn gp0_data<H: Hardware>(hw: &mut H, word: Word) {
    data_sync(hw);
    hw.gp0_write(word);
}

/// Send a whole packet through GP0, word by word.
pub(crate) fn gp0_packet<H: Hardware, T: Packet>(hw: &mut H, packet: &T) {
    cmd_sync(hw);
    for &word in words(packet) {
        data_sync(hw);
        hw.gp0_write(word);
    }
    cmd_sync(hw);
}

/// GPU driver state, owned by [`System`].
pub struct Gpu<H: Hardware> {
    pal: bool,
    buffers: [Buffer; 2],
    /// Index of the buffer packets are allocated into.
    current: usize,

    flip: Option<Callback<H>>,
    vblank: Option<Callback<H>>,
    queue_done: Option<Callback<H>>,

    vblank_count: AtomicU32,
    queue: DrawQueue<H>,
}

impl<H: Hardware> Gpu<H> {
    pub const fn new() -> Self {
        Self {
            pal: false,
            buffers: [Buffer::empty(), Buffer::empty()],
            current: 0,
            flip: None,
            vblank: None,
            queue_done: None,
            vblank_count: AtomicU32::new(0),
            queue: DrawQueue::new(),
        }
    }
}

impl<H: Hardware> Default for Gpu<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// [`Irq::VBlank`] callback.
fn vblank_interrupt<H: Hardware>(sys: &mut System<H>) {
    let count = sys.gpu.vblank_count.load(Ordering::Relaxed);
    sys.gpu.vblank_count.store(count.wrapping_add(1), Ordering::Release);
    if let Some(callback) = sys.gpu.vblank {
        callback(sys);
    }
}

impl<H: Hardware> System<H> {
    /// Reset the GPU with the display off and VRAM cleared to black.
    pub(crate) fn gpu_init(&mut self) {
        let irq_was_enabled = self.hw.disable_interrupts();

        self.gpu.pal = self.hw.gpu_status().get_bit(STAT_PAL);
        self.hw.gp1_write(command(gp1::DISPLAY_ENABLE) | 1);

        self.set_irq(Irq::VBlank, Some(vblank_interrupt::<H>));
        self.set_dma(Dma::Gpu, Some(draw_complete::<H>));

        let dpcr = self.hw.dma_control_read(DmaControl::Dpcr);
        let dpcr = dpcr_set(dpcr_set(dpcr, Dma::Gpu, 3), Dma::Otc, 3);
        self.hw.dma_control_write(DmaControl::Dpcr, dpcr);
        self.hw.dma_write(Dma::Gpu, DmaReg::Chcr, 0x201);
        self.hw.dma_write(Dma::Otc, DmaReg::Chcr, 0x200);

        self.hw.gp1_write(command(gp1::RESET));
        self.hw.gp1_write(command(gp1::FLUSH));

        self.hw.timer_write(Timer::Dot, TimerReg::Mode, 0x0500);
        self.hw.timer_write(Timer::HBlank, TimerReg::Mode, 0x0500);

        for x in (0..1024u32).step_by(512) {
            for y in (0..512u32).step_by(256) {
                gp0_cmd(&mut self.hw, command(op::FILL_VRAM));
                gp0_data(&mut self.hw, x | y << 16);
                gp0_data(&mut self.hw, 512 | 256 << 16);
            }
        }

        self.hw.restore_interrupts(irq_was_enabled);
        plog::info!("GPU initialised ({})", if self.gpu.pal { "PAL" } else { "NTSC" });
    }

    /// Split `ram` into the two packet buffers, each starting with an
    /// `ot_size`-slot ordering table, and start allocating into the first.
    pub fn gpu_set_buffer(&mut self, ram: &'static mut [Word], ot_size: usize) {
        let half = ram.len() / 2;
        assert!(ot_size > 0 && ot_size < half, "GPU buffer too small for its OT");

        let (first, second) = ram.split_at_mut(half);
        sync::without_interrupts(self, |sys| {
            sys.gpu.buffers[0].assign(first.as_mut_ptr(), first.len(), ot_size);
            sys.gpu.buffers[1].assign(second.as_mut_ptr(), second.len(), ot_size);
            sys.gpu.current = 0;
        });
        self.gpu.buffers[0].init(&mut self.hw);
    }

    /// Set the framebuffer geometry.
    ///
    /// Buffer 0 draws at `x0`, `y0` while `x1`, `y1` is displayed; buffer 1
    /// the other way round. Widths other than 256, 320, 368, 512 and 640
    /// are fatal. Heights above 256 select interlaced mode. Takes effect on
    /// the next [`System::gpu_flip`].
    #[allow(clippy::too_many_arguments)]
    pub fn gpu_set_screen(
        &mut self,
        w: u32,
        h: u32,
        ox: u32,
        oy: u32,
        x0: u32,
        y0: u32,
        x1: u32,
        y1: u32,
    ) {
        let (width, hdot) = match w {
            256 => (0, 10),
            320 => (1, 8),
            368 => (1 << 6, 7),
            512 => (2, 5),
            640 => (3, 4),
            _ => panic!("Invalid width for SetScreen"),
        };

        let mut mode = command(gp1::DISPLAY_MODE) | width;
        if self.gpu.pal {
            mode |= 1 << 3;
        }
        let mut lines = h;
        if h > 256 {
            mode |= (1 << 2) | (1 << 5);
            lines /= 2;
        }

        let half_width = w * hdot / 2;
        let hspan = command(gp1::DISPLAY_HSPAN)
            | (HSPAN_CENTER - half_width)
            | (HSPAN_CENTER + half_width) << 12;

        let center = if self.gpu.pal { VSPAN_CENTER_PAL } else { VSPAN_CENTER_NTSC };
        let vspan = command(gp1::DISPLAY_VSPAN)
            | (center - lines / 2)
            | (center + lines / 2) << 10;

        let areas = [((x0, y0), (x1, y1)), ((x1, y1), (x0, y0))];
        sync::without_interrupts(self, |sys| {
            for (buffer, ((dx, dy), (sx, sy))) in sys.gpu.buffers.iter_mut().zip(areas) {
                buffer.draw = DrawEnv::new(dx, dy, w, h, ox, oy);
                buffer.display = DisplayEnv { hspan, vspan, mode, ..DisplayEnv::at(sx, sy) };
            }
        });

        if self.gpu.current != 0 {
            self.gpu.current = 0;
            if self.gpu.buffers[0].is_assigned() {
                self.gpu.buffers[0].init(&mut self.hw);
            }
        }
    }

    /// Present the current buffer and switch to the other one.
    pub fn gpu_flip(&mut self) {
        let current = self.gpu.current;
        assert!(self.gpu.buffers[current].is_assigned(), "GPU buffer not set");

        self.gpu_queue_sync();
        self.gpu_vblank_sync();

        for word in self.gpu.buffers[current].display.words() {
            self.hw.gp1_write(word);
        }
        self.hw.gp1_write(command(gp1::DISPLAY_ENABLE));

        if let Some(callback) = self.gpu.flip {
            callback(self);
        }

        // Not safe to send from inside an ordering table.
        let draw = self.gpu.buffers[current].draw;
        gp0_packet(&mut self.hw, &draw);

        let buffer = &self.gpu.buffers[current];
        let addr = buffer.host(buffer.kick_index());
        DrawQueue::<H>::enqueue(self, submit::<H>, DrawOp::OrderingTable { addr });

        let next = current ^ 1;
        sync::without_interrupts(self, |sys| sys.gpu.current = next);
        self.gpu.buffers[next].init(&mut self.hw);
    }

    /// Wait for the next vertical blank. Logs `GPU vsync timeout` and
    /// returns `false` if none arrives.
    pub fn gpu_vblank_sync(&mut self) -> bool {
        let start = self.gpu.vblank_count.load(Ordering::Acquire);
        self.wait_for("GPU vsync", |sys| {
            sys.gpu.vblank_count.load(Ordering::Acquire) != start
        })
    }

    /// Wait for the draw queue to drain and the GPU to accept commands
    /// again. Only the status wait is bounded.
    pub fn gpu_queue_sync(&mut self) -> bool {
        DrawQueue::<H>::sync(self);
        self.wait_for("GPU status sync", |sys| {
            let status = sys.hw.gpu_status();
            sys.hw.dma_read(Dma::Gpu, DmaReg::Chcr) & CHCR_START == 0
                && status.get_bit(STAT_CMD_READY)
                && status.get_bit(STAT_DMA_READY)
        })
    }

    /// Drop every queued draw operation, abandoning the running one.
    pub fn gpu_queue_reset(&mut self) {
        sync::without_interrupts(self, |sys| sys.gpu.queue.reset());
    }

    /// Allocate a packet in slot `slot` of the current ordering table.
    ///
    /// Higher slots are drawn first.
    pub fn gpu_alloc_packet<T: Packet>(&mut self, slot: usize) -> &mut T {
        let current = self.gpu.current;
        self.gpu.buffers[current].alloc_packet(slot)
    }

    /// Index of the buffer packets currently go into.
    pub fn gpu_current_buffer(&self) -> usize {
        self.gpu.current
    }

    pub fn gpu_buffer(&self, index: usize) -> &Buffer {
        &self.gpu.buffers[index]
    }

    pub fn is_pal(&self) -> bool {
        self.gpu.pal
    }

    /// Vertical blanks seen since start-up.
    pub fn vblank_count(&self) -> u32 {
        self.gpu.vblank_count.load(Ordering::Acquire)
    }

    /// Runs during [`System::gpu_flip`], after the new frame is displayed.
    pub fn set_flip_callback(&mut self, callback: Option<Callback<H>>) -> Option<Callback<H>> {
        core::mem::replace(&mut self.gpu.flip, callback)
    }

    pub fn flip_callback(&self) -> Option<Callback<H>> {
        self.gpu.flip
    }

    /// Runs from the vertical blank interrupt.
    pub fn set_vblank_callback(&mut self, callback: Option<Callback<H>>) -> Option<Callback<H>> {
        sync::without_interrupts(self, |sys| core::mem::replace(&mut sys.gpu.vblank, callback))
    }

    pub fn vblank_callback(&self) -> Option<Callback<H>> {
        self.gpu.vblank
    }

    /// Runs from the DMA interrupt whenever the draw queue drains.
    pub fn set_queue_callback(&mut self, callback: Option<Callback<H>>) -> Option<Callback<H>> {
        sync::without_interrupts(self, |sys| core::mem::replace(&mut sys.gpu.queue_done, callback))
    }

    pub fn queue_callback(&self) -> Option<Callback<H>> {
        self.gpu.queue_done
    }
}
