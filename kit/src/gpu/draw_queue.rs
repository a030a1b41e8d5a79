//! GPU draw queue: image transfers, ordering-table kicks and raw GP1
//! bursts, one at a time, advanced by the GPU DMA completion interrupt.

use phal::{Dma, DmaReg, Hardware};

use super::prim::{Word, command, gp1, op};
use super::{chcr_sync, cmd_sync, data_sync, gp0_cmd, gp0_data};
use crate::queue::{Queue, QueueHost};
use crate::system::System;

/// One draw queue operation.
#[derive(Debug, Clone, Copy)]
pub enum DrawOp {
    /// Block DMA between RAM at `addr` and the VRAM rectangle `xy`/`wh`.
    Image { addr: usize, xy: u32, wh: u32, bcr: u32, to_vram: bool },
    /// Linked-list DMA of an ordering table starting at the tag at `addr`.
    OrderingTable { addr: usize },
    /// Words written straight to GP1. Has no DMA phase.
    Gp1 { words: &'static [Word] },
}

pub(crate) type DrawQueue<H> = Queue<System<H>, DrawOp, 16>;

impl<H: Hardware> QueueHost<DrawQueue<H>> for System<H> {
    #[inline]
    fn queue(&mut self) -> &mut DrawQueue<H> {
        &mut self.gpu.queue
    }
}

/// Queue handler.
pub(super) fn submit<H: Hardware>(sys: &mut System<H>, draw: &DrawOp) {
    match *draw {
        DrawOp::Image { addr, xy, wh, bcr, to_vram } => {
            let hw = &mut sys.hw;
            data_sync(hw);
            hw.gp1_write(command(gp1::DMA_DIRECTION));
            gp0_cmd(hw, command(op::FLUSH_CACHE));

            gp0_cmd(hw, command(if to_vram { op::TO_VRAM } else { op::FROM_VRAM }));
            gp0_data(hw, xy);
            gp0_data(hw, wh);

            hw.gp1_write(command(gp1::DMA_DIRECTION) | if to_vram { 2 } else { 3 });

            hw.dma_set_address(Dma::Gpu, addr);
            hw.dma_write(Dma::Gpu, DmaReg::Bcr, bcr);
            hw.dma_write(Dma::Gpu, DmaReg::Chcr, 0x0100_0200 | to_vram as u32);
        }
        DrawOp::OrderingTable { addr } => {
            let hw = &mut sys.hw;
            data_sync(hw);
            hw.gp1_write(command(gp1::DMA_DIRECTION) | 2);

            cmd_sync(hw);
            data_sync(hw);
            chcr_sync(hw);

            hw.dma_set_address(Dma::Gpu, addr);
            hw.dma_write(Dma::Gpu, DmaReg::Bcr, 0);
            hw.dma_write(Dma::Gpu, DmaReg::Chcr, 0x0100_0401);
        }
        DrawOp::Gp1 { words } => {
            for &word in words {
                sys.hw.gp1_write(word);
            }
            // Nothing will interrupt for this one.
            draw_complete(sys);
        }
    }
}

/// [`Dma::Gpu`] completion callback.
pub(super) fn draw_complete<H: Hardware>(sys: &mut System<H>) {
    if DrawQueue::<H>::dispatch(sys) {
        sys.hw.gp1_write(command(gp1::DMA_DIRECTION));
        if let Some(callback) = sys.gpu.queue_done {
            callback(sys);
        }
    }
}

/// DMA block control for a `w` x `h` 16-bit image: the largest power-of-two
/// block size up to 16 words that divides the word count, and the number
/// of such blocks.
pub const fn image_bcr(w: u16, h: u16) -> u32 {
    let mut count = (w as u32 * h as u32) >> 1;
    let mut block = 1;
    while count & 1 == 0 && block < 16 {
        block <<= 1;
        count >>= 1;
    }
    (count << 16) | block
}

impl<H: Hardware> System<H> {
    /// Queue a RAM to VRAM block transfer with explicit block control.
    ///
    /// # Safety
    ///
    /// `addr` must stay valid and unchanged for `bcr` worth of words until
    /// the draw queue has moved past this transfer.
    pub unsafe fn gpu_dma_image(&mut self, addr: *const Word, xy: u32, wh: u32, bcr: u32) {
        let draw = DrawOp::Image { addr: addr as usize, xy, wh, bcr, to_vram: true };
        DrawQueue::<H>::enqueue(self, submit::<H>, draw);
    }

    /// Queue an upload of a 16-bit `w` x `h` image to VRAM at `x`, `y`.
    pub fn gpu_load_image(&mut self, data: &'static [Word], x: u16, y: u16, w: u16, h: u16) {
        debug_assert!(data.len() * 2 >= w as usize * h as usize, "image data too short");
        // SAFETY: `data` is borrowed forever and never written.
        unsafe {
            self.gpu_dma_image(
                data.as_ptr(),
                x as u32 | (y as u32) << 16,
                w as u32 | (h as u32) << 16,
                image_bcr(w, h),
            )
        };
    }

    /// Queue a VRAM to RAM transfer of the `w` x `h` rectangle at `x`, `y`.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for `w * h / 2` words of writes and left alone
    /// until [`System::gpu_queue_sync`] returns.
    pub unsafe fn gpu_read_image(&mut self, dst: *mut Word, x: u16, y: u16, w: u16, h: u16) {
        let draw = DrawOp::Image {
            addr: dst as usize,
            xy: x as u32 | (y as u32) << 16,
            wh: w as u32 | (h as u32) << 16,
            bcr: image_bcr(w, h),
            to_vram: false,
        };
        DrawQueue::<H>::enqueue(self, submit::<H>, draw);
    }

    /// Queue a burst of raw GP1 commands behind the pending transfers.
    pub fn gpu_queue_gp1(&mut self, words: &'static [Word]) {
        DrawQueue::<H>::enqueue(self, submit::<H>, DrawOp::Gp1 { words });
    }

    /// Operations in the draw queue, the running one included.
    pub fn gpu_queue_len(&self) -> usize {
        self.gpu.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Sim;

    fn system() -> System<Sim> {
        let mut sys = System::new(Sim::new());
        sys.hw.interrupts = true;
        sys.gpu_init();
        sys.hw.gp0.clear();
        sys.hw.gp1.clear();
        sys
    }

    fn count_drained(sys: &mut System<Sim>) {
        sys.hw.counters.queue_callbacks += 1;
    }

    #[test]
    fn block_size_is_the_largest_power_of_two_up_to_sixteen() {
        assert_eq!(image_bcr(16, 16), 8 << 16 | 16);
        assert_eq!(image_bcr(3, 2), 3 << 16 | 1);
        assert_eq!(image_bcr(4, 3), 3 << 16 | 2);
        assert_eq!(image_bcr(256, 256), 2048 << 16 | 16);
    }

    #[test]
    fn load_image_sends_the_rectangle_then_the_data() {
        let mut sys = system();
        sys.set_queue_callback(Some(count_drained));
        let data: &'static [Word] = Box::leak(vec![0x1111_2222; 8].into_boxed_slice());

        sys.gpu_load_image(data, 64, 32, 4, 4);
        assert_eq!(sys.gpu_queue_len(), 1);
        assert_eq!(sys.hw.gp0[..4], [0x0100_0000, 0xA000_0000, 64 | 32 << 16, 4 | 4 << 16]);
        assert_eq!(sys.hw.gp0[4..], [0x1111_2222; 8]);
        assert_eq!(sys.hw.gp1[..2], [0x0400_0000, 0x0400_0002]);

        assert!(sys.gpu_queue_sync());
        assert_eq!(sys.gpu_queue_len(), 0);
        assert_eq!(sys.hw.counters.queue_callbacks, 1);
        assert_eq!(sys.hw.gp1.last(), Some(&0x0400_0000));
    }

    #[test]
    fn later_operations_wait_for_the_dma_interrupt() {
        static BURST: [Word; 2] = [0x0500_0000, 0x0300_0000];
        let mut sys = system();
        sys.set_queue_callback(Some(count_drained));
        let data: &'static [Word] = Box::leak(vec![0; 2].into_boxed_slice());

        sys.gpu_load_image(data, 0, 0, 2, 2);
        sys.gpu_queue_gp1(&BURST);
        assert_eq!(sys.gpu_queue_len(), 2);
        assert!(!sys.hw.gp1.contains(&0x0500_0000));

        sys.service_interrupts();
        assert!(sys.hw.gp1.ends_with(&[0x0500_0000, 0x0300_0000, 0x0400_0000]));
        assert_eq!(sys.gpu_queue_len(), 0);
        assert_eq!(sys.hw.counters.queue_callbacks, 1);
    }

    #[test]
    fn gp1_burst_on_an_idle_queue_completes_immediately() {
        static BURST: [Word; 1] = [0x0300_0001];
        let mut sys = system();
        sys.set_queue_callback(Some(count_drained));
        sys.gpu_queue_gp1(&BURST);
        assert_eq!(sys.gpu_queue_len(), 0);
        assert_eq!(sys.hw.gp1, [0x0300_0001, 0x0400_0000]);
        assert_eq!(sys.hw.counters.queue_callbacks, 1);
    }

    #[test]
    fn read_image_points_the_dma_at_the_destination() {
        let mut sys = system();
        let mut dst = vec![0u32; 8];
        unsafe { sys.gpu_read_image(dst.as_mut_ptr(), 0, 0, 4, 4) };
        assert_eq!(sys.hw.gp0[1], 0xC000_0000);
        assert_eq!(sys.hw.gp1[1], 0x0400_0003);
        assert_eq!(sys.hw.dma_madr(Dma::Gpu), dst.as_ptr() as usize);
        assert!(sys.gpu_queue_sync());
    }
}
