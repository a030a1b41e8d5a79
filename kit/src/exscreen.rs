//! Exception screen.
//!
//! Last stop for unrecoverable exceptions and [`abort`]: the GPU is reset to
//! a 640x480 screen, an 8x8 font is uploaded next to the framebuffer, and
//! the saved registers or the stack are dumped as text. Cross on the pad
//! switches page. Nothing here returns.

use core::fmt::{self, Write};

use phal::Hardware;
use spin::Mutex;

use crate::gpu::prim::{Word, command, gp1, op};
use crate::gpu::{chcr_sync, data_sync, gp0_cmd, gp0_data};
use crate::system::System;
use crate::traps::{ExceptionCode, Frame};

pub const WIDTH: u32 = 640;
pub const HEIGHT: u32 = 480;
pub const MARGIN: u32 = 24;

/// Font texture page (4bpp, 32x48 halfwords) and its CLUT.
const FONT_X: u16 = 1024 - 64;
const CLUT_X: u16 = 1024 - 32;
const FONT_W: u16 = 32;
const FONT_H: u16 = 48;

/// Pad bit of the cross button.
pub const PAD_CROSS: u16 = 1 << 14;

/// Top of the 2 MiB of main RAM, where every stack starts.
const RAM_TOP: u32 = 0x8020_0000;
const RAM_BASE: u32 = 0x8000_0000;

/// Printable ASCII, `' '` to DEL, one byte per row, bit 7 leftmost.
const GLYPHS: [[u8; 8]; 96] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
    [0x18, 0x18, 0x18, 0x18, 0x18, 0x00, 0x18, 0x00],
    [0x6C, 0x6C, 0x24, 0x00, 0x00, 0x00, 0x00, 0x00],
    [0x6C, 0x6C, 0xFE, 0x6C, 0xFE, 0x6C, 0x6C, 0x00],
    [0x18, 0x3E, 0x60, 0x3C, 0x06, 0x7C, 0x18, 0x00],
    [0x00, 0x66, 0xAC, 0xD8, 0x36, 0x6A, 0xCC, 0x00],
    [0x38, 0x6C, 0x68, 0x76, 0xDC, 0xCC, 0x76, 0x00],
    [0x18, 0x18, 0x30, 0x00, 0x00, 0x00, 0x00, 0x00],
    [0x0C, 0x18, 0x30, 0x30, 0x30, 0x18, 0x0C, 0x00],
    [0x30, 0x18, 0x0C, 0x0C, 0x0C, 0x18, 0x30, 0x00],
    [0x00, 0x66, 0x3C, 0xFF, 0x3C, 0x66, 0x00, 0x00],
    [0x00, 0x18, 0x18, 0x7E, 0x18, 0x18, 0x00, 0x00],
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x30],
    [0x00, 0x00, 0x00, 0x7E, 0x00, 0x00, 0x00, 0x00],
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00],
    [0x06, 0x0C, 0x18, 0x30, 0x60, 0xC0, 0x80, 0x00],
    [0x3C, 0x66, 0x6E, 0x7E, 0x76, 0x66, 0x3C, 0x00],
    [0x18, 0x38, 0x18, 0x18, 0x18, 0x18, 0x7E, 0x00],
    [0x3C, 0x66, 0x06, 0x1C, 0x30, 0x66, 0x7E, 0x00],
    [0x3C, 0x66, 0x06, 0x1C, 0x06, 0x66, 0x3C, 0x00],
    [0x1C, 0x3C, 0x6C, 0xCC, 0xFE, 0x0C, 0x1E, 0x00],
    [0x7E, 0x60, 0x7C, 0x06, 0x06, 0x66, 0x3C, 0x00],
    [0x1C, 0x30, 0x60, 0x7C, 0x66, 0x66, 0x3C, 0x00],
    [0x7E, 0x66, 0x06, 0x0C, 0x18, 0x18, 0x18, 0x00],
    [0x3C, 0x66, 0x66, 0x3C, 0x66, 0x66, 0x3C, 0x00],
    [0x3C, 0x66, 0x66, 0x3E, 0x06, 0x0C, 0x38, 0x00],
    [0x00, 0x18, 0x18, 0x00, 0x18, 0x18, 0x00, 0x00],
    [0x00, 0x18, 0x18, 0x00, 0x18, 0x18, 0x30, 0x00],
    [0x0C, 0x18, 0x30, 0x60, 0x30, 0x18, 0x0C, 0x00],
    [0x00, 0x00, 0x7E, 0x00, 0x7E, 0x00, 0x00, 0x00],
    [0x30, 0x18, 0x0C, 0x06, 0x0C, 0x18, 0x30, 0x00],
    [0x3C, 0x66, 0x0C, 0x18, 0x18, 0x00, 0x18, 0x00],
    [0x3C, 0x66, 0x6E, 0x6A, 0x6E, 0x60, 0x3C, 0x00],
    [0x3C, 0x66, 0x66, 0x7E, 0x66, 0x66, 0x66, 0x00],
    [0x7C, 0x66, 0x66, 0x7C, 0x66, 0x66, 0x7C, 0x00],
    [0x3C, 0x66, 0x60, 0x60, 0x60, 0x66, 0x3C, 0x00],
    [0x78, 0x6C, 0x66, 0x66, 0x66, 0x6C, 0x78, 0x00],
    [0x7E, 0x60, 0x60, 0x7C, 0x60, 0x60, 0x7E, 0x00],
    [0x7E, 0x60, 0x60, 0x7C, 0x60, 0x60, 0x60, 0x00],
    [0x3C, 0x66, 0x60, 0x6E, 0x66, 0x66, 0x3E, 0x00],
    [0x66, 0x66, 0x66, 0x7E, 0x66, 0x66, 0x66, 0x00],
    [0x7E, 0x18, 0x18, 0x18, 0x18, 0x18, 0x7E, 0x00],
    [0x3E, 0x0C, 0x0C, 0x0C, 0x0C, 0x6C, 0x38, 0x00],
    [0x66, 0x6C, 0x78, 0x70, 0x78, 0x6C, 0x66, 0x00],
    [0x60, 0x60, 0x60, 0x60, 0x60, 0x60, 0x7E, 0x00],
    [0xC6, 0xEE, 0xFE, 0xD6, 0xC6, 0xC6, 0xC6, 0x00],
    [0x66, 0x76, 0x7E, 0x7E, 0x6E, 0x66, 0x66, 0x00],
    [0x3C, 0x66, 0x66, 0x66, 0x66, 0x66, 0x3C, 0x00],
    [0x7C, 0x66, 0x66, 0x7C, 0x60, 0x60, 0x60, 0x00],
    [0x3C, 0x66, 0x66, 0x66, 0x6A, 0x6C, 0x36, 0x00],
    [0x7C, 0x66, 0x66, 0x7C, 0x6C, 0x66, 0x66, 0x00],
    [0x3C, 0x66, 0x60, 0x3C, 0x06, 0x66, 0x3C, 0x00],
    [0x7E, 0x18, 0x18, 0x18, 0x18, 0x18, 0x18, 0x00],
    [0x66, 0x66, 0x66, 0x66, 0x66, 0x66, 0x3C, 0x00],
    [0x66, 0x66, 0x66, 0x66, 0x66, 0x3C, 0x18, 0x00],
    [0xC6, 0xC6, 0xC6, 0xD6, 0xFE, 0xEE, 0xC6, 0x00],
    [0x66, 0x66, 0x3C, 0x18, 0x3C, 0x66, 0x66, 0x00],
    [0x66, 0x66, 0x66, 0x3C, 0x18, 0x18, 0x18, 0x00],
    [0x7E, 0x06, 0x0C, 0x18, 0x30, 0x60, 0x7E, 0x00],
    [0x3C, 0x30, 0x30, 0x30, 0x30, 0x30, 0x3C, 0x00],
    [0xC0, 0x60, 0x30, 0x18, 0x0C, 0x06, 0x02, 0x00],
    [0x3C, 0x0C, 0x0C, 0x0C, 0x0C, 0x0C, 0x3C, 0x00],
    [0x18, 0x3C, 0x66, 0x00, 0x00, 0x00, 0x00, 0x00],
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF],
    [0x30, 0x18, 0x0C, 0x00, 0x00, 0x00, 0x00, 0x00],
    [0x00, 0x00, 0x3C, 0x06, 0x3E, 0x66, 0x3E, 0x00],
    [0x60, 0x60, 0x7C, 0x66, 0x66, 0x66, 0x7C, 0x00],
    [0x00, 0x00, 0x3C, 0x66, 0x60, 0x66, 0x3C, 0x00],
    [0x06, 0x06, 0x3E, 0x66, 0x66, 0x66, 0x3E, 0x00],
    [0x00, 0x00, 0x3C, 0x66, 0x7E, 0x60, 0x3C, 0x00],
    [0x1C, 0x30, 0x30, 0x7C, 0x30, 0x30, 0x30, 0x00],
    [0x00, 0x00, 0x3E, 0x66, 0x66, 0x3E, 0x06, 0x3C],
    [0x60, 0x60, 0x7C, 0x66, 0x66, 0x66, 0x66, 0x00],
    [0x18, 0x00, 0x38, 0x18, 0x18, 0x18, 0x3C, 0x00],
    [0x18, 0x00, 0x38, 0x18, 0x18, 0x18, 0x18, 0x70],
    [0x60, 0x60, 0x66, 0x6C, 0x78, 0x6C, 0x66, 0x00],
    [0x38, 0x18, 0x18, 0x18, 0x18, 0x18, 0x3C, 0x00],
    [0x00, 0x00, 0x6C, 0xFE, 0xD6, 0xC6, 0xC6, 0x00],
    [0x00, 0x00, 0x7C, 0x66, 0x66, 0x66, 0x66, 0x00],
    [0x00, 0x00, 0x3C, 0x66, 0x66, 0x66, 0x3C, 0x00],
    [0x00, 0x00, 0x7C, 0x66, 0x66, 0x7C, 0x60, 0x60],
    [0x00, 0x00, 0x3E, 0x66, 0x66, 0x3E, 0x06, 0x06],
    [0x00, 0x00, 0x7C, 0x66, 0x60, 0x60, 0x60, 0x00],
    [0x00, 0x00, 0x3E, 0x60, 0x3C, 0x06, 0x7C, 0x00],
    [0x30, 0x30, 0x7C, 0x30, 0x30, 0x30, 0x1C, 0x00],
    [0x00, 0x00, 0x66, 0x66, 0x66, 0x66, 0x3E, 0x00],
    [0x00, 0x00, 0x66, 0x66, 0x66, 0x3C, 0x18, 0x00],
    [0x00, 0x00, 0xC6, 0xC6, 0xD6, 0xFE, 0x6C, 0x00],
    [0x00, 0x00, 0x66, 0x3C, 0x18, 0x3C, 0x66, 0x00],
    [0x00, 0x00, 0x66, 0x66, 0x66, 0x3E, 0x06, 0x3C],
    [0x00, 0x00, 0x7E, 0x0C, 0x18, 0x30, 0x7E, 0x00],
    [0x0C, 0x18, 0x18, 0x30, 0x18, 0x18, 0x0C, 0x00],
    [0x18, 0x18, 0x18, 0x18, 0x18, 0x18, 0x18, 0x00],
    [0x30, 0x18, 0x18, 0x0C, 0x18, 0x18, 0x30, 0x00],
    [0x00, 0x00, 0x76, 0xDC, 0x00, 0x00, 0x00, 0x00],
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
];

/// Glyph table as a 4bpp texture: 16 glyphs per row, one word per glyph
/// row, pixel 0 in the low nibble.
const fn pack_font(glyphs: &[[u8; 8]; 96]) -> [Word; 768] {
    let mut texture = [0; 768];
    let mut glyph = 0;
    while glyph < 96 {
        let (col, row) = (glyph % 16, glyph / 16);
        let mut y = 0;
        while y < 8 {
            let bits = glyphs[glyph][y];
            let mut word = 0;
            let mut x = 0;
            while x < 8 {
                if bits & (0x80 >> x) != 0 {
                    word |= 1 << (4 * x);
                }
                x += 1;
            }
            texture[(row * 8 + y) * 16 + col] = word;
            y += 1;
        }
        glyph += 1;
    }
    texture
}

static FONT: [Word; 768] = pack_font(&GLYPHS);
/// Index 0 transparent, index 1 white.
static FONT_CLUT: [Word; 8] = [0x7FFF << 16, 0, 0, 0, 0, 0, 0, 0];

/// The reason [`abort`] or the panic handler leaves for the screen.
struct Reason {
    text: [u8; 64],
    len: usize,
}

impl Write for Reason {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &byte in s.as_bytes() {
            if self.len == self.text.len() {
                break;
            }
            self.text[self.len] = byte;
            self.len += 1;
        }
        Ok(())
    }
}

static REASON: Mutex<Reason> = Mutex::new(Reason { text: [0; 64], len: 0 });

/// Record the text shown instead of the exception name on a breakpoint.
/// Truncated to 64 bytes.
pub fn set_reason(args: fmt::Arguments) {
    let mut reason = REASON.lock();
    reason.len = 0;
    let _ = reason.write_fmt(args);
}

/// Copy the recorded reason into `out`, returning the filled part.
pub fn reason(out: &mut [u8; 64]) -> Option<&str> {
    let reason = REASON.lock();
    if reason.len == 0 {
        return None;
    }
    out[..reason.len].copy_from_slice(&reason.text[..reason.len]);
    // Truncation may have split a character.
    match core::str::from_utf8(&out[..reason.len]) {
        Ok(text) => Some(text),
        Err(err) => core::str::from_utf8(&out[..err.valid_up_to()]).ok(),
    }
}

/// Stop the program and show the exception screen with `reason`.
pub fn abort(reason: &str) -> ! {
    #[cfg(target_arch = "mips")]
    {
        set_reason(format_args!("{reason}"));
        crate::runtime::raise_break()
    }
    #[cfg(not(target_arch = "mips"))]
    panic!("{reason}")
}

/// Whether `sp` can be walked up to the top of RAM.
pub const fn stack_is_valid(sp: u32) -> bool {
    sp & 3 == 0 && sp >= RAM_BASE && sp < RAM_TOP
}

/// Words from `sp` to the top of RAM, if `sp` points into RAM.
///
/// # Safety
///
/// Only meaningful on the console, where RAM is mapped at `0x8000_0000`.
pub unsafe fn stack_words(sp: u32) -> Option<&'static [u32]> {
    if !stack_is_valid(sp) {
        return None;
    }
    let len = ((RAM_TOP - sp) / 4) as usize;
    // SAFETY: `sp..RAM_TOP` is inside main RAM per the check above.
    Some(unsafe { core::slice::from_raw_parts(sp as usize as *const u32, len) })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Registers,
    Stack,
}

impl Page {
    pub const fn next(self) -> Page {
        match self {
            Page::Registers => Page::Stack,
            Page::Stack => Page::Registers,
        }
    }
}

/// Text output straight to GP0 as raw 8x8 textured sprites.
struct Text<'a, H: Hardware> {
    hw: &'a mut H,
}

impl<H: Hardware> Text<'_, H> {
    fn out(&mut self, text: &str, mut x: u32, y: u32) {
        for byte in text.bytes() {
            let c = if (0x20..0x80).contains(&byte) { byte as u32 } else { b'?' as u32 };
            let u = (c & 0xF) << 3;
            let v = ((c - 0x20) >> 4) << 3;
            gp0_cmd(&mut *self.hw, command(op::RECT | op::RECT_8X8 | op::RECT_TEXTURED | op::RAW));
            gp0_data(&mut *self.hw, x | y << 16);
            gp0_data(&mut *self.hw, u | v << 8 | (CLUT_X as u32 / 16) << 16);
            x += 8;
        }
    }

    fn word(&mut self, value: u32, x: u32, y: u32) {
        const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
        let mut text = [0u8; 8];
        for (i, digit) in text.iter_mut().enumerate() {
            *digit = DIGITS[(value >> (28 - 4 * i)) as usize & 0xF];
        }
        // Hex digits are ASCII.
        if let Ok(text) = core::str::from_utf8(&text) {
            self.out(text, x, y);
        }
    }

    fn register(&mut self, name: &str, value: u32, x: u32, y: u32) {
        self.out(name, x, y);
        self.word(value, x + 7 * 8, y);
    }
}

fn register_page<H: Hardware>(text: &mut Text<'_, H>, frame: &Frame, reason: Option<&str>) {
    const TOP: u32 = MARGIN + 32;
    const GENERAL: u32 = MARGIN + 64;

    text.out("REGISTER DUMP", MARGIN, MARGIN);

    text.register("CAUSE", frame.cause, MARGIN, TOP);
    text.register("EPC", frame.epc, MARGIN + 128, TOP);
    text.register("SR", frame.sr, MARGIN, TOP + 8);
    text.register("HI", frame.hi, MARGIN, TOP + 16);
    text.register("LO", frame.lo, MARGIN + 128, TOP + 16);

    // AT alone on the first row, then pairs.
    for (i, (name, value)) in frame.general_registers().into_iter().enumerate() {
        let (col, line) = if i == 0 { (0, 0) } else { ((i as u32 + 1) % 2, (i as u32 + 1) / 2) };
        text.register(name, value, MARGIN + 128 * col, GENERAL + 8 * line);
    }

    let code = frame.exception_code();
    let line = match reason {
        Some(reason) if code == ExceptionCode::Breakpoint => reason,
        _ => code.describe(),
    };
    text.out(line, MARGIN, HEIGHT - MARGIN - 8);
}

fn stack_page<H: Hardware>(text: &mut Text<'_, H>, frame: &Frame, stack: Option<&[u32]>) {
    text.out("STACK DUMP", MARGIN, MARGIN);
    text.register("SP", frame.sp, WIDTH - MARGIN - 128, MARGIN);
    text.register("RA", frame.ra, WIDTH - MARGIN - 128, MARGIN + 8);

    let Some(stack) = stack.filter(|_| stack_is_valid(frame.sp)) else {
        text.out("BAD SP", MARGIN, MARGIN + 16);
        return;
    };

    let (mut x, mut y) = (MARGIN, MARGIN + 32);
    for &word in stack {
        if y >= HEIGHT - MARGIN {
            break;
        }
        text.word(word, x, y);
        x += 8 * 9;
        if x >= WIDTH - MARGIN - 8 * 8 {
            x = MARGIN;
            y += 8;
        }
    }
}

impl<H: Hardware> System<H> {
    /// Reset the GPU to the exception screen mode and upload the font.
    ///
    /// Runs with interrupts masked, so each upload is waited for by hand and
    /// the draw queue is dropped behind it.
    pub fn exscreen_setup(&mut self) {
        self.gpu_init();
        self.gpu_set_screen(WIDTH, HEIGHT, 0, 0, 0, 0, 0, 0);
        self.gpu_queue_reset();

        for (data, x, w, h) in [(&FONT[..], FONT_X, FONT_W, FONT_H), (&FONT_CLUT[..], CLUT_X, 16, 1)] {
            data_sync(&mut self.hw);
            chcr_sync(&mut self.hw);
            self.gpu_load_image(data, x, 0, w, h);
            chcr_sync(&mut self.hw);
            self.gpu_queue_reset();
        }
        data_sync(&mut self.hw);
    }

    /// Draw one page of the exception screen.
    ///
    /// `stack` holds the words from `frame.sp` up; it is ignored when `sp`
    /// is not a plausible stack pointer.
    pub fn exscreen_render(
        &mut self,
        frame: &Frame,
        reason: Option<&str>,
        page: Page,
        stack: Option<&[u32]>,
    ) {
        let buffer = self.gpu_buffer(self.gpu_current_buffer());
        let (display, draw) = (buffer.display, buffer.draw);

        let hw = &mut self.hw;
        for word in display.words() {
            hw.gp1_write(word);
        }
        hw.gp1_write(command(gp1::DISPLAY_ENABLE));

        gp0_cmd(hw, draw.top_left);
        gp0_cmd(hw, draw.bottom_right);
        gp0_cmd(hw, draw.offset);
        gp0_cmd(hw, draw.mode.mode);

        // Blue background.
        gp0_cmd(hw, command(op::FILL_VRAM) | 0xFF << 16);
        gp0_data(hw, 0);
        gp0_data(hw, WIDTH | HEIGHT << 16);

        // Font page, 4bpp, dithering on.
        gp0_cmd(hw, command(op::DRAW_MODE) | (FONT_X as u32 / 64) | 1 << 10);

        let mut text = Text { hw };
        text.out("[X] - SWITCH PAGE", MARGIN, MARGIN + 8);
        match page {
            Page::Registers => register_page(&mut text, frame, reason),
            Page::Stack => stack_page(&mut text, frame, stack),
        }
    }

    /// Show the exception screen for `frame` until the console is reset.
    pub fn exscreen_run(&mut self, frame: &Frame, reason: Option<&str>, stack: Option<&[u32]>) -> ! {
        self.hw.disable_interrupts();
        plog::error!("{} at {:08X}", reason.unwrap_or(frame.exception_code().describe()), frame.epc);

        self.exscreen_setup();
        let mut page = Page::Registers;
        loop {
            self.exscreen_render(frame, reason, page, stack);
            while self.hw.pad_pressed() & PAD_CROSS == 0 {
                self.hw.relax();
            }
            page = page.next();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Sim;

    fn system() -> System<Sim> {
        let mut sys = System::new(Sim::new());
        sys.exscreen_setup();
        sys.hw.gp0.clear();
        sys.hw.gp1.clear();
        sys
    }

    /// Characters drawn on row `y`, gaps of one cell shown as spaces.
    fn row(gp0: &[u32], y: u32) -> String {
        let mut cells: Vec<(u32, char)> = gp0
            .windows(3)
            .filter(|w| w[0] == 0x7500_0000 && w[1] >> 16 == y)
            .map(|w| {
                let (u, v) = (w[2] & 0xFF, (w[2] >> 8) & 0xFF);
                let c = 0x20 + (v / 8) * 16 + u / 8;
                (w[1] & 0xFFFF, char::from(c as u8))
            })
            .collect();
        cells.sort_by_key(|&(x, _)| x);

        let mut line = String::new();
        let mut next = MARGIN;
        for (x, c) in cells {
            while next < x {
                line.push(' ');
                next += 8;
            }
            line.push(c);
            next = x + 8;
        }
        line
    }

    #[test]
    fn font_packs_one_word_per_glyph_row() {
        // 'A' is glyph 33: column 1 of glyph row 2.
        let a = GLYPHS[33][0];
        assert_eq!(a, 0x3C);
        assert_eq!(FONT[(2 * 8) * 16 + 1], 0x0011_1100);
        assert_eq!(FONT[0], 0);
    }

    #[test]
    fn setup_uploads_font_and_palette() {
        let mut sys = System::new(Sim::new());
        sys.exscreen_setup();

        let font = sys.hw.gp0.windows(3).position(|w| w == [0xA000_0000, 960, 32 | 48 << 16]);
        let clut = sys.hw.gp0.windows(3).position(|w| w == [0xA000_0000, 992, 16 | 1 << 16]);
        assert!(font.is_some() && clut.is_some());
        assert!(sys.hw.gp0.ends_with(&FONT_CLUT));
        assert_eq!(sys.gpu_queue_len(), 0);
        assert_eq!(sys.gpu_buffer(0).draw_env().bottom_right, 0xE400_0000 | 639 | 479 << 10);
    }

    #[test]
    fn register_page_lists_the_frame() {
        let mut sys = system();
        let frame = Frame { cause: 4 << 2, epc: 0x8001_0000, a0: 0xDEAD_BEEF, ..Frame::default() };
        sys.exscreen_render(&frame, None, Page::Registers, None);

        let gp0 = &sys.hw.gp0;
        assert_eq!(row(gp0, MARGIN), "REGISTER DUMP");
        assert_eq!(row(gp0, MARGIN + 8), "[X] - SWITCH PAGE");
        assert_eq!(row(gp0, MARGIN + 32), "CAUSE  00000010 EPC    80010000");
        assert!(row(gp0, MARGIN + 64 + 16).starts_with("A0     DEADBEEF"));
        assert_eq!(row(gp0, HEIGHT - MARGIN - 8), "ADDRESS ERROR IN LOAD");
        assert_eq!(sys.hw.gp1[4], 0x0300_0000);
    }

    #[test]
    fn abort_reason_replaces_the_breakpoint_name() {
        let mut sys = system();
        let frame = Frame { cause: 9 << 2, ..Frame::default() };
        sys.exscreen_render(&frame, Some("Queue overflow"), Page::Registers, None);
        assert_eq!(row(&sys.hw.gp0, HEIGHT - MARGIN - 8), "Queue overflow");
    }

    #[test]
    fn stack_page_dumps_words_from_sp() {
        let mut sys = system();
        let frame = Frame { sp: 0x801F_FFF8, ..Frame::default() };
        sys.exscreen_render(&frame, None, Page::Stack, Some(&[0x1234_5678, 0x9ABC_DEF0]));
        assert_eq!(row(&sys.hw.gp0, MARGIN + 32), "12345678 9ABCDEF0");
    }

    #[test]
    fn unaligned_sp_is_reported() {
        let mut sys = system();
        let frame = Frame { sp: 0x801F_FFF9, ..Frame::default() };
        sys.exscreen_render(&frame, None, Page::Stack, Some(&[1, 2]));
        assert_eq!(row(&sys.hw.gp0, MARGIN + 16), "BAD SP");
        assert!(!stack_is_valid(0x1000));
        assert!(!stack_is_valid(RAM_TOP));
    }

    #[test]
    fn reason_is_kept_and_truncated() {
        set_reason(format_args!("{}", "x".repeat(80)));
        let mut buf = [0; 64];
        assert_eq!(reason(&mut buf).map(str::len), Some(64));
        set_reason(format_args!("CD init failed"));
        assert_eq!(reason(&mut buf), Some("CD init failed"));
    }

    #[test]
    #[should_panic(expected = "ALL not found")]
    fn abort_is_fatal() {
        abort("ALL not found");
    }
}
