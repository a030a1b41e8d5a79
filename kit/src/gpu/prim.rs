//! GP0 packet layouts and the small value types they are built from.
//!
//! Every packet is a `#[repr(C)]` run of 32-bit words whose first word
//! carries the command byte in bits 24-31. `Default` builds a packet with
//! its command byte set and everything else zero.

/// A word-sized GP0/GP1 value.
pub type Word = u32;

/// Command byte helpers.
pub mod op {
    pub const NOP: u32 = 0x00;
    pub const FLUSH_CACHE: u32 = 0x01;
    pub const FILL_VRAM: u32 = 0x02;

    pub const POLY: u32 = 0x20;
    pub const POLY_GOURAUD: u32 = 0x10;
    pub const POLY_QUAD: u32 = 0x08;
    pub const POLY_TEXTURED: u32 = 0x04;

    pub const RECT: u32 = 0x60;
    pub const RECT_1X1: u32 = 0x08;
    pub const RECT_8X8: u32 = 0x10;
    pub const RECT_16X16: u32 = 0x18;
    pub const RECT_TEXTURED: u32 = 0x04;

    /// Semi-transparency, shared by polygons and rectangles.
    pub const SEMI: u32 = 0x02;
    /// Raw texture (no colour modulation).
    pub const RAW: u32 = 0x01;

    pub const TO_VRAM: u32 = 0xA0;
    pub const FROM_VRAM: u32 = 0xC0;

    pub const DRAW_MODE: u32 = 0xE1;
    pub const DRAW_TOP_LEFT: u32 = 0xE3;
    pub const DRAW_BOTTOM_RIGHT: u32 = 0xE4;
    pub const DRAW_OFFSET: u32 = 0xE5;
}

/// GP1 command bytes.
pub mod gp1 {
    pub const RESET: u32 = 0x00;
    pub const FLUSH: u32 = 0x01;
    pub const DISPLAY_ENABLE: u32 = 0x03;
    pub const DMA_DIRECTION: u32 = 0x04;
    pub const DISPLAY_VRAM: u32 = 0x05;
    pub const DISPLAY_HSPAN: u32 = 0x06;
    pub const DISPLAY_VSPAN: u32 = 0x07;
    pub const DISPLAY_MODE: u32 = 0x08;
}

#[inline]
pub const fn command(op: u32) -> Word {
    op << 24
}

/// Marker for types that may be placed in an ordering table.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]`, consist only of 32-bit words (size a
/// multiple of four, alignment at most four) and start with the command
/// word.
pub unsafe trait Packet: Default {}

/// View a packet as the words the GPU receives.
#[inline]
pub fn words<T: Packet>(packet: &T) -> &[Word] {
    // SAFETY: `Packet` guarantees a plain run of words.
    unsafe {
        core::slice::from_raw_parts(
            (packet as *const T).cast::<Word>(),
            core::mem::size_of::<T>() / 4,
        )
    }
}

/// Ordering-table link: 24-bit address of the next packet, 8-bit size of
/// the packet that follows this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Tag(pub Word);

impl Tag {
    /// End-of-chain marker the OTC channel writes into the last slot.
    pub const END: Tag = Tag(0x00FF_FFFF);

    #[inline]
    pub const fn new(addr: u32, words: usize) -> Tag {
        Tag((addr & 0x00FF_FFFF) | ((words as u32) << 24))
    }

    #[inline]
    pub const fn addr(self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    #[inline]
    pub const fn words(self) -> usize {
        (self.0 >> 24) as usize
    }

    #[inline]
    pub const fn is_end(self) -> bool {
        self.addr() == Tag::END.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Color(pub Word);

impl Color {
    pub const BLACK: Color = Color(0);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Color {
        Color(r as u32 | (g as u32) << 8 | (b as u32) << 16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct ScreenCoord(pub Word);

impl ScreenCoord {
    #[inline]
    pub const fn new(x: i16, y: i16) -> ScreenCoord {
        ScreenCoord(x as u16 as u32 | (y as u16 as u32) << 16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct ScreenDim(pub Word);

impl ScreenDim {
    #[inline]
    pub const fn new(w: u16, h: u16) -> ScreenDim {
        ScreenDim(w as u32 | (h as u32) << 16)
    }
}

/// Texture coordinate word. The upper half carries a CLUT or texture page
/// depending on the vertex it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct TexCoord(pub Word);

impl TexCoord {
    #[inline]
    pub const fn new(u: u8, v: u8) -> TexCoord {
        TexCoord(u as u32 | (v as u32) << 8)
    }

    #[inline]
    pub const fn with_upper(self, upper: u16) -> TexCoord {
        TexCoord((self.0 & 0xFFFF) | (upper as u32) << 16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SemiMode {
    Blend = 0,
    Add = 1,
    Sub = 2,
    AddQuarter = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum BitDepth {
    Bit4 = 0,
    Bit8 = 1,
    Bit15 = 2,
}

/// Texture page attribute: VRAM x / 64, y / 256, blend mode, colour depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TexPage(pub u16);

impl TexPage {
    pub const fn new(x: u16, y: u16, semi: SemiMode, depth: BitDepth) -> TexPage {
        TexPage((x & 0xF) | (y & 1) << 4 | (semi as u16) << 5 | (depth as u16) << 7)
    }
}

/// CLUT attribute: VRAM x / 16, y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Clut(pub u16);

impl Clut {
    pub const fn new(x: u16, y: u16) -> Clut {
        Clut((x & 0x3F) | (y & 0x1FF) << 6)
    }
}

/// Shared setters for packets whose first word is `code | colour`.
macro_rules! colored_packet {
    ($name:ident, $op:expr) => {
        impl Default for $name {
            fn default() -> Self {
                // SAFETY: all-zero words are a valid packet body.
                let mut packet: Self = unsafe { core::mem::zeroed() };
                packet.code = command($op);
                packet
            }
        }

        // SAFETY: `#[repr(C)]`, word fields only, command word first.
        unsafe impl Packet for $name {}

        impl $name {
            #[inline]
            pub fn set_color(&mut self, color: Color) {
                self.code = (self.code & 0xFF00_0000) | (color.0 & 0x00FF_FFFF);
            }

            #[inline]
            pub fn set_semi(&mut self, semi: bool) {
                self.set_flag(op::SEMI, semi);
            }

            #[inline]
            pub fn set_raw(&mut self, raw: bool) {
                self.set_flag(op::RAW, raw);
            }

            #[inline]
            fn set_flag(&mut self, flag: u32, on: bool) {
                if on {
                    self.code |= command(flag);
                } else {
                    self.code &= !command(flag);
                }
            }

            #[inline]
            pub fn code(&self) -> Word {
                self.code
            }
        }
    };
}

/// Flat-shaded triangle.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PolyF3 {
    code: Word,
    pub v0: ScreenCoord,
    pub v1: ScreenCoord,
    pub v2: ScreenCoord,
}
colored_packet!(PolyF3, op::POLY);

/// Flat-shaded quad.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PolyF4 {
    code: Word,
    pub v0: ScreenCoord,
    pub v1: ScreenCoord,
    pub v2: ScreenCoord,
    pub v3: ScreenCoord,
}
colored_packet!(PolyF4, op::POLY | op::POLY_QUAD);

/// Gouraud-shaded triangle. The first colour lives in the command word.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PolyG3 {
    code: Word,
    pub v0: ScreenCoord,
    pub c1: Color,
    pub v1: ScreenCoord,
    pub c2: Color,
    pub v2: ScreenCoord,
}
colored_packet!(PolyG3, op::POLY | op::POLY_GOURAUD);

/// Gouraud-shaded quad.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PolyG4 {
    code: Word,
    pub v0: ScreenCoord,
    pub c1: Color,
    pub v1: ScreenCoord,
    pub c2: Color,
    pub v2: ScreenCoord,
    pub c3: Color,
    pub v3: ScreenCoord,
}
colored_packet!(PolyG4, op::POLY | op::POLY_GOURAUD | op::POLY_QUAD);

/// Flat-shaded textured quad.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PolyFT4 {
    code: Word,
    pub v0: ScreenCoord,
    pub uv0: TexCoord,
    pub v1: ScreenCoord,
    pub uv1: TexCoord,
    pub v2: ScreenCoord,
    pub uv2: TexCoord,
    pub v3: ScreenCoord,
    pub uv3: TexCoord,
}
colored_packet!(PolyFT4, op::POLY | op::POLY_QUAD | op::POLY_TEXTURED);

impl PolyFT4 {
    pub fn set_clut(&mut self, clut: Clut) {
        self.uv0 = self.uv0.with_upper(clut.0);
    }

    pub fn set_tpage(&mut self, tpage: TexPage) {
        self.uv1 = self.uv1.with_upper(tpage.0);
    }
}

/// Variable-size untextured rectangle.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Tile {
    code: Word,
    pub xy: ScreenCoord,
    pub wh: ScreenDim,
}
colored_packet!(Tile, op::RECT);

/// Variable-size textured rectangle.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Sprite {
    code: Word,
    pub xy: ScreenCoord,
    pub uv: TexCoord,
    pub wh: ScreenDim,
}
colored_packet!(Sprite, op::RECT | op::RECT_TEXTURED);

impl Sprite {
    pub fn set_clut(&mut self, clut: Clut) {
        self.uv = self.uv.with_upper(clut.0);
    }
}

/// 8x8 textured rectangle.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Sprite8 {
    code: Word,
    pub xy: ScreenCoord,
    pub uv: TexCoord,
}
colored_packet!(Sprite8, op::RECT | op::RECT_8X8 | op::RECT_TEXTURED);

/// VRAM fill. Ignores the drawing area and the draw offset.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FillRect {
    code: Word,
    pub xy: ScreenCoord,
    pub wh: ScreenDim,
}
colored_packet!(FillRect, op::FILL_VRAM);

/// Draw mode (`E1`) setting.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawMode {
    pub mode: Word,
}

impl DrawMode {
    pub const fn new(tpage: TexPage, dither: bool, draw_to_display: bool) -> DrawMode {
        DrawMode {
            mode: command(op::DRAW_MODE)
                | (tpage.0 as u32 & 0x1FF)
                | (dither as u32) << 9
                | (draw_to_display as u32) << 10,
        }
    }
}

impl Default for DrawMode {
    fn default() -> Self {
        DrawMode { mode: command(op::DRAW_MODE) }
    }
}

// SAFETY: one command word.
unsafe impl Packet for DrawMode {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packets_start_with_their_command() {
        assert_eq!(PolyF3::default().code(), 0x2000_0000);
        assert_eq!(PolyG4::default().code(), 0x3800_0000);
        assert_eq!(PolyFT4::default().code(), 0x2C00_0000);
        assert_eq!(Sprite8::default().code(), 0x7400_0000);
        assert_eq!(FillRect::default().code(), 0x0200_0000);
        assert_eq!(words(&PolyG4::default()).len(), 8);
        assert_eq!(words(&PolyFT4::default()).len(), 9);
    }

    #[test]
    fn colour_and_flags_share_the_command_word() {
        let mut tile = Tile::default();
        tile.set_color(Color::new(0x11, 0x22, 0x33));
        tile.set_semi(true);
        assert_eq!(tile.code(), 0x6233_2211);
        tile.set_semi(false);
        tile.set_raw(true);
        assert_eq!(tile.code(), 0x6133_2211);
        tile.set_color(Color::BLACK);
        assert_eq!(tile.code(), 0x6100_0000);
    }

    #[test]
    fn coordinates_pack_signed_halves() {
        assert_eq!(ScreenCoord::new(-1, 2).0, 0x0002_FFFF);
        assert_eq!(ScreenDim::new(320, 240).0, 0x00F0_0140);
        assert_eq!(Tag::new(0x8012_3454, 4).0, 0x0412_3454);
        assert!(Tag::END.is_end());
        assert_eq!(TexPage::new(15, 0, SemiMode::Blend, BitDepth::Bit4).0, 15);
        assert_eq!(Clut::new(62, 0).0, 62);
    }
}
