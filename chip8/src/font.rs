//! Built-in hexadecimal glyph tables.
use crate::constants::*;

pub const SMALL_FONT_LENGTH: usize = GLYPH_COUNT * SMALL_GLYPH_SIZE;
pub const LARGE_FONT_LENGTH: usize = GLYPH_COUNT * LARGE_GLYPH_SIZE;

/// Fonts are 5 bytes high, and packed together for historical reasons.
#[rustfmt::skip]
pub const SMALL_FONT: [u8; SMALL_FONT_LENGTH] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Extended glyphs are 8 pixels wide and 10 rows high.
#[rustfmt::skip]
pub const LARGE_FONT: [u8; LARGE_FONT_LENGTH] = [
    0xFF, 0xFF, 0xC3, 0xC3, 0xC3, 0xC3, 0xC3, 0xC3, 0xFF, 0xFF, // 0
    0x18, 0x78, 0x78, 0x18, 0x18, 0x18, 0x18, 0x18, 0xFF, 0xFF, // 1
    0xFF, 0xFF, 0x03, 0x03, 0xFF, 0xFF, 0xC0, 0xC0, 0xFF, 0xFF, // 2
    0xFF, 0xFF, 0x03, 0x03, 0xFF, 0xFF, 0x03, 0x03, 0xFF, 0xFF, // 3
    0xC3, 0xC3, 0xC3, 0xC3, 0xFF, 0xFF, 0x03, 0x03, 0x03, 0x03, // 4
    0xFF, 0xFF, 0xC0, 0xC0, 0xFF, 0xFF, 0x03, 0x03, 0xFF, 0xFF, // 5
    0xFF, 0xFF, 0xC0, 0xC0, 0xFF, 0xFF, 0xC3, 0xC3, 0xFF, 0xFF, // 6
    0xFF, 0xFF, 0x03, 0x03, 0x06, 0x0C, 0x18, 0x18, 0x18, 0x18, // 7
    0xFF, 0xFF, 0xC3, 0xC3, 0xFF, 0xFF, 0xC3, 0xC3, 0xFF, 0xFF, // 8
    0xFF, 0xFF, 0xC3, 0xC3, 0xFF, 0xFF, 0x03, 0x03, 0xFF, 0xFF, // 9
    0x7E, 0xFF, 0xC3, 0xC3, 0xC3, 0xFF, 0xFF, 0xC3, 0xC3, 0xC3, // A
    0xFC, 0xFC, 0xC3, 0xC3, 0xFC, 0xFC, 0xC3, 0xC3, 0xFC, 0xFC, // B
    0x3C, 0xFF, 0xC3, 0xC0, 0xC0, 0xC0, 0xC0, 0xC3, 0xFF, 0x3C, // C
    0xFC, 0xFE, 0xC3, 0xC3, 0xC3, 0xC3, 0xC3, 0xC3, 0xFE, 0xFC, // D
    0xFF, 0xFF, 0xC0, 0xC0, 0xFF, 0xFF, 0xC0, 0xC0, 0xFF, 0xFF, // E
    0xFF, 0xFF, 0xC0, 0xC0, 0xFF, 0xFF, 0xC0, 0xC0, 0xC0, 0xC0, // F
];

/// Address of the small glyph for the low nibble of `digit`.
#[inline]
pub fn small_glyph_address(digit: u8) -> usize {
    SMALL_FONT_ADDRESS + (digit & 0xF) as usize * SMALL_GLYPH_SIZE
}

/// Address of the large glyph for the low nibble of `digit`.
#[inline]
pub fn large_glyph_address(digit: u8) -> usize {
    LARGE_FONT_ADDRESS + (digit & 0xF) as usize * LARGE_GLYPH_SIZE
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_glyph_addresses() {
        assert_eq!(small_glyph_address(0x0), 0x00);
        assert_eq!(small_glyph_address(0xA), 50);
        // Only the low nibble selects a glyph.
        assert_eq!(small_glyph_address(0x1F), 75);

        assert_eq!(large_glyph_address(0x0), 0x50);
        assert_eq!(large_glyph_address(0x3), 0x50 + 30);
        assert_eq!(large_glyph_address(0xF), 0x50 + 150);
    }

    #[test]
    fn test_fonts_do_not_overlap_program() {
        assert!(SMALL_FONT_ADDRESS + SMALL_FONT_LENGTH <= LARGE_FONT_ADDRESS);
        assert!(LARGE_FONT_ADDRESS + LARGE_FONT_LENGTH <= MEM_START);
    }
}
