//! Monochrome framebuffer.
use std::fmt;

use crate::constants::*;

/// Display resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// 64x32, the original Chip-8 display.
    Low,
    /// 128x64, the extended display mode.
    High,
}

impl Resolution {
    #[inline]
    pub fn size(self) -> [usize; 2] {
        match self {
            Self::Low => [DISPLAY_WIDTH, DISPLAY_HEIGHT],
            Self::High => [HIRES_DISPLAY_WIDTH, HIRES_DISPLAY_HEIGHT],
        }
    }
}

/// Screen buffer that sprites are drawn to.
///
/// Pixels are stored row major. All coordinates wrap around the edges.
pub struct Framebuffer {
    resolution: Resolution,
    width: usize,
    height: usize,
    pixels: Vec<bool>,
    /// Set whenever the pixels change, so observers only copy fresh frames.
    dirty: bool,
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new(Resolution::Low)
    }
}

impl Framebuffer {
    pub fn new(resolution: Resolution) -> Self {
        let [width, height] = resolution.size();
        Self {
            resolution,
            width,
            height,
            pixels: vec![false; width * height],
            dirty: true,
        }
    }

    #[cfg(test)]
    pub fn width(&self) -> usize {
        self.width
    }

    #[cfg(test)]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline(always)]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    #[cfg(test)]
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[self.index(x, y)]
    }

    #[inline(always)]
    fn index(&self, x: usize, y: usize) -> usize {
        (x % self.width) + (y % self.height) * self.width
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
        self.dirty = true;
    }

    /// XOR one sprite row onto the screen, most significant bit leftmost.
    ///
    /// Returns `true` if any pixel was switched off, which is a collision.
    pub fn draw(&mut self, x: usize, y: usize, row: u8) -> bool {
        let mut is_erased = false;

        for c in 0..SPRITE_WIDTH {
            if (row >> (7 - c)) & 1 == 0 {
                // Zero bits leave the screen untouched.
                continue;
            }

            let d = self.index(x + c, y);
            let old_px = self.pixels[d];

            // XOR erases a pixel when both the old and new values are both 1.
            is_erased |= old_px;
            self.pixels[d] = !old_px;
        }

        self.dirty = true;
        is_erased
    }

    /// Draw a 16x16 sprite, given as two bytes per row.
    ///
    /// Collision is reported if any of the 32 row halves erased a pixel.
    pub fn draw_extended(&mut self, x: usize, y: usize, sprite: &[u8]) -> bool {
        let mut is_erased = false;

        for (r, halves) in sprite
            .chunks_exact(2)
            .take(EXTENDED_SPRITE_SIZE)
            .enumerate()
        {
            is_erased |= self.draw(x, y + r, halves[0]);
            is_erased |= self.draw(x + SPRITE_WIDTH, y + r, halves[1]);
        }

        is_erased
    }

    /// Shift every line down by `amount`, wrapping the bottom lines to the top.
    pub fn scroll_down(&mut self, amount: usize) {
        let shift = (amount % self.height) * self.width;
        self.pixels.rotate_right(shift);
        self.dirty = true;
    }

    /// Shift every column right by `amount`, wrapping around the right edge.
    pub fn scroll_right(&mut self, amount: usize) {
        let shift = amount % self.width;
        for line in self.pixels.chunks_exact_mut(self.width) {
            line.rotate_right(shift);
        }
        self.dirty = true;
    }

    /// Shift every column left by `amount`, wrapping around the left edge.
    pub fn scroll_left(&mut self, amount: usize) {
        let amount = amount % self.width;
        self.scroll_right(self.width - amount);
    }

    /// Switch to 64x32. Reallocates and clears the screen.
    pub fn set_low_res(&mut self) {
        *self = Self::new(Resolution::Low);
    }

    /// Switch to 128x64. Reallocates and clears the screen.
    pub fn set_high_res(&mut self) {
        *self = Self::new(Resolution::High);
    }

    /// Returns `true` once after the pixels changed.
    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// Copy of the current screen contents.
    pub fn view(&self) -> FrameView {
        FrameView {
            width: self.width,
            height: self.height,
            pixels: self.pixels.clone(),
        }
    }
}

/// Read only snapshot of the framebuffer, handed to renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameView {
    pub width: usize,
    pub height: usize,
    /// Row major pixels, `width * height` long.
    pub pixels: Vec<bool>,
}

impl Default for FrameView {
    fn default() -> Self {
        Framebuffer::default().view()
    }
}

impl FrameView {
    /// Pixel at the given coordinates, wrapping around the edges like drawing does.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[(x % self.width) + (y % self.height) * self.width]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.pixels.chunks_exact(self.width)
    }

    /// Number of lit pixels.
    pub fn lit(&self) -> usize {
        self.pixels.iter().filter(|px| **px).count()
    }
}

impl fmt::Display for FrameView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            for px in row {
                f.write_str(if *px { "#" } else { "." })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Booleans must be cast to u8 1 or 0
    #[test]
    fn test_assert_bool_cast() {
        assert_eq!(true as u8, 1);
        assert_eq!(false as u8, 0);
    }

    #[test]
    fn test_draw_collision() {
        let mut fb = Framebuffer::default();

        assert!(!fb.draw(0, 0, 0xFF));
        assert!((0..8).all(|x| fb.pixel(x, 0)));

        assert!(fb.draw(0, 0, 0xFF));
        assert!((0..8).all(|x| !fb.pixel(x, 0)));
    }

    #[test]
    fn test_zero_bits_do_not_erase() {
        let mut fb = Framebuffer::default();

        // ____####
        assert!(!fb.draw(4, 0, 0b1111_0000));
        // ########
        assert!(!fb.draw(0, 0, 0b1111_0000));

        assert!(fb.pixel(0, 0));
        assert!(fb.pixel(4, 0));
        assert!(!fb.pixel(8, 0));
    }

    #[test]
    fn test_draw_wraps() {
        let mut fb = Framebuffer::default();
        fb.draw(60, 33, 0b1010_1010);

        assert!(fb.pixel(60, 1));
        assert!(!fb.pixel(61, 1));
        assert!(fb.pixel(62, 1));
        // Wrapped around the right edge.
        assert!(fb.pixel(0, 1));
        assert!(fb.pixel(2, 1));
        assert!(!fb.pixel(3, 1));
    }

    #[test]
    fn test_draw_extended() {
        let mut fb = Framebuffer::new(Resolution::High);
        let sprite = [0xFF; 32];

        assert!(!fb.draw_extended(0, 0, &sprite));
        assert_eq!(fb.view().lit(), 256);
        assert!(fb.draw_extended(0, 0, &sprite));
        assert_eq!(fb.view().lit(), 0);

        // A single overlapping half is enough for a collision.
        fb.draw(8, 15, 0x01);
        assert!(fb.draw_extended(0, 0, &sprite));
    }

    #[test]
    fn test_scroll_down_wraps() {
        let mut fb = Framebuffer::default();
        fb.draw(0, 0, 0x80);
        fb.draw(5, 31, 0x80);

        fb.scroll_down(2);
        assert!(fb.pixel(0, 2));
        assert!(fb.pixel(5, 1));
        assert_eq!(fb.view().lit(), 2);
    }

    #[test]
    fn test_scroll_horizontal() {
        let mut fb = Framebuffer::default();
        fb.draw(0, 3, 0x80);
        fb.draw(62, 4, 0x80);

        fb.scroll_right(4);
        assert!(fb.pixel(4, 3));
        assert!(fb.pixel(2, 4));

        fb.scroll_left(4);
        assert!(fb.pixel(0, 3));
        assert!(fb.pixel(62, 4));

        fb.scroll_left(4);
        assert!(fb.pixel(60, 3));
        assert_eq!(fb.view().lit(), 2);
    }

    #[test]
    fn test_resolution_switch_clears() {
        let mut fb = Framebuffer::default();
        fb.draw(0, 0, 0xFF);

        fb.set_high_res();
        assert_eq!((fb.width(), fb.height()), (128, 64));
        assert_eq!(fb.resolution(), Resolution::High);
        assert_eq!(fb.view().lit(), 0);

        fb.draw(127, 63, 0x80);
        fb.set_low_res();
        assert_eq!((fb.width(), fb.height()), (64, 32));
        assert_eq!(fb.view().pixels.len(), DISPLAY_WIDTH * DISPLAY_HEIGHT);
        assert_eq!(fb.view().lit(), 0);
    }

    #[test]
    fn test_dirty_flag() {
        let mut fb = Framebuffer::default();
        assert!(fb.take_dirty());
        assert!(!fb.take_dirty());
        fb.draw(0, 0, 0);
        assert!(fb.take_dirty());
    }

    #[test]
    fn test_view_pixel_wraps() {
        let mut fb = Framebuffer::default();
        fb.draw(0, 0, 0x80);
        fb.draw(1, 1, 0x80);
        let view = fb.view();

        assert!(view.pixel(DISPLAY_WIDTH, DISPLAY_HEIGHT));
        assert!(view.pixel(1 + DISPLAY_WIDTH, 1));
        // Past the right edge is the same row, not the next one.
        assert!(!view.pixel(DISPLAY_WIDTH + 1, 0));
        assert!(!view.pixel(3, DISPLAY_HEIGHT * 2 + 5));
    }

    #[test]
    fn test_view_display() {
        let mut fb = Framebuffer::default();
        fb.draw(0, 0, 0xC0);
        let text = fb.view().to_string();
        let first = text.lines().next().unwrap();
        assert_eq!(first.len(), DISPLAY_WIDTH);
        assert!(first.starts_with("##."));
        assert_eq!(text.lines().count(), DISPLAY_HEIGHT);
    }
}
