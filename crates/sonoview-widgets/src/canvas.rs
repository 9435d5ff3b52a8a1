//! Drawing surface abstraction
//!
//! Views and layers draw through the [`Canvas`] trait only. [`Bitmap`] is
//! the owned implementation used for view caches, the overview and image
//! export: an RGBA pixel buffer plus a list of text runs (glyph rasterising
//! is left to whatever finally presents the bitmap).
//!
//! ## Coordinates
//!
//! Integer pixels, origin top-left. A [`Rect`] spans
//! `[x, x + width) x [y, y + height)`. Every drawing call is clipped to the
//! canvas bounds and to the current clip rect.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use bytemuck::{Pod, Zeroable};

/// 8-bit RGBA colour (straight alpha)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// From `0xRRGGBB`
    pub const fn from_hex(hex: u32) -> Self {
        Self::rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 255
    }

    /// Linear mix towards `other`, `t` in `0..=1`
    pub fn mix(self, other: Color, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Self::rgba(
            lerp(self.r, other.r),
            lerp(self.g, other.g),
            lerp(self.b, other.b),
            lerp(self.a, other.a),
        )
    }

    /// Composite `self` over `dst`
    pub fn blend_over(self, dst: Color) -> Color {
        match self.a {
            255 => self,
            0 => dst,
            a => {
                let a = a as u32;
                let inv = 255 - a;
                let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * inv + 127) / 255) as u8;
                Color {
                    r: mix(self.r, dst.r),
                    g: mix(self.g, dst.g),
                    b: mix(self.b, dst.b),
                    a: (a + (dst.a as u32 * inv + 127) / 255).min(255) as u8,
                }
            }
        }
    }
}

/// Axis-aligned pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Exclusive right edge
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 || y1 <= y0 {
            Rect::default()
        } else {
            Rect::new(x0, y0, x1 - x0, y1 - y0)
        }
    }

    /// Bounding rect of both; an empty rect contributes nothing
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// Fixed-advance text metrics derived from a point size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMetrics {
    pub advance: i32,
    pub ascent: i32,
    pub height: i32,
}

impl TextMetrics {
    pub fn for_font_size(font_size: u32) -> Self {
        let size = font_size.max(4) as i32;
        Self {
            advance: (size * 6 + 5) / 10,
            ascent: size,
            height: size + size / 4 + 1,
        }
    }

    pub fn width(&self, text: &str) -> i32 {
        text.chars().count() as i32 * self.advance
    }
}

/// Text placed on a bitmap, anchored at its top-left corner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub x: i32,
    pub y: i32,
    pub text: String,
    pub color: Color,
}

/// Everything views and layers draw onto
pub trait Canvas {
    fn width(&self) -> i32;

    fn height(&self) -> i32;

    /// Current clip, already intersected with the bounds
    fn clip(&self) -> Rect;

    /// Restrict drawing to `clip`, or to the whole canvas with `None`
    fn set_clip(&mut self, clip: Option<Rect>);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Color);

    /// Copy `src` of `image` so that its top-left lands on `(dx, dy)`
    fn draw_image_region(&mut self, image: &Bitmap, src: Rect, dx: i32, dy: i32);

    fn bounds(&self) -> Rect {
        Rect::from_size(self.width(), self.height())
    }

    fn draw_point(&mut self, x: i32, y: i32, color: Color) {
        self.fill_rect(Rect::new(x, y, 1, 1), color);
    }

    /// Bresenham line including both end points
    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Color) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);
        loop {
            self.draw_point(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Outline of `rect`, one pixel wide, inside its bounds
    fn draw_rect_outline(&mut self, rect: Rect, color: Color) {
        if rect.is_empty() {
            return;
        }
        let (x0, y0) = (rect.x, rect.y);
        let (x1, y1) = (rect.right() - 1, rect.bottom() - 1);
        self.draw_line(x0, y0, x1, y0, color);
        self.draw_line(x0, y1, x1, y1, color);
        self.draw_line(x0, y0, x0, y1, color);
        self.draw_line(x1, y0, x1, y1, color);
    }
}

/// Owned RGBA image
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    width: i32,
    height: i32,
    pixels: Vec<Color>,
    text: Vec<TextRun>,
    clip: Option<Rect>,
}

impl Bitmap {
    pub fn new(width: i32, height: i32, fill: Color) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            pixels: vec![fill; (width * height) as usize],
            text: Vec::new(),
            clip: None,
        }
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[(y * self.width + x) as usize])
    }

    pub fn text_runs(&self) -> &[TextRun] {
        &self.text
    }

    /// Pixels of one column, top to bottom
    pub fn column(&self, x: i32) -> Vec<Color> {
        (0..self.height).filter_map(|y| self.pixel(x, y)).collect()
    }

    /// Raw RGBA bytes
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Shift the whole image horizontally by `dx` pixels
    ///
    /// Positive `dx` moves content right. The exposed strip keeps stale
    /// pixels and must be repainted by the caller. Text runs move along and
    /// are dropped once their anchor leaves the image.
    pub fn scroll_horizontal(&mut self, dx: i32) {
        if dx == 0 || self.width == 0 {
            return;
        }
        let w = self.width as usize;
        let shift = dx.unsigned_abs() as usize;
        if shift >= w {
            return;
        }
        for row in self.pixels.chunks_mut(w) {
            if dx > 0 {
                row.copy_within(0..w - shift, shift);
            } else {
                row.copy_within(shift..w, 0);
            }
        }
        let width = self.width;
        self.text.retain_mut(|run| {
            run.x += dx;
            run.x >= 0 && run.x < width
        });
    }

    /// Write as binary PPM (alpha dropped)
    pub fn write_ppm(&self, path: &Path) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        let mut row = Vec::with_capacity(self.width as usize * 3);
        for line in self.pixels.chunks(self.width.max(1) as usize) {
            row.clear();
            for px in line {
                row.extend_from_slice(&[px.r, px.g, px.b]);
            }
            out.write_all(&row)?;
        }
        out.flush()
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        let idx = (y * self.width + x) as usize;
        self.pixels[idx] = color.blend_over(self.pixels[idx]);
    }
}

impl Canvas for Bitmap {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn clip(&self) -> Rect {
        let bounds = Rect::from_size(self.width, self.height);
        match self.clip {
            Some(c) => c.intersect(&bounds),
            None => bounds,
        }
    }

    fn set_clip(&mut self, clip: Option<Rect>) {
        self.clip = clip;
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let area = rect.intersect(&self.clip());
        if area.is_empty() || color.a == 0 {
            return;
        }
        for y in area.y..area.bottom() {
            let row = (y * self.width) as usize;
            for x in area.x..area.right() {
                let idx = row + x as usize;
                self.pixels[idx] = color.blend_over(self.pixels[idx]);
            }
        }
        if color.is_opaque() {
            self.text.retain(|run| !area.contains(run.x, run.y));
        }
    }

    fn draw_point(&mut self, x: i32, y: i32, color: Color) {
        if self.clip().contains(x, y) {
            self.set_pixel(x, y, color);
        }
    }

    fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Color) {
        if text.is_empty() || !self.clip().contains(x, y) {
            return;
        }
        self.text.push(TextRun {
            x,
            y,
            text: text.to_string(),
            color,
        });
    }

    fn draw_image_region(&mut self, image: &Bitmap, src: Rect, dx: i32, dy: i32) {
        let src = src.intersect(&Rect::from_size(image.width, image.height));
        let dest = src
            .translated(dx - src.x, dy - src.y)
            .intersect(&self.clip());
        if dest.is_empty() {
            return;
        }
        let (ox, oy) = (src.x - dx, src.y - dy);
        for y in dest.y..dest.bottom() {
            let from = ((y + oy) * image.width + dest.x + ox) as usize;
            let to = (y * self.width + dest.x) as usize;
            let n = dest.width as usize;
            self.pixels[to..to + n].copy_from_slice(&image.pixels[from..from + n]);
        }
        self.text.retain(|run| !dest.contains(run.x, run.y));
        for run in &image.text {
            let (x, y) = (run.x - ox, run.y - oy);
            if dest.contains(x, y) {
                self.text.push(TextRun {
                    x,
                    y,
                    ..run.clone()
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersect_and_union() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersect(&b), Rect::new(5, 5, 5, 5));
        assert_eq!(a.union(&b), Rect::new(0, 0, 15, 15));
        assert!(a.intersect(&Rect::new(20, 0, 5, 5)).is_empty());
        assert_eq!(Rect::default().union(&b), b);
    }

    #[test]
    fn test_alpha_blend() {
        let dst = Color::WHITE;
        let src = Color::rgba(0, 0, 0, 128);
        let out = src.blend_over(dst);
        assert_eq!(out.a, 255);
        assert!(out.r > 120 && out.r < 130);
        assert_eq!(Color::TRANSPARENT.blend_over(dst), dst);
    }

    #[test]
    fn test_fill_respects_clip() {
        let mut bmp = Bitmap::new(10, 4, Color::WHITE);
        bmp.set_clip(Some(Rect::new(2, 0, 3, 4)));
        bmp.fill_rect(Rect::from_size(10, 4), Color::BLACK);
        assert_eq!(bmp.pixel(1, 0), Some(Color::WHITE));
        assert_eq!(bmp.pixel(2, 0), Some(Color::BLACK));
        assert_eq!(bmp.pixel(4, 3), Some(Color::BLACK));
        assert_eq!(bmp.pixel(5, 3), Some(Color::WHITE));
    }

    #[test]
    fn test_draw_line_endpoints() {
        let mut bmp = Bitmap::new(8, 8, Color::WHITE);
        bmp.draw_line(1, 1, 6, 4, Color::BLACK);
        assert_eq!(bmp.pixel(1, 1), Some(Color::BLACK));
        assert_eq!(bmp.pixel(6, 4), Some(Color::BLACK));
        let count = bmp.pixels().iter().filter(|p| **p == Color::BLACK).count();
        assert_eq!(count, 6);
    }

    #[test]
    fn test_scroll_horizontal_moves_pixels_and_text() {
        let mut bmp = Bitmap::new(6, 1, Color::WHITE);
        bmp.draw_point(1, 0, Color::BLACK);
        bmp.draw_text(1, 0, "a", Color::BLACK);
        bmp.draw_text(5, 0, "b", Color::BLACK);

        bmp.scroll_horizontal(-1);
        assert_eq!(bmp.pixel(0, 0), Some(Color::BLACK));
        assert_eq!(bmp.text_runs().len(), 2);
        assert_eq!(bmp.text_runs()[0].x, 0);

        bmp.scroll_horizontal(2);
        assert_eq!(bmp.pixel(2, 0), Some(Color::BLACK));
        assert_eq!(bmp.text_runs().len(), 1);
        assert_eq!(bmp.text_runs()[0].text, "a");
    }

    #[test]
    fn test_draw_image_region_copies_offset() {
        let mut src = Bitmap::new(4, 4, Color::WHITE);
        src.draw_point(1, 1, Color::BLACK);
        src.draw_text(1, 2, "x", Color::BLACK);

        let mut dst = Bitmap::new(10, 10, Color::WHITE);
        dst.draw_image_region(&src, Rect::new(1, 1, 2, 2), 5, 6);
        assert_eq!(dst.pixel(5, 6), Some(Color::BLACK));
        assert_eq!(dst.pixel(6, 7), Some(Color::WHITE));
        assert_eq!(dst.text_runs()[0].x, 5);
        assert_eq!(dst.text_runs()[0].y, 7);
    }

    #[test]
    fn test_opaque_fill_removes_covered_text() {
        let mut bmp = Bitmap::new(10, 10, Color::WHITE);
        bmp.draw_text(2, 2, "hello", Color::BLACK);
        bmp.fill_rect(Rect::new(0, 0, 5, 5), Color::rgba(0, 0, 0, 10));
        assert_eq!(bmp.text_runs().len(), 1);
        bmp.fill_rect(Rect::new(0, 0, 5, 5), Color::WHITE);
        assert!(bmp.text_runs().is_empty());
    }

    #[test]
    fn test_write_ppm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ppm");
        let bmp = Bitmap::new(3, 2, Color::rgb(1, 2, 3));
        bmp.write_ppm(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let header = b"P6\n3 2\n255\n";
        assert_eq!(&bytes[..header.len()], header);
        assert_eq!(bytes.len(), header.len() + 3 * 2 * 3);
        assert_eq!(&bytes[header.len()..header.len() + 3], &[1, 2, 3]);
    }
}
