use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::foundation::core::{Argb, PREMULTIPLIED_ALPHA};
use crate::foundation::error::{PaintError, PaintResult};
use crate::foundation::math::premultiply;
use crate::render::buffer::RasterBuffer;

/// Source of glyph images laid out side by side in a single strip.
///
/// The rasterizer blits each glyph as a sub-rectangle of [`GlyphSource::strip`] and advances by
/// the glyph width plus [`GlyphSource::kerning`].
pub trait GlyphSource: fmt::Debug + Send + Sync {
    /// Index of the glyph used for `ch`. Unknown characters map to a fallback glyph.
    fn glyph_index(&self, ch: char) -> usize;

    /// `(x, width)` of the glyph within the strip.
    fn glyph_span(&self, index: usize) -> (i32, i32);

    /// Extra advance between two adjacent glyphs, tracking included.
    fn kerning(&self, left: usize, right: usize) -> i32;

    fn height(&self) -> i32;

    fn strip(&self) -> &RasterBuffer;

    /// Glyph width of `ch`, without tracking or kerning.
    fn char_width(&self, ch: char) -> i32 {
        self.glyph_span(self.glyph_index(ch)).1
    }

    /// Total advance of `s`, kerning and tracking between glyphs included.
    fn string_width(&self, s: &str) -> i32 {
        let mut width = 0;
        let mut last: Option<usize> = None;
        for ch in s.chars() {
            let index = self.glyph_index(ch);
            if let Some(prev) = last {
                width += self.kerning(prev, index);
            }
            width += self.glyph_span(index).1;
            last = Some(index);
        }
        width
    }
}

/// Bitmap font covering a contiguous character range.
///
/// Fonts whose last character sorts before `'a'` are uppercase-only: lowercase input is
/// folded before lookup.
#[derive(Debug, Clone)]
pub struct BitmapFont {
    strip: Arc<RasterBuffer>,
    first_char: char,
    last_char: char,
    positions: Vec<i32>,
    uppercase_only: bool,
    tracking: i32,
    kerning_left: Vec<i32>,
    kerning_right: Vec<i32>,
}

impl BitmapFont {
    /// `positions` holds one strip x offset per glyph plus the end offset of the last glyph.
    pub fn new(
        strip: RasterBuffer,
        first_char: char,
        last_char: char,
        positions: Vec<i32>,
        tracking: i32,
    ) -> PaintResult<Self> {
        if last_char < first_char {
            return Err(PaintError::validation(format!(
                "font range {first_char:?}..={last_char:?} is empty"
            )));
        }
        let glyphs = (last_char as usize) - (first_char as usize) + 1;
        if positions.len() != glyphs + 1 {
            return Err(PaintError::validation(format!(
                "font has {glyphs} glyphs but {} positions",
                positions.len()
            )));
        }
        if positions.windows(2).any(|w| w[1] < w[0]) || positions.first().is_some_and(|&p| p < 0)
        {
            return Err(PaintError::validation("glyph positions must be non-decreasing"));
        }
        if positions.last().is_some_and(|&p| p > strip.width()) {
            return Err(PaintError::validation("glyph positions exceed the strip width"));
        }
        Ok(Self::from_parts(strip, first_char, last_char, positions, tracking))
    }

    fn from_parts(
        strip: RasterBuffer,
        first_char: char,
        last_char: char,
        positions: Vec<i32>,
        tracking: i32,
    ) -> Self {
        let glyphs = positions.len().saturating_sub(1);
        Self {
            strip: Arc::new(strip),
            first_char,
            last_char,
            positions,
            uppercase_only: last_char < 'a',
            tracking,
            kerning_left: vec![0; glyphs],
            kerning_right: vec![0; glyphs],
        }
    }

    /// Per-glyph kerning applied on the left and right side of each glyph.
    pub fn with_kerning(mut self, left: Vec<i32>, right: Vec<i32>) -> PaintResult<Self> {
        let glyphs = self.positions.len() - 1;
        if left.len() != glyphs || right.len() != glyphs {
            return Err(PaintError::validation(format!(
                "kerning tables must have {glyphs} entries"
            )));
        }
        self.kerning_left = left;
        self.kerning_right = right;
        Ok(self)
    }

    pub fn first_char(&self) -> char {
        self.first_char
    }

    pub fn last_char(&self) -> char {
        self.last_char
    }

    pub fn tracking(&self) -> i32 {
        self.tracking
    }

    pub fn is_uppercase_only(&self) -> bool {
        self.uppercase_only
    }

    fn fold(&self, ch: char) -> char {
        if self.uppercase_only && ch.is_ascii_lowercase() {
            ch.to_ascii_uppercase()
        } else {
            ch
        }
    }

    /// `true` when `ch` maps to a non-empty glyph of its own.
    pub fn can_display(&self, ch: char) -> bool {
        let ch = self.fold(ch);
        if ch < self.first_char || ch > self.last_char {
            return false;
        }
        let (_, w) = self.glyph_span((ch as usize) - (self.first_char as usize));
        w > 0
    }

    /// A copy whose glyph pixels take `rgb` while keeping their coverage.
    pub fn tint(&self, rgb: Argb) -> Self {
        let mut strip = self.strip.deep_clone();
        for p in strip.pixels_mut() {
            let a = *p >> 24;
            let straight = (a << 24) | (rgb & 0x00ff_ffff);
            *p = if a == 0 {
                0
            } else if PREMULTIPLIED_ALPHA {
                premultiply(straight)
            } else {
                straight
            };
        }
        Self {
            strip: Arc::new(strip),
            ..self.clone()
        }
    }
}

impl GlyphSource for BitmapFont {
    fn glyph_index(&self, ch: char) -> usize {
        let mut ch = self.fold(ch);
        if ch < self.first_char || ch > self.last_char {
            ch = self.last_char;
        }
        (ch as usize) - (self.first_char as usize)
    }

    fn glyph_span(&self, index: usize) -> (i32, i32) {
        match (self.positions.get(index), self.positions.get(index + 1)) {
            (Some(&start), Some(&end)) => (start, end - start),
            _ => (0, 0),
        }
    }

    fn kerning(&self, left: usize, right: usize) -> i32 {
        let r = self.kerning_right.get(left).copied().unwrap_or(0);
        let l = self.kerning_left.get(right).copied().unwrap_or(0);
        r + self.tracking + l
    }

    fn height(&self) -> i32 {
        self.strip.height()
    }

    fn strip(&self) -> &RasterBuffer {
        &self.strip
    }
}

const BUILTIN_FIRST: char = ' ';
const BUILTIN_LAST: char = 'Z';
const BUILTIN_GLYPH_W: i32 = 3;
const BUILTIN_GLYPH_H: i32 = 5;

// One 3x5 glyph per character from ' ' to 'Z', row-major, top-left pixel in bit 14.
const BUILTIN_GLYPHS: [u16; 59] = [
    0x0000, 0x2482, 0x5a00, 0x5f7d, 0x3c9e, 0x52a5, 0x2aab, 0x2400,
    0x1491, 0x4494, 0x0aa8, 0x05d0, 0x0014, 0x01c0, 0x0002, 0x12a4,
    0x7b6f, 0x2c97, 0x73e7, 0x72cf, 0x5bc9, 0x79cf, 0x79ef, 0x7292,
    0x7bef, 0x7bcf, 0x0410, 0x0414, 0x1511, 0x0e38, 0x4454, 0x6282,
    0x2be3, 0x2bed, 0x6bae, 0x3923, 0x6b6e, 0x79a7, 0x79a4, 0x396b,
    0x5bed, 0x7497, 0x126a, 0x5bad, 0x4927, 0x5fed, 0x6b6d, 0x2b6a,
    0x6ba4, 0x2b73, 0x6bad, 0x388e, 0x7492, 0x5b6f, 0x5b6a, 0x5bfd,
    0x5aad, 0x5a92, 0x72a7,
];

/// The built-in uppercase 3x5 font: white glyphs, one pixel of tracking.
pub fn builtin_font() -> BitmapFont {
    let n = BUILTIN_GLYPHS.len() as i32;
    let mut strip = RasterBuffer::new((n * BUILTIN_GLYPH_W) as u32, BUILTIN_GLYPH_H as u32);
    for (i, bits) in BUILTIN_GLYPHS.iter().enumerate() {
        let x0 = i as i32 * BUILTIN_GLYPH_W;
        for row in 0..BUILTIN_GLYPH_H {
            for col in 0..BUILTIN_GLYPH_W {
                let bit = 14 - (row * BUILTIN_GLYPH_W + col);
                if (bits >> bit) & 1 == 1 {
                    strip.set_pixel(x0 + col, row, 0xffff_ffff);
                }
            }
        }
    }
    let positions = (0..=n).map(|i| i * BUILTIN_GLYPH_W).collect();
    BitmapFont::from_parts(strip, BUILTIN_FIRST, BUILTIN_LAST, positions, 1)
}

/// Named fonts plus a lazily built default.
#[derive(Debug, Default)]
pub struct FontRegistry {
    default_font: OnceLock<Arc<dyn GlyphSource>>,
    fonts: HashMap<String, Arc<dyn GlyphSource>>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in font, constructed on first use.
    pub fn default_font(&self) -> Arc<dyn GlyphSource> {
        Arc::clone(self.default_font.get_or_init(|| {
            tracing::debug!("building default bitmap font");
            Arc::new(builtin_font())
        }))
    }

    pub fn register(&mut self, name: impl Into<String>, font: Arc<dyn GlyphSource>) {
        self.fonts.insert(name.into(), font);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn GlyphSource>> {
        self.fonts.get(name).cloned()
    }

    /// Looks up `name`, falling back to the default font when it is absent or unknown.
    pub fn resolve(&self, name: Option<&str>) -> Arc<dyn GlyphSource> {
        match name {
            None => self.default_font(),
            Some(n) => self.get(n).unwrap_or_else(|| {
                tracing::debug!(font = n, "unknown font, using default");
                self.default_font()
            }),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/text/font.rs"]
mod tests;
