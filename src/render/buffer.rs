use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::foundation::core::{Argb, PREMULTIPLIED_ALPHA};
use crate::foundation::error::{PaintError, PaintResult};
use crate::foundation::math::{Fnv1a64, premultiply, unpremultiply};

/// 32-bit ARGB pixel buffer in the build-wide alpha convention.
///
/// Cloning via [`RasterBuffer::share`] produces a view onto the same pixels; the first write
/// through either handle copies the data first, so other holders never observe it.
/// [`RasterBuffer::deep_clone`] copies eagerly.
#[derive(Debug)]
pub struct RasterBuffer {
    width: i32,
    height: i32,
    opaque: bool,
    hotspot: (i32, i32),
    data: Arc<Vec<Argb>>,
}

impl RasterBuffer {
    /// Transparent buffer. Zero-sized buffers are allowed and draw nothing.
    pub fn new(width: u32, height: u32) -> Self {
        let w = width.min(i32::MAX as u32) as i32;
        let h = height.min(i32::MAX as u32) as i32;
        Self {
            width: w,
            height: h,
            opaque: false,
            hotspot: (0, 0),
            data: Arc::new(vec![0; (w as usize) * (h as usize)]),
        }
    }

    /// Opaque buffer filled with `color`.
    pub fn new_opaque(width: u32, height: u32, color: Argb) -> Self {
        let mut b = Self::new(width, height);
        b.clear(0xff00_0000 | color);
        b.opaque = true;
        b
    }

    /// Wraps existing pixels. `pixels.len()` must equal `width * height`.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Argb>, opaque: bool) -> PaintResult<Self> {
        let expected = (width as usize).saturating_mul(height as usize);
        if pixels.len() != expected {
            return Err(PaintError::validation(format!(
                "pixel count {} does not match {width}x{height}",
                pixels.len()
            )));
        }
        if width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(PaintError::validation("buffer dimensions exceed i32"));
        }
        Ok(Self {
            width: width as i32,
            height: height as i32,
            opaque,
            hotspot: (0, 0),
            data: Arc::new(pixels),
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// `true` when every pixel is known to have alpha 255.
    pub fn is_opaque(&self) -> bool {
        self.opaque
    }

    pub fn set_opaque(&mut self, opaque: bool) {
        self.opaque = opaque;
    }

    /// Recomputes the opacity flag from the pixel data.
    pub fn detect_opaque(&mut self) -> bool {
        self.opaque = self.data.iter().all(|&p| p >> 24 == 0xff);
        self.opaque
    }

    pub fn hotspot(&self) -> (i32, i32) {
        self.hotspot
    }

    pub fn set_hotspot(&mut self, x: i32, y: i32) {
        self.hotspot = (x, y);
    }

    pub fn pixels(&self) -> &[Argb] {
        &self.data
    }

    /// Mutable pixels, detaching from any shared view first.
    pub fn pixels_mut(&mut self) -> &mut [Argb] {
        Arc::make_mut(&mut self.data).as_mut_slice()
    }

    /// A view sharing the same pixels (copy-on-write).
    pub fn share(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            opaque: self.opaque,
            hotspot: self.hotspot,
            data: Arc::clone(&self.data),
        }
    }

    /// An independent copy.
    pub fn deep_clone(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            opaque: self.opaque,
            hotspot: self.hotspot,
            data: Arc::new(self.data.as_ref().clone()),
        }
    }

    /// `true` when both handles currently point at the same pixel storage.
    pub fn shares_pixels_with(&self, other: &RasterBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Option<Argb> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get((y as usize) * (self.width as usize) + (x as usize))
            .copied()
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Argb) {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return;
        }
        let idx = (y as usize) * (self.width as usize) + (x as usize);
        self.pixels_mut()[idx] = color;
    }

    /// Fills every pixel with `color`.
    pub fn clear(&mut self, color: Argb) {
        self.pixels_mut().fill(color);
    }

    /// Deterministic hash of dimensions and pixels.
    pub fn fingerprint(&self) -> u64 {
        let mut h = Fnv1a64::new_default();
        h.write_u32(self.width as u32);
        h.write_u32(self.height as u32);
        for &p in self.data.iter() {
            h.write_u32(p);
        }
        h.finish()
    }

    /// Converts a decoded straight-alpha RGBA image, premultiplying when the build uses
    /// premultiplied pixels.
    pub fn from_rgba_image(img: &image::RgbaImage) -> PaintResult<Self> {
        let (w, h) = img.dimensions();
        let mut opaque = true;
        let pixels: Vec<Argb> = img
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0;
                opaque &= a == 0xff;
                let straight = (u32::from(a) << 24)
                    | (u32::from(r) << 16)
                    | (u32::from(g) << 8)
                    | u32::from(b);
                if PREMULTIPLIED_ALPHA {
                    premultiply(straight)
                } else {
                    straight
                }
            })
            .collect();
        Self::from_pixels(w, h, pixels, opaque)
    }

    /// Straight-alpha RGBA copy of the buffer.
    pub fn to_rgba_image(&self) -> image::RgbaImage {
        let mut raw = Vec::with_capacity(self.data.len() * 4);
        for &p in self.data.iter() {
            let p = if PREMULTIPLIED_ALPHA { unpremultiply(p) } else { p };
            raw.extend_from_slice(&[(p >> 16) as u8, (p >> 8) as u8, p as u8, (p >> 24) as u8]);
        }
        image::RgbaImage::from_raw(self.width as u32, self.height as u32, raw)
            .unwrap_or_else(|| image::RgbaImage::new(self.width as u32, self.height as u32))
    }

    /// Decodes encoded image bytes (PNG or any format `image` was built with).
    pub fn decode(bytes: &[u8]) -> PaintResult<Self> {
        let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
        Self::from_rgba_image(&dyn_img.to_rgba8())
            .map_err(|e| PaintError::asset(format!("convert decoded image: {e}")))
    }

    pub fn load_png(path: &Path) -> PaintResult<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
        Self::decode(&bytes)
    }

    pub fn save_png(&self, path: &Path) -> PaintResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        self.to_rgba_image()
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/buffer.rs"]
mod tests;
