use crate::foundation::core::{Argb, PREMULTIPLIED_ALPHA};
use crate::foundation::math::{mul_div255, premultiply, unpremultiply};
use crate::render::buffer::RasterBuffer;

/// Largest accepted blur radius, in buffer pixels.
pub const MAX_RADIUS: u32 = 32;
/// Shadows offset further than this are cut off at the buffer edge.
pub const MAX_OFFSET: u32 = 256;

/// Image filter applied to a group's back buffer once its children are drawn.
///
/// Filters spread pixels past the group's box by [`Filter::extent`]; the back buffer carries
/// a transparent margin of that width on every side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    /// Gaussian blur.
    Blur { radius: u32 },
    /// Blurred copy of the alpha channel, tinted with `color` and drawn under the content at
    /// `(offset_x, offset_y)`.
    DropShadow {
        radius: u32,
        offset_x: i32,
        offset_y: i32,
        color: Argb,
    },
    /// The content plus an additive blurred copy of itself.
    Glow { radius: u32 },
}

impl Filter {
    /// Default shadow: 3 pixels down and right, black at half alpha.
    pub const DROP_SHADOW: Self = Self::DropShadow {
        radius: 3,
        offset_x: 3,
        offset_y: 3,
        color: 0x8000_0000,
    };

    pub fn radius(&self) -> u32 {
        let r = match *self {
            Self::Blur { radius } | Self::Glow { radius } | Self::DropShadow { radius, .. } => {
                radius
            }
        };
        r.min(MAX_RADIUS)
    }

    /// How far, in buffer pixels, the output may reach past the input on any side.
    pub fn extent(&self) -> i32 {
        let r = self.radius() as i32;
        match *self {
            Self::DropShadow {
                offset_x, offset_y, ..
            } => {
                let offset = offset_x.unsigned_abs().max(offset_y.unsigned_abs());
                r + offset.min(MAX_OFFSET) as i32
            }
            Self::Blur { .. } | Self::Glow { .. } => r,
        }
    }

    /// Filters `buffer` in place. The result at a pixel depends only on input pixels within
    /// [`Filter::extent`] of it.
    pub fn apply(&self, buffer: &mut RasterBuffer) {
        let (w, h) = (buffer.width() as usize, buffer.height() as usize);
        if w == 0 || h == 0 {
            return;
        }
        let radius = self.radius();
        let pixels = buffer.pixels_mut();
        if !PREMULTIPLIED_ALPHA {
            for p in pixels.iter_mut() {
                *p = premultiply(*p);
            }
        }

        match *self {
            Self::Blur { .. } => {
                let out = blur(pixels, w, h, radius);
                pixels.copy_from_slice(&out);
            }
            Self::Glow { .. } => {
                let halo = blur(pixels, w, h, radius);
                for (p, g) in pixels.iter_mut().zip(&halo) {
                    *p = add_channels(*p, *g);
                }
            }
            Self::DropShadow {
                offset_x,
                offset_y,
                color,
                ..
            } => {
                let mask: Vec<Argb> = pixels.iter().map(|p| p & 0xff00_0000).collect();
                let mask = blur(&mask, w, h, radius);
                let (rgb, alpha) = (color & 0x00ff_ffff, color >> 24);
                for y in 0..h {
                    for x in 0..w {
                        let sx = x as i64 - clamp_offset(offset_x);
                        let sy = y as i64 - clamp_offset(offset_y);
                        if sx < 0 || sy < 0 || sx >= w as i64 || sy >= h as i64 {
                            continue;
                        }
                        let a = mul_div255(alpha, mask[sy as usize * w + sx as usize] >> 24);
                        if a == 0 {
                            continue;
                        }
                        let shadow = premultiply((a << 24) | rgb);
                        let p = &mut pixels[y * w + x];
                        *p = over(*p, shadow);
                    }
                }
            }
        }

        if !PREMULTIPLIED_ALPHA {
            for p in pixels.iter_mut() {
                *p = unpremultiply(*p);
            }
        }
    }
}

/// Separable gaussian blur of premultiplied pixels, clamping reads to the buffer edge.
fn blur(src: &[Argb], w: usize, h: usize, radius: u32) -> Vec<Argb> {
    if radius == 0 {
        return src.to_vec();
    }
    let kernel = gaussian_kernel_q16(radius);
    let mut tmp = vec![0; src.len()];
    let mut out = vec![0; src.len()];
    convolve(src, &mut tmp, w, h, &kernel, 1, w);
    convolve(&tmp, &mut out, h, w, &kernel, w, 1);
    out
}

/// One pass along lines of `len` pixels `step` apart; `lines` lines start `line_step` apart.
fn convolve(
    src: &[Argb],
    dst: &mut [Argb],
    len: usize,
    lines: usize,
    k: &[u32],
    step: usize,
    line_step: usize,
) {
    let radius = (k.len() / 2) as i64;
    let last = len as i64 - 1;
    for line in 0..lines {
        let base = line * line_step;
        for i in 0..len {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let j = (i as i64 + ki as i64 - radius).clamp(0, last) as usize;
                let p = src[base + j * step];
                for (c, a) in acc.iter_mut().enumerate() {
                    *a += u64::from(kw) * u64::from((p >> (24 - 8 * c)) & 0xff);
                }
            }
            dst[base + i * step] = acc
                .iter()
                .enumerate()
                .fold(0, |px, (c, &a)| px | (q16_to_u8(a) << (24 - 8 * c)));
        }
    }
}

/// Normalized kernel in 16.16; the weights sum to exactly `1 << 16`.
fn gaussian_kernel_q16(radius: u32) -> Vec<u32> {
    let r = radius as i32;
    let sigma = (f64::from(radius) / 2.0).max(0.5);
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r)
        .map(|i| (-f64::from(i * i) / denom).exp())
        .collect();
    let sum: f64 = weights_f.iter().sum();

    let mut weights: Vec<u32> = weights_f
        .iter()
        .map(|wf| ((wf / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
        .collect();
    let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }
    weights
}

fn clamp_offset(offset: i32) -> i64 {
    let max = i64::from(MAX_OFFSET);
    i64::from(offset).clamp(-max, max)
}

fn q16_to_u8(acc: u64) -> u32 {
    (((acc + 32768) >> 16).min(255)) as u32
}

fn add_channels(a: Argb, b: Argb) -> Argb {
    (0..4).fold(0, |px, c| {
        let shift = 24 - 8 * c;
        let sum = (((a >> shift) & 0xff) + ((b >> shift) & 0xff)).min(255);
        px | (sum << shift)
    })
}

/// Premultiplied `src` over `dst`.
fn over(src: Argb, dst: Argb) -> Argb {
    let inv = 255 - (src >> 24);
    (0..4).fold(0, |px, c| {
        let shift = 24 - 8 * c;
        let v = ((src >> shift) & 0xff) + mul_div255((dst >> shift) & 0xff, inv);
        px | (v.min(255) << shift)
    })
}

#[cfg(test)]
#[path = "../../tests/unit/render/filter.rs"]
mod tests;
