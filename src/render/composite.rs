use crate::foundation::core::{Argb, IntRect, PREMULTIPLIED_ALPHA};
use crate::foundation::fixed::{Fixed, ONE};

/// Per-pixel blend kernel.
///
/// `extra` is an additional 0..=255 coverage applied on top of the source alpha. The `opaque`
/// entry points may assume the source alpha is 255. With premultiplied pixels they still
/// respect the destination alpha, so translucent back buffers composite correctly.
pub trait Compositor {
    fn blend_opaque(dst: Argb, src: Argb) -> Argb;
    fn blend_opaque_alpha(dst: Argb, src: Argb, extra: i32) -> Argb;
    fn blend(dst: Argb, src: Argb) -> Argb;
    fn blend_alpha(dst: Argb, src: Argb, extra: i32) -> Argb;
}

#[inline]
fn channels(p: Argb) -> (i32, i32, i32, i32) {
    (
        (p >> 24) as i32,
        ((p >> 16) & 0xff) as i32,
        ((p >> 8) & 0xff) as i32,
        (p & 0xff) as i32,
    )
}

#[inline]
fn pack(a: i32, r: i32, g: i32, b: i32) -> Argb {
    ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

/// Porter-Duff source-over.
#[derive(Debug, Clone, Copy)]
pub struct SrcOver;

impl Compositor for SrcOver {
    #[inline]
    fn blend_opaque(_dst: Argb, src: Argb) -> Argb {
        src
    }

    #[inline]
    fn blend_opaque_alpha(dst: Argb, src: Argb, extra: i32) -> Argb {
        if PREMULTIPLIED_ALPHA {
            return Self::blend_alpha(dst, src | 0xff00_0000, extra);
        }
        let (_, dr, dg, db) = channels(dst);
        let (_, sr, sg, sb) = channels(src);
        pack(
            0xff,
            dr + ((extra * (sr - dr)) >> 8),
            dg + ((extra * (sg - dg)) >> 8),
            db + ((extra * (sb - db)) >> 8),
        )
    }

    #[inline]
    fn blend(dst: Argb, src: Argb) -> Argb {
        let (da, dr, dg, db) = channels(dst);
        let (sa, sr, sg, sb) = channels(src);
        if PREMULTIPLIED_ALPHA {
            let inv = 0xff - sa;
            pack(
                sa + ((da * inv + 0xff) >> 8),
                sr + ((dr * inv) >> 8),
                sg + ((dg * inv) >> 8),
                sb + ((db * inv) >> 8),
            )
        } else {
            pack(
                0xff,
                dr + ((sa * (sr - dr)) >> 8),
                dg + ((sa * (sg - dg)) >> 8),
                db + ((sa * (sb - db)) >> 8),
            )
        }
    }

    #[inline]
    fn blend_alpha(dst: Argb, src: Argb, extra: i32) -> Argb {
        let (da, dr, dg, db) = channels(dst);
        let (sa, sr, sg, sb) = channels(src);
        let sa = (sa * extra) >> 8;
        if PREMULTIPLIED_ALPHA {
            let inv = 0xff - sa;
            pack(
                sa + ((da * inv + 0xff) >> 8),
                (sr * extra + dr * inv) >> 8,
                (sg * extra + dg * inv) >> 8,
                (sb * extra + db * inv) >> 8,
            )
        } else {
            pack(
                0xff,
                dr + ((sa * (sr - dr)) >> 8),
                dg + ((sa * (sg - dg)) >> 8),
                db + ((sa * (sb - db)) >> 8),
            )
        }
    }
}

/// Source replaces destination.
#[derive(Debug, Clone, Copy)]
pub struct Src;

impl Src {
    #[inline]
    fn attenuate(src: Argb, extra: i32) -> Argb {
        let (sa, sr, sg, sb) = channels(src);
        if PREMULTIPLIED_ALPHA {
            pack(
                (sa * extra) >> 8,
                (sr * extra) >> 8,
                (sg * extra) >> 8,
                (sb * extra) >> 8,
            )
        } else {
            pack((sa * extra) >> 8, sr, sg, sb)
        }
    }
}

impl Compositor for Src {
    #[inline]
    fn blend_opaque(_dst: Argb, src: Argb) -> Argb {
        src
    }

    #[inline]
    fn blend_opaque_alpha(_dst: Argb, src: Argb, extra: i32) -> Argb {
        Self::attenuate(src, extra)
    }

    #[inline]
    fn blend(_dst: Argb, src: Argb) -> Argb {
        src
    }

    #[inline]
    fn blend_alpha(_dst: Argb, src: Argb, extra: i32) -> Argb {
        Self::attenuate(src, extra)
    }
}

/// Additive blending, clamped per channel.
#[derive(Debug, Clone, Copy)]
pub struct Add;

impl Compositor for Add {
    #[inline]
    fn blend_opaque(dst: Argb, src: Argb) -> Argb {
        let (_, dr, dg, db) = channels(dst);
        let (_, sr, sg, sb) = channels(src);
        pack(0xff, (dr + sr).min(0xff), (dg + sg).min(0xff), (db + sb).min(0xff))
    }

    #[inline]
    fn blend_opaque_alpha(dst: Argb, src: Argb, extra: i32) -> Argb {
        if PREMULTIPLIED_ALPHA {
            return Self::blend_alpha(dst, src | 0xff00_0000, extra);
        }
        let (_, dr, dg, db) = channels(dst);
        let (_, sr, sg, sb) = channels(src);
        pack(
            0xff,
            (dr + ((extra * sr) >> 8)).min(0xff),
            (dg + ((extra * sg) >> 8)).min(0xff),
            (db + ((extra * sb) >> 8)).min(0xff),
        )
    }

    #[inline]
    fn blend(dst: Argb, src: Argb) -> Argb {
        let (da, dr, dg, db) = channels(dst);
        let (sa, sr, sg, sb) = channels(src);
        if PREMULTIPLIED_ALPHA {
            pack(
                (sa + da).min(0xff),
                (dr + sr).min(0xff),
                (dg + sg).min(0xff),
                (db + sb).min(0xff),
            )
        } else {
            pack(
                0xff,
                (dr + ((sa * sr) >> 8)).min(0xff),
                (dg + ((sa * sg) >> 8)).min(0xff),
                (db + ((sa * sb) >> 8)).min(0xff),
            )
        }
    }

    #[inline]
    fn blend_alpha(dst: Argb, src: Argb, extra: i32) -> Argb {
        let (da, dr, dg, db) = channels(dst);
        let (sa, sr, sg, sb) = channels(src);
        let (scale, out_a) = if PREMULTIPLIED_ALPHA {
            (extra, (((sa * extra) >> 8) + da).min(0xff))
        } else {
            ((sa * extra) >> 8, 0xff)
        };
        pack(
            out_a,
            (dr + ((scale * sr) >> 8)).min(0xff),
            (dg + ((scale * sg) >> 8)).min(0xff),
            (db + ((scale * sb) >> 8)).min(0xff),
        )
    }
}

/// Multiplicative blending: `dst * (src + 1 - srcAlpha)`.
#[derive(Debug, Clone, Copy)]
pub struct Mult;

impl Mult {
    #[inline]
    fn apply(dst: Argb, out_a: i32, sr: i32, sg: i32, sb: i32, sa: i32) -> Argb {
        let (_, dr, dg, db) = channels(dst);
        let inv = 0xff - sa;
        pack(
            out_a,
            (dr * (sr + inv) + 0xff) >> 8,
            (dg * (sg + inv) + 0xff) >> 8,
            (db * (sb + inv) + 0xff) >> 8,
        )
    }
}

impl Compositor for Mult {
    #[inline]
    fn blend_opaque(dst: Argb, src: Argb) -> Argb {
        let (_, sr, sg, sb) = channels(src);
        let out_a = if PREMULTIPLIED_ALPHA { (dst >> 24) as i32 } else { 0xff };
        Self::apply(dst, out_a, sr, sg, sb, 0xff)
    }

    #[inline]
    fn blend_opaque_alpha(dst: Argb, src: Argb, extra: i32) -> Argb {
        let (_, sr, sg, sb) = channels(src);
        let out_a = if PREMULTIPLIED_ALPHA { (dst >> 24) as i32 } else { 0xff };
        Self::apply(
            dst,
            out_a,
            (sr * extra + 0xff) >> 8,
            (sg * extra + 0xff) >> 8,
            (sb * extra + 0xff) >> 8,
            extra,
        )
    }

    #[inline]
    fn blend(dst: Argb, src: Argb) -> Argb {
        let (sa, sr, sg, sb) = channels(src);
        if PREMULTIPLIED_ALPHA {
            Self::apply(dst, (dst >> 24) as i32, sr, sg, sb, sa)
        } else {
            Self::apply(
                dst,
                0xff,
                (sr * sa + 0xff) >> 8,
                (sg * sa + 0xff) >> 8,
                (sb * sa + 0xff) >> 8,
                sa,
            )
        }
    }

    #[inline]
    fn blend_alpha(dst: Argb, src: Argb, extra: i32) -> Argb {
        let (sa, sr, sg, sb) = channels(src);
        let sa = (sa * extra) >> 8;
        let (k, out_a) = if PREMULTIPLIED_ALPHA {
            (extra, (dst >> 24) as i32)
        } else {
            (sa, 0xff)
        };
        Self::apply(
            dst,
            out_a,
            (sr * k + 0xff) >> 8,
            (sg * k + 0xff) >> 8,
            (sb * k + 0xff) >> 8,
            sa,
        )
    }
}

/// Compositing rule selected on the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeOp {
    #[default]
    SrcOver,
    Src,
    Add,
    Mult,
}

/// One image blit, in source texel and destination pixel coordinates.
///
/// `u`/`v` are 16.16 sample positions relative to `src_rect`; `du`/`dv` advance them per
/// destination pixel. For axis-aligned blits `src_offset` is the index of the first sampled
/// texel and `rows` scanlines are written; rotated blits write a single span and sample by
/// `(u, v)` alone.
#[derive(Debug)]
pub struct Blit<'a> {
    pub src: &'a [Argb],
    pub src_stride: i32,
    pub src_opaque: bool,
    pub src_rect: IntRect,
    pub src_offset: i32,
    pub u: Fixed,
    pub v: Fixed,
    pub du: Fixed,
    pub dv: Fixed,
    pub rotated: bool,
    pub bilinear: bool,
    pub alpha: i32,
    pub dst: &'a mut [Argb],
    pub dst_stride: i32,
    pub dst_offset: i32,
    pub pixels: i32,
    pub rows: i32,
}

impl CompositeOp {
    /// Blends one source pixel. `alpha` is the extra alpha (255 = none).
    pub fn blend_pixel(self, dst: &mut Argb, src: Argb, alpha: i32) {
        *dst = match self {
            CompositeOp::SrcOver => pixel::<SrcOver>(*dst, src, alpha),
            CompositeOp::Src => pixel::<Src>(*dst, src, alpha),
            CompositeOp::Add => pixel::<Add>(*dst, src, alpha),
            CompositeOp::Mult => pixel::<Mult>(*dst, src, alpha),
        };
    }

    /// Blends a constant color over a run of pixels.
    pub fn blend_row(self, row: &mut [Argb], color: Argb) {
        match self {
            CompositeOp::SrcOver => row_with::<SrcOver>(row, color),
            CompositeOp::Src => row_with::<Src>(row, color),
            CompositeOp::Add => row_with::<Add>(row, color),
            CompositeOp::Mult => row_with::<Mult>(row, color),
        }
    }

    /// Blends a constant `color` at an extra `alpha` over a run of pixels.
    pub fn blend_row_alpha(self, row: &mut [Argb], color: Argb, alpha: i32) {
        match self {
            CompositeOp::SrcOver => row_alpha_with::<SrcOver>(row, color, alpha),
            CompositeOp::Src => row_alpha_with::<Src>(row, color, alpha),
            CompositeOp::Add => row_alpha_with::<Add>(row, color, alpha),
            CompositeOp::Mult => row_alpha_with::<Mult>(row, color, alpha),
        }
    }

    pub fn blit(self, b: Blit<'_>) {
        match self {
            CompositeOp::SrcOver => blit_with::<SrcOver>(b),
            CompositeOp::Src => blit_with::<Src>(b),
            CompositeOp::Add => blit_with::<Add>(b),
            CompositeOp::Mult => blit_with::<Mult>(b),
        }
    }
}

#[inline]
fn pixel<C: Compositor>(dst: Argb, src: Argb, alpha: i32) -> Argb {
    if src >> 24 == 0 {
        dst
    } else if alpha >= 0xff {
        C::blend(dst, src)
    } else if alpha <= 0 {
        dst
    } else {
        C::blend_alpha(dst, src, alpha)
    }
}

fn row_with<C: Compositor>(row: &mut [Argb], color: Argb) {
    if color >> 24 == 0 {
        return;
    }
    if color >> 24 == 0xff {
        for d in row.iter_mut() {
            *d = C::blend_opaque(*d, color);
        }
    } else {
        for d in row.iter_mut() {
            *d = C::blend(*d, color);
        }
    }
}

fn row_alpha_with<C: Compositor>(row: &mut [Argb], color: Argb, alpha: i32) {
    if alpha <= 0 {
        return;
    }
    if alpha >= 0xff {
        return row_with::<C>(row, color);
    }
    for d in row.iter_mut() {
        *d = C::blend_alpha(*d, color, alpha);
    }
}

#[inline]
fn lerp(a: i32, b: i32, w: i32) -> i32 {
    a + (((b - a) * w) >> 8)
}

#[inline]
fn lerp_argb(p0: Argb, p1: Argb, w: i32) -> Argb {
    if p0 == p1 || w == 0 {
        return p0;
    }
    let (a0, r0, g0, b0) = channels(p0);
    let (a1, r1, g1, b1) = channels(p1);
    pack(lerp(a0, a1, w), lerp(r0, r1, w), lerp(g0, g1, w), lerp(b0, b1, w))
}

#[inline]
fn texel(src: &[Argb], idx: i32) -> Argb {
    usize::try_from(idx)
        .ok()
        .and_then(|i| src.get(i))
        .copied()
        .unwrap_or(0)
}

/// Four-tap sample on an opaque source; out-of-range columns clamp to the edge.
#[inline]
fn bilinear_opaque(src: &[Argb], top: i32, bottom: i32, u: Fixed, v: Fixed, width: i32) -> Argb {
    let x = u >> 16;
    let (x0, x1, fx) = if x < 0 {
        (0, 0, 0)
    } else if x >= width - 1 {
        (width - 1, width - 1, 0)
    } else {
        (x, x + 1, (u >> 8) & 0xff)
    };
    let fy = (v >> 8) & 0xff;
    let t = lerp_argb(texel(src, top + x0), texel(src, top + x1), fx);
    let b = lerp_argb(texel(src, bottom + x0), texel(src, bottom + x1), fx);
    0xff00_0000 | lerp_argb(t, b, fy)
}

/// Four-tap sample on a translucent source; a row offset of -1 and out-of-range columns read
/// as transparent.
#[inline]
fn bilinear_rows(src: &[Argb], top: i32, bottom: i32, u: Fixed, v: Fixed, width: i32) -> Argb {
    let x = u >> 16;
    let fx = (u >> 8) & 0xff;
    let fy = (v >> 8) & 0xff;
    let tap = |row: i32, col: i32| -> Argb {
        if row < 0 || col < 0 || col >= width {
            0
        } else {
            texel(src, row + col)
        }
    };
    let t = lerp_argb(tap(top, x), tap(top, x + 1), fx);
    let b = lerp_argb(tap(bottom, x), tap(bottom, x + 1), fx);
    lerp_argb(t, b, fy)
}

/// Four-tap sample at an arbitrary `(u, v)`; taps outside `rect` read as transparent.
#[inline]
fn bilinear_rect(src: &[Argb], stride: i32, rect: &IntRect, u: Fixed, v: Fixed) -> Argb {
    let x = u >> 16;
    let y = v >> 16;
    let fx = (u >> 8) & 0xff;
    let fy = (v >> 8) & 0xff;
    let tap = |tx: i32, ty: i32| -> Argb {
        if tx < 0 || ty < 0 || tx >= rect.width || ty >= rect.height {
            0
        } else {
            texel(src, rect.x + tx + (rect.y + ty) * stride)
        }
    };
    let t = lerp_argb(tap(x, y), tap(x + 1, y), fx);
    let b = lerp_argb(tap(x, y + 1), tap(x + 1, y + 1), fx);
    lerp_argb(t, b, fy)
}

#[inline]
fn nearest_rect(src: &[Argb], stride: i32, rect: &IntRect, u: Fixed, v: Fixed) -> Argb {
    let x = u >> 16;
    let y = v >> 16;
    if x < 0 || y < 0 || x >= rect.width || y >= rect.height {
        0
    } else {
        texel(src, rect.x + x + (rect.y + y) * stride)
    }
}

/// Blends one sampled texel at full render alpha.
#[inline]
fn put<C: Compositor>(dst: &mut Argb, s: Argb, src_opaque: bool) {
    if src_opaque {
        *dst = C::blend_opaque(*dst, s);
        return;
    }
    match s >> 24 {
        0xff => *dst = C::blend_opaque(*dst, s),
        0 => {}
        _ => *dst = C::blend(*dst, s),
    }
}

/// Blends one sampled texel at a partial render alpha.
#[inline]
fn put_alpha<C: Compositor>(dst: &mut Argb, s: Argb, src_opaque: bool, alpha: i32) {
    if src_opaque {
        *dst = C::blend_opaque_alpha(*dst, s, alpha);
    } else if s >> 24 > 0 {
        *dst = C::blend_alpha(*dst, s, alpha);
    }
}

#[inline]
fn emit<C: Compositor>(dst: &mut Argb, s: Argb, src_opaque: bool, alpha: i32) {
    if alpha == 0xff {
        put::<C>(dst, s, src_opaque);
    } else {
        put_alpha::<C>(dst, s, src_opaque, alpha);
    }
}

/// Top/bottom row start offsets for an axis-aligned bilinear scanline, or -1 for a row that
/// lies outside a translucent source.
fn bilinear_row_offsets(b: &Blit<'_>) -> (i32, i32) {
    let r = &b.src_rect;
    let image_y = b.v >> 16;
    let row_start = |y: i32| r.x + (r.y + y) * b.src_stride;
    if b.src_opaque {
        if image_y >= r.height - 1 {
            let o = row_start(r.height - 1);
            (o, o)
        } else if image_y < 0 {
            let o = row_start(0);
            (o, o)
        } else if b.v & 0xffff == 0 {
            let o = row_start(image_y);
            (o, o)
        } else {
            let o = row_start(image_y);
            (o, o + b.src_stride)
        }
    } else if image_y >= 0 {
        if image_y < r.height - 1 {
            let o = row_start(image_y);
            (o, o + b.src_stride)
        } else if image_y == r.height - 1 {
            (row_start(image_y), -1)
        } else {
            (-1, -1)
        }
    } else if image_y == -1 {
        (-1, row_start(0))
    } else {
        (-1, -1)
    }
}

fn dst_span<'d>(dst: &'d mut [Argb], offset: i32, len: i32) -> Option<&'d mut [Argb]> {
    let start = usize::try_from(offset).ok()?;
    let len = usize::try_from(len).ok()?;
    dst.get_mut(start..start.checked_add(len)?)
}

/// Generic image blit. Monomorphized once per kernel.
fn blit_with<C: Compositor>(b: Blit<'_>) {
    if b.alpha <= 0 || b.pixels <= 0 {
        return;
    }
    let alpha = b.alpha.min(0xff);
    let opaque = b.src_opaque;

    if b.rotated {
        let Some(span) = dst_span(b.dst, b.dst_offset, b.pixels) else {
            return;
        };
        let (mut u, mut v) = (b.u, b.v);
        for d in span.iter_mut() {
            let s = if b.bilinear {
                bilinear_rect(b.src, b.src_stride, &b.src_rect, u, v)
            } else {
                nearest_rect(b.src, b.src_stride, &b.src_rect, u, v)
            };
            // Rotated samples may fall outside the source; treat the opacity flag as unknown.
            emit::<C>(d, s, false, alpha);
            u = u.wrapping_add(b.du);
            v = v.wrapping_add(b.dv);
        }
        return;
    }

    if b.bilinear {
        let (top, bottom) = bilinear_row_offsets(&b);
        let width = b.src_rect.width;
        let Some(span) = dst_span(b.dst, b.dst_offset, b.pixels) else {
            return;
        };
        let mut u = b.u;
        for d in span.iter_mut() {
            let s = if opaque {
                bilinear_opaque(b.src, top, bottom, u, b.v, width)
            } else {
                bilinear_rows(b.src, top, bottom, u, b.v, width)
            };
            emit::<C>(d, s, opaque, alpha);
            u = u.wrapping_add(b.du);
        }
        return;
    }

    // Nearest, axis-aligned. Columns clamp to the source rect so a trailing partial pixel
    // repeats the last texel instead of reading the neighbouring row.
    let last_col = b.src_rect.width - 1;
    let start_col = b.u >> 16;
    let mut row_base = b.src_offset - start_col;
    let mut dst_offset = b.dst_offset;
    for _ in 0..b.rows.max(0) {
        let Some(span) = dst_span(b.dst, dst_offset, b.pixels) else {
            return;
        };
        if b.du == ONE && start_col >= 0 && start_col + b.pixels - 1 <= last_col {
            for (i, d) in span.iter_mut().enumerate() {
                emit::<C>(d, texel(b.src, row_base + start_col + i as i32), opaque, alpha);
            }
        } else {
            let mut u = b.u;
            for d in span.iter_mut() {
                let col = (u >> 16).clamp(0, last_col.max(0));
                emit::<C>(d, texel(b.src, row_base + col), opaque, alpha);
                u = u.wrapping_add(b.du);
            }
        }
        dst_offset += b.dst_stride;
        row_base += b.src_stride;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
