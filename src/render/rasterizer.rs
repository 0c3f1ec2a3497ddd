use std::sync::Arc;

use smallvec::SmallVec;

use crate::foundation::core::{Argb, IntRect};
use crate::foundation::fixed::{self, Fixed, ONE, ONE_HALF};
use crate::render::buffer::RasterBuffer;
use crate::render::composite::{Blit, CompositeOp};
use crate::text::font::GlyphSource;
use crate::transform::affine::AffineTransform;

const CLIP_LEFT: u8 = 1;
const CLIP_RIGHT: u8 = 2;
const CLIP_ABOVE: u8 = 4;
const CLIP_BELOW: u8 = 8;

/// Inverse mapping for one rotated/sheared draw: the clipped destination rectangle plus the
/// 16.16 source position of its top-left pixel and the per-pixel/per-row steps.
#[derive(Debug, Clone, Copy)]
struct InverseScan {
    obj: IntRect,
    u: Fixed,
    v: Fixed,
    du_x: Fixed,
    dv_x: Fixed,
    du_y: Fixed,
    dv_y: Fixed,
}

/// Fixed-point software rasterizer over one destination buffer.
///
/// Holds the clip (destination space, never transformed), the current transform and its stack,
/// the current color, alpha, compositing rule, interpolation mode and font. Every draw call picks
/// the cheapest path allowed by the transform kind: raw row copies, per-scanline stepping, or a
/// fully inverse-mapped rotated blit.
#[derive(Debug)]
pub struct Rasterizer<'s> {
    surface: &'s mut RasterBuffer,
    clip: IntRect,
    transform: AffineTransform,
    stack: SmallVec<[AffineTransform; 16]>,
    composite: CompositeOp,
    bilinear: bool,
    fractional_metrics: bool,
    alpha: i32,
    color: Argb,
    // Color alpha scaled by `alpha`.
    color_alpha: i32,
    font: Option<Arc<dyn GlyphSource>>,
}

impl<'s> Rasterizer<'s> {
    pub fn new(surface: &'s mut RasterBuffer) -> Self {
        let clip = IntRect::new(0, 0, surface.width(), surface.height());
        let mut r = Self {
            surface,
            clip,
            transform: AffineTransform::IDENTITY,
            stack: SmallVec::new(),
            composite: CompositeOp::SrcOver,
            bilinear: true,
            fractional_metrics: true,
            alpha: 0xff,
            color: 0xff00_0000,
            color_alpha: 0xff,
            font: None,
        };
        r.reset();
        r
    }

    pub fn surface_width(&self) -> i32 {
        self.surface.width()
    }

    pub fn surface_height(&self) -> i32 {
        self.surface.height()
    }

    pub fn surface(&self) -> &RasterBuffer {
        self.surface
    }

    /// No clip, identity transform with an empty stack, opaque black, full alpha, source-over,
    /// bilinear filtering, fractional metrics and no font.
    pub fn reset(&mut self) {
        self.remove_clip();
        self.set_alpha(0xff);
        self.set_color(0x00_0000);
        self.composite = CompositeOp::SrcOver;
        self.bilinear = true;
        self.fractional_metrics = true;
        self.font = None;
        self.stack.clear();
        self.transform.clear();
    }

    pub fn composite(&self) -> CompositeOp {
        self.composite
    }

    pub fn set_composite(&mut self, op: CompositeOp) {
        self.composite = op;
    }

    pub fn is_bilinear(&self) -> bool {
        self.bilinear
    }

    pub fn set_bilinear(&mut self, bilinear: bool) {
        self.bilinear = bilinear;
    }

    pub fn fractional_metrics(&self) -> bool {
        self.fractional_metrics
    }

    /// When off, positions and sizes are truncated to whole pixels before drawing.
    pub fn set_fractional_metrics(&mut self, on: bool) {
        self.fractional_metrics = on;
    }

    pub fn font(&self) -> Option<&Arc<dyn GlyphSource>> {
        self.font.as_ref()
    }

    pub fn set_font(&mut self, font: Option<Arc<dyn GlyphSource>>) {
        self.font = font;
    }

    // Transforms

    pub fn push_transform(&mut self) {
        self.stack.push(self.transform);
    }

    /// Restores the transform saved by the matching [`Rasterizer::push_transform`].
    ///
    /// # Panics
    /// Panics when the stack is empty.
    pub fn pop_transform(&mut self) {
        match self.stack.pop() {
            Some(t) => self.transform = t,
            None => panic!("transform stack underflow: pop without matching push"),
        }
    }

    pub fn transform_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn transform(&self) -> &AffineTransform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut AffineTransform {
        &mut self.transform
    }

    pub fn set_transform(&mut self, t: &AffineTransform) {
        self.transform = *t;
    }

    pub fn clear_transform(&mut self) {
        self.transform.clear();
    }

    // Clipping

    pub fn remove_clip(&mut self) {
        self.clip = IntRect::new(0, 0, self.surface.width(), self.surface.height());
    }

    /// Replaces the clip with `r` intersected with the surface bounds.
    pub fn set_clip(&mut self, r: &IntRect) {
        self.remove_clip();
        self.clip_rect(r);
    }

    /// Intersects the clip with `r`.
    pub fn clip_rect(&mut self, r: &IntRect) {
        self.clip = self.clip_object(r.x, r.y, r.width, r.height);
    }

    pub fn clip(&self) -> IntRect {
        self.clip
    }

    fn clip_object(&self, mut x: i32, mut y: i32, mut w: i32, mut h: i32) -> IntRect {
        let c = self.clip;
        if x < c.x {
            w = w.saturating_sub(c.x - x);
            x = c.x;
        }
        if y < c.y {
            h = h.saturating_sub(c.y - y);
            y = c.y;
        }
        if x.saturating_add(w) > c.right() {
            w = c.right() - x;
        }
        if y.saturating_add(h) > c.bottom() {
            h = c.bottom() - y;
        }
        IntRect::new(x, y, w.max(0), h.max(0))
    }

    // Color

    pub fn alpha(&self) -> i32 {
        self.alpha
    }

    /// Global alpha applied to every subsequent draw, clamped to 0..=255.
    pub fn set_alpha(&mut self, alpha: i32) {
        self.alpha = alpha.clamp(0, 0xff);
        self.update_color_alpha();
    }

    pub fn color(&self) -> Argb {
        self.color
    }

    /// Sets an opaque color from its RGB bits.
    pub fn set_color(&mut self, rgb: Argb) {
        self.color = 0xff00_0000 | rgb;
        self.update_color_alpha();
    }

    /// Sets a straight-alpha ARGB color.
    pub fn set_color_argb(&mut self, argb: Argb) {
        self.color = argb;
        self.update_color_alpha();
    }

    fn update_color_alpha(&mut self) {
        let a = (self.color >> 24) as i32;
        self.color_alpha = if self.alpha == 0xff {
            a
        } else {
            (a * self.alpha) >> 8
        };
    }

    fn fill_color(&self) -> Argb {
        0xff00_0000 | self.color
    }

    // Lines

    pub fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        self.draw_line_opt(x1, y1, x2, y2, true);
    }

    /// `draw_last_point = false` leaves the final pixel untouched, so connected segments do
    /// not double-blend their shared endpoints.
    pub fn draw_line_opt(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, draw_last_point: bool) {
        self.draw_line_fixed(
            fixed::to_fixed(x1),
            fixed::to_fixed(y1),
            fixed::to_fixed(x2),
            fixed::to_fixed(y2),
            draw_last_point,
        );
    }

    pub fn draw_line_f64(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, draw_last_point: bool) {
        self.draw_line_fixed(
            fixed::to_fixed_f64(x1),
            fixed::to_fixed_f64(y1),
            fixed::to_fixed_f64(x2),
            fixed::to_fixed_f64(y2),
            draw_last_point,
        );
    }

    /// Draws a one-pixel line between two fixed-point points in local space. Endpoints are
    /// mapped through the transform; the stroke itself is not scaled.
    pub fn draw_line_fixed(
        &mut self,
        x1: Fixed,
        y1: Fixed,
        x2: Fixed,
        y2: Fixed,
        draw_last_point: bool,
    ) {
        if self.color_alpha == 0 {
            return;
        }
        let (mut x1, mut y1) = self.transform.transform_point(x1, y1);
        let (mut x2, mut y2) = self.transform.transform_point(x2, y2);
        if !self.fractional_metrics {
            x1 = fixed::int_part(x1);
            y1 = fixed::int_part(y1);
            x2 = fixed::int_part(x2);
            y2 = fixed::int_part(y2);
        }

        // Cohen-Sutherland against the clip.
        let xmin = fixed::to_fixed(self.clip.x);
        let xmax = xmin.saturating_add(fixed::to_fixed(self.clip.width));
        let ymin = fixed::to_fixed(self.clip.y);
        let ymax = ymin.saturating_add(fixed::to_fixed(self.clip.height));
        let code = |x: Fixed, y: Fixed| -> u8 {
            (if x < xmin { CLIP_LEFT } else { 0 })
                | (if x > xmax { CLIP_RIGHT } else { 0 })
                | (if y < ymin { CLIP_ABOVE } else { 0 })
                | (if y > ymax { CLIP_BELOW } else { 0 })
        };
        let clip_point = |c: u8, x: &mut Fixed, y: &mut Fixed, dx: Fixed, dy: Fixed| {
            if c & CLIP_LEFT != 0 {
                *y = y.saturating_add(fixed::mul_div(xmin - *x, dy, dx));
                *x = xmin;
            } else if c & CLIP_RIGHT != 0 {
                *y = y.saturating_add(fixed::mul_div(xmax - *x, dy, dx));
                *x = xmax;
            } else if c & CLIP_ABOVE != 0 {
                *x = x.saturating_add(fixed::mul_div(ymin - *y, dx, dy));
                *y = ymin;
            } else if c & CLIP_BELOW != 0 {
                *x = x.saturating_add(fixed::mul_div(ymax - *y, dx, dy));
                *y = ymax;
            }
        };

        let mut c1 = code(x1, y1);
        let mut c2 = code(x2, y2);
        while (c1 | c2) != 0 {
            if (c1 & c2) != 0 {
                return;
            }
            let dx = x2.saturating_sub(x1);
            let dy = y2.saturating_sub(y1);
            if c1 != 0 {
                clip_point(c1, &mut x1, &mut y1, dx, dy);
                c1 = code(x1, y1);
            } else {
                clip_point(c2, &mut x2, &mut y2, dx, dy);
                c2 = code(x2, y2);
            }
        }

        let dx = x2.saturating_sub(x1);
        let dy = y2.saturating_sub(y1);
        let mut dx_abs = dx.saturating_abs();
        let mut dy_abs = dy.saturating_abs();
        let sdx = ONE * dx.signum();
        let sdy = ONE * dy.signum();

        let saved = self.transform;
        if dx == 0 && dy == 0 {
            self.fill_fixed_at(x1, y1, ONE, ONE);
        } else if dy == 0 {
            // A right-to-left run starts at the end point, so an excluded end shifts it by one.
            let px = match (dx < 0, draw_last_point) {
                (false, _) => x1,
                (true, true) => x2,
                (true, false) => x2.saturating_add(ONE),
            };
            if draw_last_point {
                dx_abs = dx_abs.saturating_add(ONE);
            }
            self.fill_fixed_at(px, y1, dx_abs, ONE);
        } else if dx == 0 {
            let py = match (dy < 0, draw_last_point) {
                (false, _) => y1,
                (true, true) => y2,
                (true, false) => y2.saturating_add(ONE),
            };
            if draw_last_point {
                dy_abs = dy_abs.saturating_add(ONE);
            }
            self.fill_fixed_at(x1, py, ONE, dy_abs);
        } else {
            // Step one pixel along the major axis; diagonals move a full pixel on both.
            let (ldx, ldy, major) = if dx_abs >= dy_abs {
                (sdx, fixed::div(dy, dx_abs), dx_abs)
            } else {
                (fixed::div(dx, dy_abs), sdy, dy_abs)
            };
            let mut steps = fixed::int_div_ceil(major, ONE);
            if draw_last_point {
                steps += 1;
            }
            let (mut px, mut py) = (x1, y1);
            for _ in 0..steps {
                self.fill_fixed_at(px, py, ONE, ONE);
                px = px.saturating_add(ldx);
                py = py.saturating_add(ldy);
            }
        }
        self.transform = saved;
    }

    fn fill_fixed_at(&mut self, x: Fixed, y: Fixed, fw: Fixed, fh: Fixed) {
        self.transform = AffineTransform::translation(x, y);
        self.internal_fill_rect_fixed(fw, fh);
    }

    // Rectangles

    /// Outline of width one, inside `(x, y, w, h)`.
    pub fn draw_rect(&mut self, x: i32, y: i32, w: i32, h: i32) {
        self.fill_rect(x, y, w, 1);
        self.fill_rect(x, y + h - 1, w, 1);
        self.fill_rect(x, y, 1, h);
        self.fill_rect(x + w - 1, y, 1, h);
    }

    /// Fills the surface-sized rectangle at the origin under the current transform.
    pub fn fill(&mut self) {
        let (w, h) = (self.surface.width(), self.surface.height());
        self.fill_rect(0, 0, w, h);
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32) {
        self.fill_rect_fixed(
            fixed::to_fixed(x),
            fixed::to_fixed(y),
            fixed::to_fixed(w),
            fixed::to_fixed(h),
        );
    }

    pub fn fill_rect_f64(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.fill_rect_fixed(
            fixed::to_fixed_f64(x),
            fixed::to_fixed_f64(y),
            fixed::to_fixed_f64(w),
            fixed::to_fixed_f64(h),
        );
    }

    pub fn fill_rect_fixed(&mut self, fx: Fixed, fy: Fixed, fw: Fixed, fh: Fixed) {
        if self.color_alpha == 0 || fw == 0 || fh == 0 {
            return;
        }
        self.push_transform();
        self.transform.translate(fx, fy);

        let t = self.transform;
        if t.is_rotated() || t.scale_x() < 0 || t.scale_y() < 0 {
            self.internal_fill_rotated_rect(fw, fh);
        } else {
            let w = fixed::mul(t.scale_x(), fw);
            let h = fixed::mul(t.scale_y(), fh);
            let fractional = [t.translate_x(), t.translate_y(), w, h]
                .iter()
                .any(|&v| fixed::frac_part(v) != 0);
            if self.fractional_metrics && fractional {
                self.internal_fill_rect_fixed(fw, fh);
            } else {
                self.internal_fill_rect(fw, fh);
            }
        }

        self.pop_transform();
    }

    fn internal_fill_rect(&mut self, fw: Fixed, fh: Fixed) {
        if self.color_alpha == 0 || fw == 0 || fh == 0 {
            return;
        }
        let t = self.transform;
        let x = fixed::to_int(t.translate_x());
        let y = fixed::to_int(t.translate_y());
        let w = fixed::to_int_ceil(fixed::mul(t.scale_x(), fw));
        let h = fixed::to_int_ceil(fixed::mul(t.scale_y(), fh));
        let obj = self.clip_object(x, y, w, h);
        if obj.is_empty() {
            return;
        }

        let op = self.composite;
        let color = self.fill_color();
        let alpha = self.color_alpha;
        let copy = alpha == 0xff && matches!(op, CompositeOp::Src | CompositeOp::SrcOver);
        let sw = self.surface.width() as usize;
        let data = self.surface.pixels_mut();
        for j in 0..obj.height {
            let start = (obj.y + j) as usize * sw + obj.x as usize;
            let row = &mut data[start..start + obj.width as usize];
            if copy {
                row.fill(color);
            } else {
                op.blend_row_alpha(row, color, alpha);
            }
        }
    }

    /// Axis-aligned fill at sub-pixel position; edge pixels get partial coverage.
    fn internal_fill_rect_fixed(&mut self, fw: Fixed, fh: Fixed) {
        let t = self.transform;
        let x1 = t.translate_x();
        let y1 = t.translate_y();
        let x2 = x1.saturating_add(fixed::mul(t.scale_x(), fw));
        let y2 = y1.saturating_add(fixed::mul(t.scale_y(), fh));
        let bx1 = x1.min(x2);
        let by1 = y1.min(y2);
        let bx = fixed::to_int_floor(bx1);
        let by = fixed::to_int_floor(by1);
        let bw = fixed::to_int_ceil(x1.max(x2)) - bx;
        let bh = fixed::to_int_ceil(y1.max(y2)) - by;

        let obj = self.clip_object(bx, by, bw, bh);
        if obj.is_empty() {
            return;
        }

        let op = self.composite;
        let color = self.fill_color();
        let rect_alpha = self.color_alpha;
        let w_limit = (x1 - x2).abs() - ONE;
        let h_limit = (y1 - y2).abs() - ONE;
        let sw = self.surface.width() as usize;
        let data = self.surface.pixels_mut();
        let mut v = fixed::to_fixed(obj.y) - by1;
        for j in 0..obj.height {
            let start = (obj.y + j) as usize * sw + obj.x as usize;
            let row = &mut data[start..start + obj.width as usize];
            let mut u = fixed::to_fixed(obj.x) - bx1;
            for d in row.iter_mut() {
                let a = edge_coverage(rect_alpha, u, v, w_limit, h_limit);
                op.blend_pixel(d, color, a);
                u += ONE;
            }
            v += ONE;
        }
    }

    fn internal_fill_rotated_rect(&mut self, mut fw: Fixed, mut fh: Fixed) {
        if !self.fractional_metrics {
            fw = fixed::int_part(fw);
            fh = fixed::int_part(fh);
        }
        let Some(scan) = self.inverse_scan(fw, fh) else {
            return;
        };

        let op = self.composite;
        let color = self.fill_color();
        let rect_alpha = self.color_alpha;
        let lower = if self.bilinear { -0xff00 } else { 0 };
        let w_limit = fw - ONE;
        let h_limit = fh - ONE;
        let sw = self.surface.width() as usize;
        let data = self.surface.pixels_mut();

        let (mut u_row, mut v_row) = (scan.u, scan.v);
        for j in 0..scan.obj.height {
            let (u0, v0) = (u_row, v_row);
            u_row = u_row.saturating_add(scan.du_y);
            v_row = v_row.saturating_add(scan.dv_y);
            let Some((start, end, mut u, mut v)) =
                clip_span(u0, v0, scan.du_x, scan.dv_x, scan.obj.width, lower, fw - 1, fh - 1)
            else {
                continue;
            };
            let row_start = (scan.obj.y + j) as usize * sw + scan.obj.x as usize;
            let row = &mut data[row_start + start as usize..=row_start + end as usize];
            for d in row.iter_mut() {
                let a = edge_coverage(rect_alpha, u, v, w_limit, h_limit);
                op.blend_pixel(d, color, a);
                u = u.wrapping_add(scan.du_x);
                v = v.wrapping_add(scan.dv_x);
            }
        }
    }

    /// Clips the transformed `fw x fh` box (padded by one pixel) and inverts the transform
    /// into per-pixel source steps. `None` when nothing is visible or the transform is singular.
    fn inverse_scan(&self, fw: Fixed, fh: Fixed) -> Option<InverseScan> {
        let t = &self.transform;
        let (mut x1, mut y1) = (t.translate_x(), t.translate_y());
        if !self.fractional_metrics {
            x1 = fixed::int_part(x1);
            y1 = fixed::int_part(y1);
        }

        let x2 = fixed::mul(t.scale_x(), fw);
        let y2 = fixed::mul(t.shear_y(), fw);
        let x3 = fixed::mul(t.shear_x(), fh);
        let y3 = fixed::mul(t.scale_y(), fh);
        let xs = [x1, x1 + x2, x1 + x3, x1 + x2 + x3];
        let ys = [y1, y1 + y2, y1 + y3, y1 + y2 + y3];
        let (min_x, max_x) = min_max(xs);
        let (min_y, max_y) = min_max(ys);

        let bx = fixed::to_int_floor(min_x) - 1;
        let by = fixed::to_int_floor(min_y) - 1;
        let bw = fixed::to_int_ceil(max_x) - bx + 2;
        let bh = fixed::to_int_ceil(max_y) - by + 2;
        let obj = self.clip_object(bx, by, bw, bh);
        if obj.is_empty() {
            return None;
        }

        // Source position of the unclipped box's first pixel.
        let mut u = fixed::to_fixed(bx) - x1;
        let mut v = fixed::to_fixed(by) - y1;
        let (du_x, dv_x, du_y, dv_y);
        if t.is_rotated() {
            let det = t.determinant();
            if det == 0 {
                tracing::trace!("singular transform, skipping rotated draw");
                return None;
            }
            du_x = fixed::div(t.scale_y(), det);
            dv_x = fixed::div(-t.shear_y(), det);
            du_y = fixed::div(-t.shear_x(), det);
            dv_y = fixed::div(t.scale_x(), det);
            let (u64_, v64_) = (i64::from(u), i64::from(v));
            let det64 = i64::from(det);
            let nu = (u64_ * i64::from(t.scale_y()) - v64_ * i64::from(t.shear_x())) / det64;
            let nv = (v64_ * i64::from(t.scale_x()) - u64_ * i64::from(t.shear_y())) / det64;
            u = saturate(nu);
            v = saturate(nv);
        } else if t.kind() & AffineTransform::KIND_SCALE != 0 {
            let (sx, sy) = (t.scale_x(), t.scale_y());
            if sx == 0 || sy == 0 {
                tracing::trace!("zero scale, skipping draw");
                return None;
            }
            du_x = fixed::div(ONE, sx);
            dv_x = 0;
            du_y = 0;
            dv_y = fixed::div(ONE, sy);
            u = fixed::div(u, sx);
            v = fixed::div(v, sy);
        } else {
            du_x = ONE;
            dv_x = 0;
            du_y = 0;
            dv_y = ONE;
        }

        // Sample at destination pixel centers; bilinear taps are centered on texels.
        u = u.saturating_add((du_x + du_y) >> 1);
        v = v.saturating_add((dv_x + dv_y) >> 1);
        if self.bilinear {
            u = u.saturating_sub(ONE_HALF);
            v = v.saturating_sub(ONE_HALF);
        }

        // Whole steps to the clipped origin: a pixel samples the same source position
        // whatever the clip.
        let (dx, dy) = (i64::from(obj.x - bx), i64::from(obj.y - by));
        let u = saturate(i64::from(u) + dx * i64::from(du_x) + dy * i64::from(du_y));
        let v = saturate(i64::from(v) + dx * i64::from(dv_x) + dy * i64::from(dv_y));

        Some(InverseScan {
            obj,
            u,
            v,
            du_x,
            dv_x,
            du_y,
            dv_y,
        })
    }

    // Images

    fn validate_image(image: &RasterBuffer, src: &IntRect) {
        assert!(
            src.x >= 0
                && src.y >= 0
                && src.width >= 0
                && src.height >= 0
                && src.x + src.width <= image.width()
                && src.y + src.height <= image.height(),
            "source rect {src:?} outside {}x{} image",
            image.width(),
            image.height()
        );
    }

    fn full_rect(image: &RasterBuffer) -> IntRect {
        IntRect::new(0, 0, image.width(), image.height())
    }

    /// Draws the whole image at the local origin.
    pub fn draw_image(&mut self, image: &RasterBuffer) {
        self.draw_image_region(image, &Self::full_rect(image));
    }

    /// Draws `src` (a rectangle of `image`) at the local origin.
    ///
    /// # Panics
    /// Panics when `src` does not lie within the image.
    pub fn draw_image_region(&mut self, image: &RasterBuffer, src: &IntRect) {
        Self::validate_image(image, src);
        if self.alpha == 0 || src.width == 0 || src.height == 0 {
            return;
        }
        let t = self.transform;
        let kind = t.kind();
        if kind == AffineTransform::KIND_IDENTITY || kind == AffineTransform::KIND_TRANSLATE {
            let frac = fixed::frac_part(t.translate_x()) != 0
                || fixed::frac_part(t.translate_y()) != 0;
            if self.fractional_metrics && frac {
                self.internal_draw_scaled_by_transform(image, src);
            } else {
                self.internal_draw_image(image, src);
            }
        } else if t.is_rotated() || t.scale_x() < 0 || t.scale_y() < 0 {
            self.internal_draw_rotated_image(image, src);
        } else {
            self.internal_draw_scaled_by_transform(image, src);
        }
    }

    pub fn draw_image_at(&mut self, image: &RasterBuffer, x: i32, y: i32) {
        self.draw_image_region_at(image, x, y, &Self::full_rect(image));
    }

    pub fn draw_image_region_at(&mut self, image: &RasterBuffer, x: i32, y: i32, src: &IntRect) {
        Self::validate_image(image, src);
        if self.alpha == 0 || src.width == 0 || src.height == 0 {
            return;
        }
        self.push_transform();
        self.transform
            .translate(fixed::to_fixed(x), fixed::to_fixed(y));
        self.draw_image_region(image, src);
        self.pop_transform();
    }

    pub fn draw_scaled_image(&mut self, image: &RasterBuffer, x: i32, y: i32, w: i32, h: i32) {
        self.draw_scaled_image_region(image, x, y, w, h, &Self::full_rect(image));
    }

    /// Draws `src` stretched to `w x h` at `(x, y)`. Under an identity or translate transform
    /// the destination size is exact.
    pub fn draw_scaled_image_region(
        &mut self,
        image: &RasterBuffer,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        src: &IntRect,
    ) {
        Self::validate_image(image, src);
        if self.alpha == 0 || src.width == 0 || src.height == 0 {
            return;
        }
        self.push_transform();
        self.transform
            .translate(fixed::to_fixed(x), fixed::to_fixed(y));
        if self.transform.is_translate_only() {
            self.internal_draw_scaled_exact(image, w, h, src);
        } else {
            let sx = fixed::to_fixed(w) / src.width;
            let sy = fixed::to_fixed(h) / src.height;
            self.transform.scale(sx, sy);
            self.draw_image_region(image, src);
        }
        self.pop_transform();
    }

    /// Draws the image scaled to `w x h` and rotated by `angle` about its center.
    pub fn draw_rotated_image(
        &mut self,
        image: &RasterBuffer,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        angle: Fixed,
    ) {
        self.draw_rotated_image_region(
            image,
            x,
            y,
            w,
            h,
            fixed::cos(angle),
            fixed::sin(angle),
            &Self::full_rect(image),
        );
    }

    /// As [`Rasterizer::draw_rotated_image`] with a precomputed `(cos, sin)` and a source rect.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_rotated_image_region(
        &mut self,
        image: &RasterBuffer,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        cos: Fixed,
        sin: Fixed,
        src: &IntRect,
    ) {
        Self::validate_image(image, src);
        if self.alpha == 0 || src.width == 0 || src.height == 0 {
            return;
        }
        let fsw = fixed::to_fixed(src.width);
        let fsh = fixed::to_fixed(src.height);

        self.push_transform();
        self.transform
            .translate(fixed::to_fixed(x), fixed::to_fixed(y));
        self.transform
            .scale(fixed::to_fixed(w) / src.width, fixed::to_fixed(h) / src.height);
        self.transform.translate(fsw / 2, fsh / 2);
        self.transform.rotate(cos, sin);
        self.transform.translate(-fsw / 2, -fsh / 2);
        self.draw_image_region(image, src);
        self.pop_transform();
    }

    fn internal_draw_image(&mut self, image: &RasterBuffer, src: &IntRect) {
        let x = fixed::to_int(self.transform.translate_x());
        let y = fixed::to_int(self.transform.translate_y());
        let obj = self.clip_object(x, y, src.width, src.height);
        if obj.is_empty() {
            return;
        }

        let stride = image.width();
        let sw = self.surface.width();
        let u = (obj.x - x) << 16;
        let v = (obj.y - y) << 16;
        let src_offset = src.x + (u >> 16) + (src.y + (v >> 16)) * stride;
        let dst_offset = obj.x + obj.y * sw;

        let op = self.composite;
        let alpha = self.alpha;
        let src_data = image.pixels();
        let dst = self.surface.pixels_mut();

        if alpha == 0xff
            && (op == CompositeOp::Src || (op == CompositeOp::SrcOver && image.is_opaque()))
        {
            let w = obj.width as usize;
            for j in 0..obj.height {
                let s = (src_offset + j * stride) as usize;
                let d = (dst_offset + j * sw) as usize;
                dst[d..d + w].copy_from_slice(&src_data[s..s + w]);
            }
            return;
        }

        op.blit(Blit {
            src: src_data,
            src_stride: stride,
            src_opaque: image.is_opaque(),
            src_rect: *src,
            src_offset,
            u,
            v,
            du: ONE,
            dv: 0,
            rotated: false,
            bilinear: false,
            alpha,
            dst,
            dst_stride: sw,
            dst_offset,
            pixels: obj.width,
            rows: obj.height,
        });
    }

    fn internal_draw_scaled_exact(&mut self, image: &RasterBuffer, w: i32, h: i32, src: &IntRect) {
        if w == 0 || h == 0 {
            return;
        }
        let fw = fixed::to_fixed(w);
        let fh = fixed::to_fixed(h);
        let du = fixed::div(fixed::to_fixed(src.width), fw);
        let dv = fixed::div(fixed::to_fixed(src.height), fh);
        self.internal_draw_scaled(image, fw, fh, du, dv, src);
    }

    fn internal_draw_scaled_by_transform(&mut self, image: &RasterBuffer, src: &IntRect) {
        let sx = self.transform.scale_x();
        let sy = self.transform.scale_y();
        if sx == 0 || sy == 0 {
            return;
        }
        let mut fw = sx.saturating_mul(src.width);
        let mut fh = sy.saturating_mul(src.height);
        let (du, dv);
        if self.fractional_metrics {
            du = fixed::div(ONE, sx);
            dv = fixed::div(ONE, sy);
        } else {
            fw = fixed::int_part(fw);
            fh = fixed::int_part(fh);
            if fw == 0 || fh == 0 {
                return;
            }
            du = fixed::div(fixed::to_fixed(src.width), fw);
            dv = fixed::div(fixed::to_fixed(src.height), fh);
        }
        self.internal_draw_scaled(image, fw, fh, du, dv, src);
    }

    fn internal_draw_scaled(
        &mut self,
        image: &RasterBuffer,
        fw: Fixed,
        fh: Fixed,
        du: Fixed,
        dv: Fixed,
        src: &IntRect,
    ) {
        if fw <= 0 || fh <= 0 {
            return;
        }
        let mut fx = self.transform.translate_x();
        let mut fy = self.transform.translate_y();
        if !self.fractional_metrics {
            fx = fixed::int_part(fx);
            fy = fixed::int_part(fy);
        }
        let x = fixed::to_int_floor(fx);
        let y = fixed::to_int_floor(fy);
        let w = fixed::to_int_ceil(fw.saturating_add(fixed::frac_part(fx)));
        let h = fixed::to_int_ceil(fh.saturating_add(fixed::frac_part(fy)));
        let obj = self.clip_object(x, y, w, h);
        if obj.is_empty() {
            return;
        }

        let stride = image.width();
        let sw = self.surface.width();
        let op = self.composite;
        let alpha = self.alpha;
        let bilinear = self.bilinear;
        let src_data = image.pixels();
        let dst = self.surface.pixels_mut();

        let mut u = fixed::mul(fixed::to_fixed(x) - fx, du);
        let mut v = fixed::mul(fixed::to_fixed(y) - fy, dv);
        if bilinear {
            u = u.saturating_add((du - ONE) >> 1);
            v = v.saturating_add((dv - ONE) >> 1);
        }
        u = u.saturating_add((obj.x - x).saturating_mul(du));
        v = v.saturating_add((obj.y - y).saturating_mul(dv));
        let mut dst_offset = obj.x + obj.y * sw;
        for _ in 0..obj.height {
            let row = (v >> 16).clamp(0, src.height - 1);
            let src_offset = src.x + (u >> 16) + (src.y + row) * stride;
            op.blit(Blit {
                src: src_data,
                src_stride: stride,
                src_opaque: image.is_opaque(),
                src_rect: *src,
                src_offset,
                u,
                v,
                du,
                dv: 0,
                rotated: false,
                bilinear,
                alpha,
                dst: &mut *dst,
                dst_stride: sw,
                dst_offset,
                pixels: obj.width,
                rows: 1,
            });
            v = v.saturating_add(dv);
            dst_offset += sw;
        }
    }

    fn internal_draw_rotated_image(&mut self, image: &RasterBuffer, src: &IntRect) {
        let fsw = fixed::to_fixed(src.width);
        let fsh = fixed::to_fixed(src.height);
        let Some(scan) = self.inverse_scan(fsw, fsh) else {
            return;
        };

        let stride = image.width();
        let sw = self.surface.width();
        let op = self.composite;
        let alpha = self.alpha;
        let bilinear = self.bilinear;
        let lower = if bilinear { -0xff00 } else { 0 };
        let src_data = image.pixels();
        let dst = self.surface.pixels_mut();

        let (mut u_row, mut v_row) = (scan.u, scan.v);
        for j in 0..scan.obj.height {
            let (u0, v0) = (u_row, v_row);
            u_row = u_row.saturating_add(scan.du_y);
            v_row = v_row.saturating_add(scan.dv_y);
            let Some((start, end, u, v)) =
                clip_span(u0, v0, scan.du_x, scan.dv_x, scan.obj.width, lower, fsw - 1, fsh - 1)
            else {
                continue;
            };
            op.blit(Blit {
                src: src_data,
                src_stride: stride,
                src_opaque: image.is_opaque(),
                src_rect: *src,
                src_offset: -1,
                u,
                v,
                du: scan.du_x,
                dv: scan.dv_x,
                rotated: true,
                bilinear,
                alpha,
                dst: &mut *dst,
                dst_stride: sw,
                dst_offset: scan.obj.x + (scan.obj.y + j) * sw + start,
                pixels: end - start + 1,
                rows: 1,
            });
        }
    }

    // Text

    fn current_font(&self) -> Option<Arc<dyn GlyphSource>> {
        let font = self.font.clone();
        if font.is_none() {
            tracing::debug!("no font set, skipping text draw");
        }
        font
    }

    /// Draws `s` with its top-left corner at the local origin.
    pub fn draw_string(&mut self, s: &str) {
        if s.is_empty() || self.alpha == 0 {
            return;
        }
        let Some(font) = self.current_font() else {
            return;
        };
        let height = font.height();
        let strip = font.strip();

        self.push_transform();
        let mut chars = s.chars().peekable();
        let mut index = match chars.peek() {
            Some(&c) => font.glyph_index(c),
            None => 0,
        };
        while chars.next().is_some() {
            let (pos, width) = font.glyph_span(index);
            self.draw_image_region(strip, &IntRect::new(pos, 0, width, height));
            if let Some(&next) = chars.peek() {
                let next_index = font.glyph_index(next);
                let dx = width + font.kerning(index, next_index);
                self.transform.translate(fixed::to_fixed(dx), 0);
                index = next_index;
            }
        }
        self.pop_transform();
    }

    pub fn draw_string_at(&mut self, s: &str, x: i32, y: i32) {
        if s.is_empty() || self.alpha == 0 {
            return;
        }
        self.push_transform();
        self.transform
            .translate(fixed::to_fixed(x), fixed::to_fixed(y));
        self.draw_string(s);
        self.pop_transform();
    }

    /// Draws `s` stretched to exactly `w x h`.
    pub fn draw_scaled_string(&mut self, s: &str, x: i32, y: i32, w: i32, h: i32) {
        if s.is_empty() || w == 0 || h == 0 || self.alpha == 0 {
            return;
        }
        let Some(font) = self.current_font() else {
            return;
        };
        let (ow, oh) = (font.string_width(s), font.height());
        if ow == 0 || oh == 0 {
            return;
        }
        self.push_transform();
        self.transform
            .translate(fixed::to_fixed(x), fixed::to_fixed(y));
        self.transform
            .scale(fixed::to_fixed(w) / ow, fixed::to_fixed(h) / oh);
        self.draw_string(s);
        self.pop_transform();
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_rotated_string(
        &mut self,
        s: &str,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        cos: Fixed,
        sin: Fixed,
    ) {
        if s.is_empty() || self.alpha == 0 {
            return;
        }
        let Some(font) = self.current_font() else {
            return;
        };
        let (ow, oh) = (font.string_width(s), font.height());
        if ow == 0 || oh == 0 {
            return;
        }
        let fsw = fixed::to_fixed(ow);
        let fsh = fixed::to_fixed(oh);

        self.push_transform();
        self.transform
            .translate(fixed::to_fixed(x), fixed::to_fixed(y));
        self.transform
            .scale(fixed::to_fixed(w) / ow, fixed::to_fixed(h) / oh);
        self.transform.translate(fsw / 2, fsh / 2);
        self.transform.rotate(cos, sin);
        self.transform.translate(-fsw / 2, -fsh / 2);
        self.draw_string(s);
        self.pop_transform();
    }

    /// Draws a single glyph, cropped to at most `max_width` pixels.
    pub fn draw_char(&mut self, ch: char, max_width: i32) {
        if self.alpha == 0 || max_width <= 0 {
            return;
        }
        let Some(font) = self.current_font() else {
            return;
        };
        let (pos, width) = font.glyph_span(font.glyph_index(ch));
        let src = IntRect::new(pos, 0, width.min(max_width), font.height());
        self.draw_image_region(font.strip(), &src);
    }
}

/// Scales `alpha` down for pixels within one pixel outside the `[0, limit]` box.
#[inline]
fn edge_coverage(alpha: i32, u: Fixed, v: Fixed, w_limit: Fixed, h_limit: Fixed) -> i32 {
    let mut a = alpha;
    if u < 0 {
        a = (a * ((u >> 8) & 0xff)) >> 8;
    } else if u > w_limit {
        a = (a * (((w_limit - u) >> 8) & 0xff)) >> 8;
    }
    if v < 0 {
        a = (a * ((v >> 8) & 0xff)) >> 8;
    } else if v > h_limit {
        a = (a * (((h_limit - v) >> 8) & 0xff)) >> 8;
    }
    a
}

fn min_max(vals: [Fixed; 4]) -> (Fixed, Fixed) {
    let mut lo = vals[0];
    let mut hi = vals[0];
    for &v in &vals[1..] {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    (lo, hi)
}

#[inline]
fn saturate(v: i64) -> Fixed {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as Fixed
}

/// `ceil(n / d)` for `n >= 0`, `d > 0`.
#[inline]
fn ceil_steps(n: i64, d: i64) -> i64 {
    (n + d - 1) / d
}

/// Clips one scanline of `width` pixels, starting at source `(u, v)` and stepping by
/// `(du, dv)`, to the source box `[lower, u_max] x [lower, v_max]`. Returns the first and last
/// pixel to draw and the source position of the first.
#[allow(clippy::too_many_arguments)]
fn clip_span(
    u: Fixed,
    v: Fixed,
    du: Fixed,
    dv: Fixed,
    width: i32,
    lower: Fixed,
    u_max: Fixed,
    v_max: Fixed,
) -> Option<(i32, i32, Fixed, Fixed)> {
    let lower = i64::from(lower);
    let axes = [
        (i64::from(u), i64::from(du), i64::from(u_max)),
        (i64::from(v), i64::from(dv), i64::from(v_max)),
    ];

    let mut start: i64 = 0;
    for &(p, dp, max) in &axes {
        let p = p + start * dp;
        let skip = if p < lower {
            if dp <= 0 {
                return None;
            }
            ceil_steps(lower - p, dp)
        } else if p > max {
            if dp >= 0 {
                return None;
            }
            ceil_steps(p - max, -dp)
        } else {
            0
        };
        start += skip;
    }

    let mut end = i64::from(width) - 1;
    for &(p, dp, max) in &axes {
        let last = p + end * dp;
        let trim = if last < lower {
            if dp >= 0 {
                return None;
            }
            ceil_steps(lower - last, -dp)
        } else if last > max {
            if dp <= 0 {
                return None;
            }
            ceil_steps(last - max, dp)
        } else {
            0
        };
        end -= trim;
    }

    if end < start || start >= i64::from(width) {
        return None;
    }
    let (u0, du0, _) = axes[0];
    let (v0, dv0, _) = axes[1];
    Some((
        start as i32,
        end as i32,
        saturate(u0 + start * du0),
        saturate(v0 + start * dv0),
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/render/rasterizer.rs"]
mod tests;
