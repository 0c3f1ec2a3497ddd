use crate::foundation::core::IntRect;
use crate::foundation::fixed::{self, Fixed, ONE};

/// 2x3 affine matrix in 16.16 fixed point.
///
/// ```text
/// [ x' ]   [ m00 m01 m02 ] [ x ]
/// [ y' ] = [ m10 m11 m12 ] [ y ]
/// [ 1  ]   [  0   0   1  ] [ 1 ]
/// ```
///
/// Every mutation is a post-multiplication (`self = self * op`), so operations apply to the
/// local coordinate space: a child transform is `parent.concatenate(local)`.
///
/// The kind bitmask ([`AffineTransform::kind`]) is recomputed from the matrix after every
/// mutation and therefore never claims a simpler class than the matrix really has.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AffineTransform {
    m00: Fixed,
    m01: Fixed,
    m02: Fixed,
    m10: Fixed,
    m11: Fixed,
    m12: Fixed,
    kind: u8,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineTransform {
    pub const KIND_IDENTITY: u8 = 0;
    pub const KIND_TRANSLATE: u8 = 1 << 0;
    pub const KIND_SCALE: u8 = 1 << 1;
    /// Rotation or shear (any non-zero off-diagonal term).
    pub const KIND_ROTATE: u8 = 1 << 2;

    pub const IDENTITY: Self = Self {
        m00: ONE,
        m01: 0,
        m02: 0,
        m10: 0,
        m11: ONE,
        m12: 0,
        kind: Self::KIND_IDENTITY,
    };

    /// Builds a transform from raw coefficients in row-major order.
    pub fn from_coefficients(
        m00: Fixed,
        m01: Fixed,
        m02: Fixed,
        m10: Fixed,
        m11: Fixed,
        m12: Fixed,
    ) -> Self {
        let mut t = Self {
            m00,
            m01,
            m02,
            m10,
            m11,
            m12,
            kind: 0,
        };
        t.update_kind();
        t
    }

    pub fn translation(x: Fixed, y: Fixed) -> Self {
        let mut t = Self::IDENTITY;
        t.translate(x, y);
        t
    }

    fn update_kind(&mut self) {
        let mut kind = Self::KIND_IDENTITY;
        if self.m01 != 0 || self.m10 != 0 {
            kind |= Self::KIND_ROTATE;
        }
        if self.m00 != ONE || self.m11 != ONE {
            kind |= Self::KIND_SCALE;
        }
        if self.m02 != 0 || self.m12 != 0 {
            kind |= Self::KIND_TRANSLATE;
        }
        self.kind = kind;
    }

    pub fn kind(&self) -> u8 {
        self.kind
    }

    /// `true` for the identity and pure translations.
    pub fn is_translate_only(&self) -> bool {
        self.kind == Self::KIND_IDENTITY || self.kind == Self::KIND_TRANSLATE
    }

    pub fn is_rotated(&self) -> bool {
        self.kind & Self::KIND_ROTATE != 0
    }

    pub fn translate_x(&self) -> Fixed {
        self.m02
    }

    pub fn translate_y(&self) -> Fixed {
        self.m12
    }

    pub fn scale_x(&self) -> Fixed {
        self.m00
    }

    pub fn scale_y(&self) -> Fixed {
        self.m11
    }

    pub fn shear_x(&self) -> Fixed {
        self.m01
    }

    pub fn shear_y(&self) -> Fixed {
        self.m10
    }

    /// `m00 * m11 - m01 * m10`, saturated.
    pub fn determinant(&self) -> Fixed {
        let det = (i64::from(self.m00) * i64::from(self.m11)
            - i64::from(self.m01) * i64::from(self.m10))
            >> fixed::FRACTION_BITS;
        det.clamp(i64::from(fixed::MIN_VALUE), i64::from(fixed::MAX_VALUE)) as Fixed
    }

    /// Resets to the identity.
    pub fn clear(&mut self) {
        *self = Self::IDENTITY;
    }

    pub fn translate(&mut self, x: Fixed, y: Fixed) {
        if self.is_translate_only() {
            self.m02 = self.m02.saturating_add(x);
            self.m12 = self.m12.saturating_add(y);
        } else {
            self.m02 = self.m02.saturating_add(fixed::mul(self.m00, x));
            self.m12 = self.m12.saturating_add(fixed::mul(self.m11, y));
            if self.is_rotated() {
                self.m02 = self.m02.saturating_add(fixed::mul(self.m01, y));
                self.m12 = self.m12.saturating_add(fixed::mul(self.m10, x));
            }
        }
        self.update_kind();
    }

    /// Snaps the translation to whole pixels.
    pub fn round_translation(&mut self) {
        self.m02 = fixed::round(self.m02);
        self.m12 = fixed::round(self.m12);
        self.update_kind();
    }

    pub fn scale(&mut self, x: Fixed, y: Fixed) {
        if self.is_translate_only() {
            self.m00 = x;
            self.m11 = y;
        } else {
            self.m00 = fixed::mul(self.m00, x);
            self.m11 = fixed::mul(self.m11, y);
            if self.is_rotated() {
                self.m01 = fixed::mul(self.m01, y);
                self.m10 = fixed::mul(self.m10, x);
            }
        }
        self.update_kind();
    }

    /// Rotates by an angle in fixed-point radians.
    pub fn rotate_angle(&mut self, angle: Fixed) {
        self.rotate(fixed::cos(angle), fixed::sin(angle));
    }

    /// Rotates by a precomputed `(cos, sin)` pair.
    pub fn rotate(&mut self, cos: Fixed, sin: Fixed) {
        if self.is_translate_only() {
            self.m00 = cos;
            self.m01 = -sin;
            self.m10 = sin;
            self.m11 = cos;
        } else {
            let mut c00 = fixed::mul(self.m00, cos);
            let mut c01 = fixed::mul(self.m00, -sin);
            let mut c10 = fixed::mul(self.m11, sin);
            let mut c11 = fixed::mul(self.m11, cos);
            if self.is_rotated() {
                c00 = c00.saturating_add(fixed::mul(self.m01, sin));
                c01 = c01.saturating_add(fixed::mul(self.m01, cos));
                c10 = c10.saturating_add(fixed::mul(self.m10, cos));
                c11 = c11.saturating_add(fixed::mul(self.m10, -sin));
            }
            self.m00 = c00;
            self.m01 = c01;
            self.m10 = c10;
            self.m11 = c11;
        }
        self.update_kind();
    }

    pub fn shear(&mut self, x: Fixed, y: Fixed) {
        if self.is_translate_only() {
            self.m01 = x;
            self.m10 = y;
        } else {
            let c01 = self.m01.saturating_add(fixed::mul(self.m00, x));
            let c10 = self.m10.saturating_add(fixed::mul(self.m11, y));
            if self.is_rotated() {
                self.m00 = self.m00.saturating_add(fixed::mul(self.m01, y));
                self.m11 = self.m11.saturating_add(fixed::mul(self.m10, x));
            }
            self.m01 = c01;
            self.m10 = c10;
        }
        self.update_kind();
    }

    /// `self = self * other`.
    pub fn concatenate(&mut self, other: &AffineTransform) {
        *self = Self::mult(self, other);
    }

    /// `self = other * self`.
    pub fn pre_concatenate(&mut self, other: &AffineTransform) {
        *self = Self::mult(other, self);
    }

    fn mult(a: &AffineTransform, b: &AffineTransform) -> AffineTransform {
        if a.kind == Self::KIND_IDENTITY {
            return *b;
        }
        if b.kind == Self::KIND_IDENTITY {
            return *a;
        }
        let mut result = *a;
        if b.kind == Self::KIND_TRANSLATE {
            result.translate(b.m02, b.m12);
            return result;
        }
        if b.kind == Self::KIND_SCALE {
            result.scale(b.m00, b.m11);
            return result;
        }

        let m = |x: Fixed, y: Fixed| i64::from(x) * i64::from(y);
        let sat = |v: i64| {
            (v >> fixed::FRACTION_BITS).clamp(i64::from(fixed::MIN_VALUE), i64::from(fixed::MAX_VALUE))
                as Fixed
        };
        let c00 = sat(m(a.m00, b.m00) + m(a.m01, b.m10));
        let c01 = sat(m(a.m00, b.m01) + m(a.m01, b.m11));
        let c02 = sat(m(a.m00, b.m02) + m(a.m01, b.m12) + (i64::from(a.m02) << fixed::FRACTION_BITS));
        let c10 = sat(m(a.m10, b.m00) + m(a.m11, b.m10));
        let c11 = sat(m(a.m10, b.m01) + m(a.m11, b.m11));
        let c12 = sat(m(a.m10, b.m02) + m(a.m11, b.m12) + (i64::from(a.m12) << fixed::FRACTION_BITS));
        Self::from_coefficients(c00, c01, c02, c10, c11, c12)
    }

    /// Maps a point from local to device space.
    pub fn transform_point(&self, x: Fixed, y: Fixed) -> (Fixed, Fixed) {
        let tx = fixed::mul(self.m00, x)
            .saturating_add(fixed::mul(self.m01, y))
            .saturating_add(self.m02);
        let ty = fixed::mul(self.m10, x)
            .saturating_add(fixed::mul(self.m11, y))
            .saturating_add(self.m12);
        (tx, ty)
    }

    /// Maps a device-space point back to local space. `None` when the matrix is singular.
    pub fn inverse_transform_point(&self, x: Fixed, y: Fixed) -> Option<(Fixed, Fixed)> {
        let x = i64::from(x) - i64::from(self.m02);
        let y = i64::from(y) - i64::from(self.m12);
        let sat =
            |v: i64| v.clamp(i64::from(fixed::MIN_VALUE), i64::from(fixed::MAX_VALUE)) as Fixed;
        if self.is_rotated() {
            let det = i64::from(self.determinant());
            if det == 0 {
                return None;
            }
            let ix = (x * i64::from(self.m11) - y * i64::from(self.m01)) / det;
            let iy = (y * i64::from(self.m00) - x * i64::from(self.m10)) / det;
            Some((sat(ix), sat(iy)))
        } else if self.kind & Self::KIND_SCALE != 0 {
            if self.m00 == 0 || self.m11 == 0 {
                return None;
            }
            let ix = (x << fixed::FRACTION_BITS) / i64::from(self.m00);
            let iy = (y << fixed::FRACTION_BITS) / i64::from(self.m11);
            Some((sat(ix), sat(iy)))
        } else {
            Some((sat(x), sat(y)))
        }
    }

    /// Fixed-point extent `(min_x, min_y, max_x, max_y)` of the box `(0, 0, w, h)` mapped
    /// through this transform.
    pub fn corner_bounds(&self, w: Fixed, h: Fixed) -> (Fixed, Fixed, Fixed, Fixed) {
        let x1 = i64::from(self.m02);
        let y1 = i64::from(self.m12);
        let x2 = i64::from(fixed::mul(self.m00, w));
        let y2 = i64::from(fixed::mul(self.m10, w));
        let x3 = i64::from(fixed::mul(self.m01, h));
        let y3 = i64::from(fixed::mul(self.m11, h));
        let x4 = x1 + x2 + x3;
        let y4 = y1 + y2 + y3;
        let (x2, y2, x3, y3) = (x1 + x2, y1 + y2, x1 + x3, y1 + y3);

        let sat =
            |v: i64| v.clamp(i64::from(fixed::MIN_VALUE), i64::from(fixed::MAX_VALUE)) as Fixed;
        (
            sat(x1.min(x2).min(x3).min(x4)),
            sat(y1.min(y2).min(y3).min(y4)),
            sat(x1.max(x2).max(x3).max(x4)),
            sat(y1.max(y2).max(y3).max(y4)),
        )
    }

    /// Integer bounding box of the box `(0, 0, w, h)` mapped through this transform: floor of
    /// the min corner, ceil of the max corner.
    pub fn get_bounds(&self, w: Fixed, h: Fixed) -> IntRect {
        let (x1, y1, x2, y2) = self.corner_bounds(w, h);
        let bx = fixed::to_int_floor(x1);
        let by = fixed::to_int_floor(y1);
        IntRect::new(
            bx,
            by,
            fixed::to_int_ceil(x2) - bx,
            fixed::to_int_ceil(y2) - by,
        )
    }

    pub fn to_kurbo(&self) -> kurbo::Affine {
        kurbo::Affine::new([
            fixed::to_f64(self.m00),
            fixed::to_f64(self.m10),
            fixed::to_f64(self.m01),
            fixed::to_f64(self.m11),
            fixed::to_f64(self.m02),
            fixed::to_f64(self.m12),
        ])
    }

    pub fn from_kurbo(a: kurbo::Affine) -> Self {
        let [c0, c1, c2, c3, c4, c5] = a.as_coeffs();
        Self::from_coefficients(
            fixed::to_fixed_f64(c0),
            fixed::to_fixed_f64(c2),
            fixed::to_fixed_f64(c4),
            fixed::to_fixed_f64(c1),
            fixed::to_fixed_f64(c3),
            fixed::to_fixed_f64(c5),
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transform/affine.rs"]
mod tests;
