use crate::foundation::fixed::int_div_floor;
use crate::foundation::fixed::int_div_round;

pub use kurbo::{Affine, Point, Rect};

/// Build-wide pixel convention. `true` unless the `straight-alpha` feature is enabled.
pub const PREMULTIPLIED_ALPHA: bool = !cfg!(feature = "straight-alpha");

/// Packed `0xAARRGGBB` pixel.
pub type Argb = u32;

/// Integer rectangle in device space.
///
/// Width or height `<= 0` means empty. Side selectors are the bit flags [`IntRect::LEFT`],
/// [`IntRect::TOP`], [`IntRect::RIGHT`] and [`IntRect::BOTTOM`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct IntRect {
    /// Left edge (inclusive).
    pub x: i32,
    /// Top edge (inclusive).
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl IntRect {
    pub const LEFT: u8 = 1;
    pub const TOP: u8 = 2;
    pub const RIGHT: u8 = 4;
    pub const BOTTOM: u8 = 8;

    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Pixel count; 0 for empty rectangles.
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            i64::from(self.width) * i64::from(self.height)
        }
    }

    /// Overlapping region. Disjoint inputs produce an empty rectangle.
    pub fn intersection(&self, other: &IntRect) -> IntRect {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        IntRect::new(x1, y1, (x2 - x1).max(0), (y2 - y1).max(0))
    }

    /// Bounding box of both rectangles. Empty inputs are ignored.
    pub fn union(&self, other: &IntRect) -> IntRect {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = self.right().max(other.right());
        let y2 = self.bottom().max(other.bottom());
        IntRect::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// `true` when the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &IntRect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.right() && y < self.bottom()
    }

    pub fn contains_rect(&self, other: &IntRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Grows the rectangle by `pad` on every side.
    pub fn inflate(&self, pad: i32) -> IntRect {
        IntRect::new(
            self.x - pad,
            self.y - pad,
            self.width + pad * 2,
            self.height + pad * 2,
        )
    }

    /// Coordinate of the given side.
    pub fn boundary(&self, side: u8) -> i32 {
        match side {
            Self::LEFT => self.x,
            Self::TOP => self.y,
            Self::RIGHT => self.right(),
            Self::BOTTOM => self.bottom(),
            _ => panic!("invalid rectangle side: {side}"),
        }
    }

    /// Moves one side to `value`, keeping the opposite side fixed.
    pub fn set_outside_boundary(&mut self, side: u8, value: i32) {
        match side {
            Self::LEFT => {
                self.width = self.right() - value;
                self.x = value;
            }
            Self::TOP => {
                self.height = self.bottom() - value;
                self.y = value;
            }
            Self::RIGHT => self.width = value - self.x,
            Self::BOTTOM => self.height = value - self.y,
            _ => panic!("invalid rectangle side: {side}"),
        }
    }

    /// Bit set of the sides of `other` that lie strictly inside `self`.
    pub fn intersection_code(&self, other: &IntRect) -> u8 {
        let inside_x = |v: i32| v > self.x && v < self.right();
        let inside_y = |v: i32| v > self.y && v < self.bottom();
        let mut code = 0;
        if inside_x(other.x) {
            code |= Self::LEFT;
        }
        if inside_y(other.y) {
            code |= Self::TOP;
        }
        if inside_x(other.right()) {
            code |= Self::RIGHT;
        }
        if inside_y(other.bottom()) {
            code |= Self::BOTTOM;
        }
        code
    }

    /// Opposite side selector (LEFT <-> RIGHT, TOP <-> BOTTOM).
    pub fn opposite_side(side: u8) -> u8 {
        ((side << 2) | (side >> 2)) & 0xf
    }

    pub fn to_kurbo(&self) -> Rect {
        Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.right()),
            f64::from(self.bottom()),
        )
    }

    /// Smallest integer rectangle covering `r`.
    pub fn from_kurbo_outer(r: Rect) -> IntRect {
        let r = r.abs();
        let x0 = r.x0.floor() as i32;
        let y0 = r.y0.floor() as i32;
        let x1 = r.x1.ceil() as i32;
        let y1 = r.y1.ceil() as i32;
        IntRect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Named opaque colors.
pub mod colors {
    use super::Argb;

    pub const TRANSPARENT: Argb = 0x0000_0000;
    pub const BLACK: Argb = 0xff00_0000;
    pub const WHITE: Argb = 0xffff_ffff;
    pub const LIGHTGRAY: Argb = 0xffc0_c0c0;
    pub const GRAY: Argb = 0xff80_8080;
    pub const DARKGRAY: Argb = 0xff40_4040;
    pub const RED: Argb = 0xffff_0000;
    pub const ORANGE: Argb = 0xffff_c800;
    pub const YELLOW: Argb = 0xffff_ff00;
    pub const GREEN: Argb = 0xff00_ff00;
    pub const CYAN: Argb = 0xff00_ffff;
    pub const BLUE: Argb = 0xff00_00ff;
    pub const PURPLE: Argb = 0xffa2_00ff;
    pub const MAGENTA: Argb = 0xffff_00ff;
}

pub fn argb(a: u8, r: u8, g: u8, b: u8) -> Argb {
    (u32::from(a) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

pub fn rgb(r: u8, g: u8, b: u8) -> Argb {
    argb(0xff, r, g, b)
}

pub fn gray(v: u8) -> Argb {
    rgb(v, v, v)
}

/// Replaces the alpha of `color`.
pub fn with_alpha(color: Argb, alpha: u8) -> Argb {
    (u32::from(alpha) << 24) | (color & 0x00ff_ffff)
}

pub fn alpha_of(color: Argb) -> u32 {
    color >> 24
}

pub fn red_of(color: Argb) -> u32 {
    (color >> 16) & 0xff
}

pub fn green_of(color: Argb) -> u32 {
    (color >> 8) & 0xff
}

pub fn blue_of(color: Argb) -> u32 {
    color & 0xff
}

/// Converts ARGB to packed AHSB where hue, saturation and brightness are each 0..=255. Alpha is
/// preserved.
pub fn rgb_to_hsb(argb_color: Argb) -> u32 {
    let a = alpha_of(argb_color);
    let r = red_of(argb_color) as i32;
    let g = green_of(argb_color) as i32;
    let b = blue_of(argb_color) as i32;

    let min = r.min(g).min(b);
    let max = r.max(g).max(b);
    let v = max as u32;
    if min == max {
        return (a << 24) | v;
    }

    let diff = max - min;
    let s = if diff == max {
        255
    } else {
        int_div_round(diff << 8, max)
    };

    let h = if r == max {
        g - b
    } else if g == max {
        (diff << 1) + (b - r)
    } else {
        (diff << 2) + (r - g)
    };
    let h = int_div_floor(h << 8, diff * 6) & 0xff;

    (a << 24) | ((h as u32) << 16) | ((s as u32 & 0xff) << 8) | v
}

/// Inverse of [`rgb_to_hsb`].
pub fn hsb_to_rgb(ahsb: u32) -> Argb {
    let a = ahsb >> 24;
    let h = ((ahsb >> 16) & 0xff) as i32;
    let s = ((ahsb >> 8) & 0xff) as i32;
    let v = (ahsb & 0xff) as i32;

    if s == 0 {
        let v = v as u32;
        return (a << 24) | (v << 16) | (v << 8) | v;
    }

    let h6 = h * 6;
    let i = h6 >> 8;
    let f = h6 - (i << 8);

    let p = s * 255;
    let q = s * f;
    let t = p - q;

    let (r, g, b) = match i {
        0 => (0, t, p),
        1 => (q, 0, p),
        2 => (p, 0, t),
        3 => (p, q, 0),
        4 => (t, p, 0),
        _ => (0, p, q),
    };

    // p, q and t are in units of 1/(255*255).
    let scale = |c: i32| ((v * (65_025 - c) + 32_512) / 65_025) as u32;
    (a << 24) | (scale(r) << 16) | (scale(g) << 8) | scale(b)
}

/// Opaque color from hue, saturation and brightness (each 0..=255).
pub fn hsb(h: u8, s: u8, b: u8) -> Argb {
    hsb_to_rgb((0xff << 24) | (u32::from(h) << 16) | (u32::from(s) << 8) | u32::from(b))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
