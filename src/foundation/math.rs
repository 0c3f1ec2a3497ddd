/// 64-bit FNV-1a hasher used for deterministic pixel fingerprints.
#[derive(Clone, Copy, Debug)]
pub struct Fnv1a64(u64);

impl Fnv1a64 {
    pub const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01B3;

    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn new_default() -> Self {
        Self(Self::OFFSET_BASIS)
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let mut h = self.0;
        for &b in bytes {
            h ^= u64::from(b);
            h = h.wrapping_mul(Self::PRIME);
        }
        self.0 = h;
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

/// `round(x * y / 255)` for 8-bit channel values.
#[inline]
pub fn mul_div255(x: u32, y: u32) -> u32 {
    ((x * y) + 127) / 255
}

/// Premultiplies a straight-alpha ARGB pixel.
#[inline]
pub fn premultiply(argb: u32) -> u32 {
    let a = argb >> 24;
    match a {
        0 => 0,
        255 => argb,
        _ => {
            let r = mul_div255((argb >> 16) & 0xff, a);
            let g = mul_div255((argb >> 8) & 0xff, a);
            let b = mul_div255(argb & 0xff, a);
            (a << 24) | (r << 16) | (g << 8) | b
        }
    }
}

/// Inverse of [`premultiply`], up to 8-bit rounding.
#[inline]
pub fn unpremultiply(argb: u32) -> u32 {
    let a = argb >> 24;
    match a {
        0 => 0,
        255 => argb,
        _ => {
            let un = |c: u32| ((c * 255 + (a >> 1)) / a).min(255);
            let r = un((argb >> 16) & 0xff);
            let g = un((argb >> 8) & 0xff);
            let b = un(argb & 0xff);
            (a << 24) | (r << 16) | (g << 8) | b
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
