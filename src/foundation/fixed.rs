//! 16.16 fixed-point arithmetic.
//!
//! A [`Fixed`] is a plain `i32` holding `real * 2^16`. Addition, subtraction, multiplication by
//! an integer and division by an integer use the ordinary operators; fixed-by-fixed products and
//! quotients go through [`mul`], [`div`] and [`mul_div`].
//!
//! Overflow policy: every conversion and every fixed-by-fixed operation saturates at
//! [`MAX_VALUE`]/[`MIN_VALUE`] instead of wrapping. Division by zero saturates by the sign of the
//! numerator (and yields 0 for a zero numerator).

/// Fixed-point scalar (16 integer bits, 16 fractional bits).
pub type Fixed = i32;

pub const FRACTION_BITS: u32 = 16;
pub const FRACTION_MASK: Fixed = (1 << FRACTION_BITS) - 1;
pub const ONE: Fixed = 1 << FRACTION_BITS;
pub const ONE_HALF: Fixed = ONE >> 1;
pub const PI: Fixed = 205_887;
pub const TWO_PI: Fixed = 411_775;
pub const ONE_HALF_PI: Fixed = 102_944;
pub const E: Fixed = 178_145;

pub const MAX_VALUE: Fixed = i32::MAX;
pub const MIN_VALUE: Fixed = i32::MIN;
/// Largest integer representable without saturating.
pub const MAX_INT_VALUE: i32 = (1 << (31 - FRACTION_BITS)) - 1;
/// Smallest integer representable without saturating.
pub const MIN_INT_VALUE: i32 = -(1 << (31 - FRACTION_BITS));
/// `to_fixed_f64(MAX_F64_VALUE) == MAX_VALUE`.
pub const MAX_F64_VALUE: f64 = 32_767.999_992_370_602;
pub const MIN_F64_VALUE: f64 = -32_768.0;

// Range reduction for large angles drifts because TWO_PI is rounded; every 2^6 turns the
// accumulated error is corrected by TWO_PI_ERROR.
const TWO_PI_ERROR_FACTOR: u32 = 6;
const TWO_PI_ERROR: Fixed = -11;
const INTERNAL_BITS: u32 = 24;

#[inline]
fn saturate(v: i64) -> Fixed {
    v.clamp(i64::from(MIN_VALUE), i64::from(MAX_VALUE)) as Fixed
}

#[inline]
fn saturate_by_sign(numerator: i64) -> i64 {
    match numerator.signum() {
        1 => i64::from(MAX_VALUE),
        -1 => i64::from(MIN_VALUE),
        _ => 0,
    }
}

/// Converts an integer to fixed point, saturating outside `MIN_INT_VALUE..=MAX_INT_VALUE`.
#[inline]
pub fn to_fixed(n: i32) -> Fixed {
    if n > MAX_INT_VALUE {
        MAX_VALUE
    } else if n < MIN_INT_VALUE {
        MIN_VALUE
    } else {
        n << FRACTION_BITS
    }
}

/// Converts an `f64` to fixed point, rounding half up and saturating at the representable range.
pub fn to_fixed_f64(n: f64) -> Fixed {
    if n.is_nan() {
        return 0;
    }
    if n > MAX_F64_VALUE {
        MAX_VALUE
    } else if n < MIN_F64_VALUE {
        MIN_VALUE
    } else {
        saturate((n * f64::from(ONE) + 0.5).floor() as i64)
    }
}

#[inline]
pub fn to_f64(f: Fixed) -> f64 {
    f64::from(f) / f64::from(ONE)
}

/// Truncates toward zero, like casting a float to an integer.
#[inline]
pub fn to_int(f: Fixed) -> i32 {
    if f < 0 { to_int_ceil(f) } else { to_int_floor(f) }
}

#[inline]
pub fn to_int_floor(f: Fixed) -> i32 {
    f >> FRACTION_BITS
}

#[inline]
pub fn to_int_round(f: Fixed) -> i32 {
    to_int_floor(f.saturating_add(ONE_HALF))
}

#[inline]
pub fn to_int_ceil(f: Fixed) -> i32 {
    -to_int_floor(f.saturating_neg())
}

/// Fractional part of the magnitude of `f`.
#[inline]
pub fn frac_part(f: Fixed) -> Fixed {
    (f.unsigned_abs() & FRACTION_MASK as u32) as Fixed
}

/// Integer part of `f` (truncated toward zero), still in fixed point.
#[inline]
pub fn int_part(f: Fixed) -> Fixed {
    to_int(f) << FRACTION_BITS
}

#[inline]
pub fn floor(f: Fixed) -> Fixed {
    f & !FRACTION_MASK
}

#[inline]
pub fn ceil(f: Fixed) -> Fixed {
    floor(f.saturating_neg()).saturating_neg()
}

#[inline]
pub fn round(f: Fixed) -> Fixed {
    floor(f.saturating_add(ONE_HALF))
}

#[inline]
pub fn mul(f1: Fixed, f2: Fixed) -> Fixed {
    saturate((i64::from(f1) * i64::from(f2)) >> FRACTION_BITS)
}

#[inline]
pub fn div(f1: Fixed, f2: Fixed) -> Fixed {
    if f2 == 0 {
        return saturate(saturate_by_sign(i64::from(f1)));
    }
    saturate((i64::from(f1) << FRACTION_BITS) / i64::from(f2))
}

/// `f1 * f2 / f3` with a 64-bit intermediate.
#[inline]
pub fn mul_div(f1: Fixed, f2: Fixed, f3: Fixed) -> Fixed {
    let n = i64::from(f1) * i64::from(f2);
    if f3 == 0 {
        return saturate(saturate_by_sign(n));
    }
    saturate(n / i64::from(f3))
}

fn div_i64(f1: i64, f2: i64) -> i64 {
    if f2 == 0 {
        return saturate_by_sign(f1);
    }
    f1.saturating_mul(i64::from(ONE)) / f2
}

fn mul_i64(f1: i64, f2: i64) -> i64 {
    f1.saturating_mul(f2) >> FRACTION_BITS
}

fn sqrt_i64(mut fx: i64) -> i64 {
    if fx <= 0 {
        return 0;
    }
    if fx == i64::from(ONE) {
        return fx;
    }

    // Invert numbers less than one (unless they are too small to invert).
    let invert = fx < i64::from(ONE) && fx > 6;
    if invert {
        fx = div_i64(i64::from(ONE), fx);
    }

    let mut iterations = 16;
    if fx > i64::from(ONE) {
        let mut s = fx;
        iterations = 0;
        while s > 0 {
            s >>= 2;
            iterations += 1;
        }
    }

    let mut l = (fx >> 1) + 1;
    for _ in 1..iterations {
        l = (l + div_i64(fx, l)) >> 1;
    }

    if invert { div_i64(i64::from(ONE), l) } else { l }
}

/// Square root via Newton iteration. Negative input yields 0.
pub fn sqrt(fx: Fixed) -> Fixed {
    saturate(sqrt_i64(i64::from(fx)))
}

/// Distance between two fixed-point points.
pub fn dist(x1: Fixed, y1: Fixed, x2: Fixed, y2: Fixed) -> Fixed {
    let dx = i64::from(x1) - i64::from(x2);
    let dy = i64::from(y1) - i64::from(y2);
    saturate(sqrt_i64(mul_i64(dx, dx).saturating_add(mul_i64(dy, dy))))
}

/// Sine of a fixed-point angle in radians.
///
/// Results within 32 units of 0, `ONE` or `-ONE` snap to those values so that rotations by
/// multiples of a quarter turn stay pixel exact.
pub fn sin(mut fx: Fixed) -> Fixed {
    if fx == 0 {
        return 0;
    }

    // Reduce range to [-2pi, 2pi].
    let s = fx / TWO_PI;
    if s.abs() >= (1 << TWO_PI_ERROR_FACTOR) {
        fx -= s * TWO_PI + (s >> TWO_PI_ERROR_FACTOR) * TWO_PI_ERROR;
    } else {
        fx -= s * TWO_PI;
    }

    // Reduce range to [-pi/2, pi/2] to bound the Maclaurin series.
    if fx > PI {
        fx -= TWO_PI;
    } else if fx < -PI {
        fx += TWO_PI;
    }
    if fx > ONE_HALF_PI {
        fx = PI - fx;
    } else if fx < -ONE_HALF_PI {
        fx = -PI - fx;
    }

    if fx.abs() < 32 {
        return 0;
    } else if (fx - ONE_HALF_PI).abs() < 32 {
        return ONE;
    } else if (fx + ONE_HALF_PI).abs() < 32 {
        return -ONE;
    }

    let fx_squared = mul(fx, fx);
    let d = mul((1 << INTERNAL_BITS) / (2 * 3 * 4 * 5 * 6 * 7 * 8 * 9), fx_squared);
    let c = mul(d - (1 << INTERNAL_BITS) / (2 * 3 * 4 * 5 * 6 * 7), fx_squared);
    let b = mul(c + (1 << INTERNAL_BITS) / (2 * 3 * 4 * 5), fx_squared);
    let a = mul(b - (1 << INTERNAL_BITS) / (2 * 3), fx_squared);
    let sine = mul(a + (1 << INTERNAL_BITS), fx);
    sine >> (INTERNAL_BITS - FRACTION_BITS)
}

/// Cosine of a fixed-point angle in radians.
pub fn cos(fx: Fixed) -> Fixed {
    if fx == 0 {
        ONE
    } else if fx < 0 {
        sin(ONE_HALF_PI - TWO_PI - fx)
    } else {
        sin(ONE_HALF_PI - fx)
    }
}

/// Tangent; saturates where the cosine is zero.
pub fn tan(fx: Fixed) -> Fixed {
    let c = cos(fx);
    if c == 0 {
        return MAX_VALUE;
    }
    saturate(div_i64(i64::from(sin(fx)), i64::from(c)))
}

/// Arctangent, using a rational approximation accurate to about 1e-4 radians.
pub fn atan(mut fx: Fixed) -> Fixed {
    if fx == 0 {
        return 0;
    }
    let negative = fx < 0;
    if negative {
        fx = fx.saturating_neg();
    }
    let invert = fx > ONE;
    if invert {
        fx = div(ONE, fx);
    }

    // r(x) = (x + 0.43157974*x^3) / (1 + 0.76443945*x^2 + 0.05831938*x^4)
    let fx_pow2 = mul(fx, fx);
    let fx_pow3 = mul(fx_pow2, fx);
    let fx_pow4 = mul(fx_pow3, fx);
    let numer = fx + mul(28_284, fx_pow3);
    let denom = ONE + mul(50_098, fx_pow2) + mul(3_822, fx_pow4);
    let mut answer = div(numer, denom);

    if invert {
        answer = ONE_HALF_PI - answer;
    }
    if negative { -answer } else { answer }
}

/// Angle of the vector `(fx, fy)` in the range `[-PI, PI]`.
pub fn atan2(fy: Fixed, fx: Fixed) -> Fixed {
    if fy == 0 {
        return if fx < 0 { PI } else { 0 };
    }
    if fx == 0 {
        return if fy < 0 { -ONE_HALF_PI } else { ONE_HALF_PI };
    }

    let n = div_i64(i64::from(fy), i64::from(fx)).abs();
    let answer = if n >= i64::from(MAX_VALUE) {
        ONE_HALF_PI
    } else {
        atan(n as Fixed)
    };

    match (fy > 0, fx > 0) {
        (true, false) => PI - answer,
        (false, false) => answer - PI,
        (false, true) => -answer,
        (true, true) => answer,
    }
}

/// Integer division rounding toward negative infinity.
#[inline]
pub fn int_div_floor(n: i32, d: i32) -> i32 {
    debug_assert!(d != 0, "int_div_floor by zero");
    let (n, d) = (i64::from(n), i64::from(d));
    let q = if d > 0 && n < 0 {
        (n - d + 1) / d
    } else if d < 0 && n > 0 {
        (n - d - 1) / d
    } else {
        n / d
    };
    q.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Integer division rounding toward positive infinity.
#[inline]
pub fn int_div_ceil(n: i32, d: i32) -> i32 {
    -int_div_floor(n.saturating_neg(), d)
}

/// Integer division rounding half away from zero.
#[inline]
pub fn int_div_round(n: i32, d: i32) -> i32 {
    let (n, d) = (i64::from(n), i64::from(d));
    let q = if (d > 0) ^ (n > 0) {
        (n - (d >> 1)) / d
    } else {
        (n + (d >> 1)) / d
    };
    q.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[inline]
pub fn count_bits(n: u32) -> u32 {
    n.count_ones()
}

/// `floor(log2(n))` for `n > 0`; 0 otherwise.
#[inline]
pub fn log2(n: u32) -> u32 {
    n.checked_ilog2().unwrap_or(0)
}

/// Formats `f` with between 1 and 7 fractional digits.
pub fn format_fixed(f: Fixed) -> String {
    format_fixed_with(f, 1, 7, false)
}

/// Formats `f` with the given number of fractional digits and optional `,` grouping of the
/// integer part.
pub fn format_fixed_with(
    f: Fixed,
    min_frac_digits: u32,
    max_frac_digits: u32,
    grouping: bool,
) -> String {
    let int_part = i64::from(to_int(f)).abs();
    let frac32 = (frac_part(f) as u32) << (32 - FRACTION_BITS);
    format_number(
        int_part,
        frac32,
        f < 0,
        min_frac_digits,
        max_frac_digits,
        grouping,
    )
}

fn format_number(
    mut int_part: i64,
    frac32: u32,
    negative: bool,
    min_frac_digits: u32,
    max_frac_digits: u32,
    grouping: bool,
) -> String {
    const ONE32: u64 = 1 << 32;
    const MASK32: u64 = ONE32 - 1;

    let mut frac = u64::from(frac32);
    if max_frac_digits < 10 {
        let place = 10u64.pow(max_frac_digits);
        frac += (1u64 << 31) / place;
        if frac >= ONE32 {
            int_part += 1;
        }
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if !grouping || int_part == 0 {
        out.push_str(&int_part.to_string());
    } else {
        let digits = int_part.to_string();
        let lead = digits.len() % 3;
        for (i, ch) in digits.chars().enumerate() {
            if i != 0 && (i + 3 - lead) % 3 == 0 {
                out.push(',');
            }
            out.push(ch);
        }
    }

    if max_frac_digits == 0 || (frac32 == 0 && min_frac_digits == 0) {
        return out;
    }
    out.push('.');

    let mut num_frac_digits = 0;
    loop {
        frac = (frac & MASK32) * 10;
        let digit = ((frac >> 32) % 10) as u8;
        out.push(char::from(b'0' + digit));
        num_frac_digits += 1;
        if num_frac_digits == max_frac_digits || (frac & MASK32 == 0 && num_frac_digits >= min_frac_digits)
        {
            break;
        }
    }

    let mut removable = num_frac_digits.saturating_sub(min_frac_digits);
    while removable > 0 && out.ends_with('0') {
        out.pop();
        removable -= 1;
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/fixed.rs"]
mod tests;
