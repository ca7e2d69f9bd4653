use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use dashu::integer::{IBig, UBig};
use dashu_base::{BitTest, UnsignedAbs};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::ext_float::ExtFloat;

/// Scale used for values created before a zoom-derived precision is known.
pub const DEFAULT_SCALE: u32 = 60;

/// Largest decimal exponent accepted by [`FixedPoint::from_decimal_str`].
const MAX_DECIMAL_EXPONENT: i64 = 100_000;

const LOG10_2: f64 = std::f64::consts::LOG10_2;

/// An arbitrary-precision signed real number: `mantissa × 2^-scale`.
///
/// Binary operations require both operands to carry the same scale. A
/// mismatch is a programming error and panics in every build profile; use
/// [`with_scale`](Self::with_scale) to bring values to a common scale first.
#[derive(Clone, PartialEq, Eq)]
pub struct FixedPoint {
    mantissa: IBig,
    scale: u32,
}

impl FixedPoint {
    /// Build a value directly from its raw mantissa.
    pub fn from_mantissa(mantissa: IBig, scale: u32) -> Self {
        Self { mantissa, scale }
    }

    pub fn zero(scale: u32) -> Self {
        Self {
            mantissa: IBig::ZERO,
            scale,
        }
    }

    /// Exact conversion of an integer.
    pub fn from_int(value: i64, scale: u32) -> Self {
        Self {
            mantissa: IBig::from(value) << scale as usize,
            scale,
        }
    }

    /// Round a native float to the nearest representable value at `scale`.
    ///
    /// The float is decomposed into its 53-bit significand and exponent
    /// before shifting, so tiny values keep all of their significant bits
    /// when the scale is large enough to hold them. Non-finite input maps
    /// to zero.
    pub fn from_f64(value: f64, scale: u32) -> Self {
        Self::from_ext(ExtFloat::from_f64(value), scale)
    }

    /// Round an extended-range float to the nearest value at `scale`.
    pub fn from_ext(value: ExtFloat, scale: u32) -> Self {
        if value.is_zero() {
            return Self::zero(scale);
        }
        // mantissa ∈ [0.5, 1), so this product is an exact 53-bit integer.
        let significand = (value.mantissa() * TWO_POW_53) as i64;
        let shift = value.exponent() - 53 + scale as i64;
        Self {
            mantissa: shift_rounded(IBig::from(significand), shift),
            scale,
        }
    }

    /// Parse a decimal literal such as `-0.743643887037158704752191506114774`
    /// or `1.5e-40`, rounding to the nearest value at `scale`.
    pub fn from_decimal_str(input: &str, scale: u32) -> crate::Result<Self> {
        let invalid = |reason: &str| CoreError::InvalidDecimal {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        let (negative, unsigned) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let (number, exponent) = match unsigned.find(&['e', 'E'][..]) {
            Some(idx) => {
                let exp = unsigned[idx + 1..]
                    .parse::<i64>()
                    .map_err(|_| invalid("malformed exponent"))?;
                (&unsigned[..idx], exp)
            }
            None => (unsigned, 0),
        };

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid("no digits"));
        }
        if !int_part
            .bytes()
            .chain(frac_part.bytes())
            .all(|b| b.is_ascii_digit())
        {
            return Err(invalid("unexpected character"));
        }

        let decimal_exp = exponent - frac_part.len() as i64;
        if decimal_exp.abs() > MAX_DECIMAL_EXPONENT {
            return Err(invalid("exponent out of range"));
        }

        let digits: UBig = format!("{int_part}{frac_part}")
            .parse()
            .map_err(|_| invalid("malformed digits"))?;
        let ten = UBig::from(10u8);
        let magnitude = if decimal_exp >= 0 {
            (digits * ten.pow(decimal_exp as usize)) << scale as usize
        } else {
            let denominator = ten.pow((-decimal_exp) as usize);
            ((digits << scale as usize) + (&denominator >> 1)) / denominator
        };

        let mantissa = IBig::from(magnitude);
        Ok(Self {
            mantissa: if negative { -mantissa } else { mantissa },
            scale,
        })
    }

    /// Parse the decimal mantissa string used by the JSON representation.
    pub fn parse_mantissa(mantissa: &str, scale: u32) -> crate::Result<Self> {
        let mantissa = mantissa
            .trim()
            .parse::<IBig>()
            .map_err(|_| CoreError::InvalidMantissa(mantissa.to_string()))?;
        Ok(Self { mantissa, scale })
    }

    #[inline]
    pub fn mantissa(&self) -> &IBig {
        &self.mantissa
    }

    #[inline]
    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == IBig::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa < IBig::ZERO
    }

    #[inline]
    fn assert_same_scale(&self, other: &Self) {
        assert_eq!(
            self.scale, other.scale,
            "fixed-point scale mismatch: {} vs {}",
            self.scale, other.scale
        );
    }

    pub fn add(&self, other: &Self) -> Self {
        self.assert_same_scale(other);
        Self {
            mantissa: &self.mantissa + &other.mantissa,
            scale: self.scale,
        }
    }

    pub fn subtract(&self, other: &Self) -> Self {
        self.assert_same_scale(other);
        Self {
            mantissa: &self.mantissa - &other.mantissa,
            scale: self.scale,
        }
    }

    /// Product rescaled back to the common scale (floor of the exact product).
    pub fn multiply(&self, other: &Self) -> Self {
        self.assert_same_scale(other);
        Self {
            mantissa: (&self.mantissa * &other.mantissa) >> self.scale as usize,
            scale: self.scale,
        }
    }

    /// Quotient at the common scale, truncated toward zero.
    ///
    /// # Panics
    ///
    /// Panics on a zero divisor or on a scale mismatch.
    pub fn divide(&self, other: &Self) -> Self {
        self.assert_same_scale(other);
        assert!(!other.is_zero(), "fixed-point division by zero");
        Self {
            mantissa: (&self.mantissa << self.scale as usize) / &other.mantissa,
            scale: self.scale,
        }
    }

    pub fn min(&self, other: &Self) -> Self {
        self.assert_same_scale(other);
        if self.mantissa < other.mantissa {
            self.clone()
        } else {
            other.clone()
        }
    }

    pub fn max(&self, other: &Self) -> Self {
        self.assert_same_scale(other);
        if self.mantissa > other.mantissa {
            self.clone()
        } else {
            other.clone()
        }
    }

    pub fn leq(&self, other: &Self) -> bool {
        self.assert_same_scale(other);
        self.mantissa <= other.mantissa
    }

    /// Re-express the value at another scale. Reducing the scale drops
    /// low-order bits (floor).
    pub fn with_scale(&self, scale: u32) -> Self {
        let mantissa = match scale.cmp(&self.scale) {
            std::cmp::Ordering::Equal => return self.clone(),
            std::cmp::Ordering::Greater => &self.mantissa << (scale - self.scale) as usize,
            std::cmp::Ordering::Less => &self.mantissa >> (self.scale - scale) as usize,
        };
        Self { mantissa, scale }
    }

    /// `floor(log2(|value|))`, or 0 for zero.
    ///
    /// Works for values far outside the `f64` range in both directions;
    /// values below 1 yield negative results.
    pub fn bit_length(&self) -> i64 {
        let bits = magnitude_bits(&self.mantissa);
        if bits == 0 {
            return 0;
        }
        bits as i64 - 1 - self.scale as i64
    }

    /// Nearest `f64`; underflows to zero or overflows to infinity when the
    /// value is outside the native range.
    pub fn to_f64(&self) -> f64 {
        self.to_ext().to_f64()
    }

    /// Lossless-in-range projection to an extended float (53-bit
    /// significand, unbounded exponent).
    pub fn to_ext(&self) -> ExtFloat {
        mantissa_to_ext(&self.mantissa, self.scale)
    }

    /// Fixed-length decimal that parses back to the same value at
    /// this scale: `ceil(scale · log10 2)` fractional digits, rounded to
    /// nearest.
    pub fn to_decimal_string(&self) -> String {
        let scale = self.scale as usize;
        let magnitude: UBig = self.mantissa.clone().unsigned_abs();
        let int_part = &magnitude >> scale;
        let frac = magnitude - (&int_part << scale);

        let sign = if self.is_negative() { "-" } else { "" };
        let frac_digits = (self.scale as f64 * LOG10_2).ceil() as usize;
        if frac_digits == 0 || frac == UBig::ZERO {
            return format!("{sign}{int_part}");
        }

        let unit = UBig::from(10u8).pow(frac_digits);
        let half = UBig::ONE << (scale - 1);
        // 10^digits >= 2^scale, so rounding never carries into the integer part.
        let scaled = (frac * unit + half) >> scale;
        let padded = format!("{:0>width$}", scaled.to_string(), width = frac_digits);
        let trimmed = padded.trim_end_matches('0');
        if trimmed.is_empty() {
            format!("{sign}{int_part}")
        } else {
            format!("{sign}{int_part}.{trimmed}")
        }
    }
}

const TWO_POW_53: f64 = 9_007_199_254_740_992.0;

/// Shift left for positive `shift`, right with round-half-up otherwise.
fn shift_rounded(value: IBig, shift: i64) -> IBig {
    if shift >= 0 {
        value << shift as usize
    } else {
        let bits = (-shift) as usize;
        (value + (IBig::ONE << (bits - 1))) >> bits
    }
}

fn magnitude_bits(value: &IBig) -> usize {
    let magnitude: UBig = value.clone().unsigned_abs();
    magnitude.bit_len()
}

/// `mantissa × 2^-scale` as an extended float, without building a
/// [`FixedPoint`].
pub(crate) fn mantissa_to_ext(mantissa: &IBig, scale: u32) -> ExtFloat {
    let (top, shift) = leading_bits(mantissa);
    ExtFloat::from_f64(top as f64).mul_pow2(shift as i64 - scale as i64)
}

/// The top (at most 63) bits of `value` as an `i64`, plus the number of
/// bits shifted away.
fn leading_bits(value: &IBig) -> (i64, usize) {
    let bits = magnitude_bits(value);
    if bits <= 63 {
        return (i64::try_from(value.clone()).unwrap_or(0), 0);
    }
    let shift = bits - 63;
    (i64::try_from(value >> shift).unwrap_or(0), shift)
}

macro_rules! forward_binop {
    ($trait:ident, $method:ident, $named:ident) => {
        impl $trait<&FixedPoint> for &FixedPoint {
            type Output = FixedPoint;

            #[inline]
            fn $method(self, rhs: &FixedPoint) -> FixedPoint {
                FixedPoint::$named(self, rhs)
            }
        }
    };
}

forward_binop!(Add, add, add);
forward_binop!(Sub, sub, subtract);
forward_binop!(Mul, mul, multiply);
forward_binop!(Div, div, divide);

impl Neg for FixedPoint {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            mantissa: -self.mantissa,
            scale: self.scale,
        }
    }
}

impl Neg for &FixedPoint {
    type Output = FixedPoint;

    fn neg(self) -> FixedPoint {
        FixedPoint {
            mantissa: -&self.mantissa,
            scale: self.scale,
        }
    }
}

impl fmt::Debug for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FixedPoint({} / 2^{} ≈ {:e})",
            self.mantissa,
            self.scale,
            self.to_f64()
        )
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

/// Wire form: `{"mantissa": "<decimal>", "scale": <bits>}`.
#[derive(Serialize, Deserialize)]
struct RawFixedPoint {
    mantissa: String,
    scale: u32,
}

impl Serialize for FixedPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawFixedPoint {
            mantissa: self.mantissa.to_string(),
            scale: self.scale,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FixedPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawFixedPoint::deserialize(deserializer)?;
        FixedPoint::parse_mantissa(&raw.mantissa, raw.scale).map_err(D::Error::custom)
    }
}
