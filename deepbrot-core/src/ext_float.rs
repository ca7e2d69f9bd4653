//! Extended-range floating point: an `f64` significand with an explicit
//! power-of-two exponent, so deltas far below `f64::MIN_POSITIVE` keep their
//! 53 significant bits.

use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// `ldexp` is only meaningful inside this window; outside it the result is
/// already zero or infinite.
const LDEXP_MIN: i64 = -1100;
const LDEXP_MAX: i64 = 1100;

/// Exponent gap beyond which the smaller addend no longer affects the sum.
const ALIGN_LIMIT: i64 = 64;

/// `mantissa × 2^exp`, with `|mantissa|` in `[0.5, 1)` or exactly zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtFloat {
    mantissa: f64,
    exp: i64,
}

impl ExtFloat {
    pub const ZERO: Self = Self {
        mantissa: 0.0,
        exp: 0,
    };

    /// Normalise `mantissa × 2^exp`.
    pub fn new(mantissa: f64, exp: i64) -> Self {
        if mantissa == 0.0 || !mantissa.is_finite() {
            return Self::ZERO;
        }
        let (m, e) = libm::frexp(mantissa);
        Self {
            mantissa: m,
            exp: exp + e as i64,
        }
    }

    #[inline]
    pub fn from_f64(value: f64) -> Self {
        Self::new(value, 0)
    }

    #[inline]
    pub fn mantissa(&self) -> f64 {
        self.mantissa
    }

    #[inline]
    pub fn exponent(&self) -> i64 {
        self.exp
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.mantissa == 0.0
    }

    /// Nearest `f64`, saturating to zero or infinity.
    pub fn to_f64(self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        ldexp_clamped(self.mantissa, self.exp)
    }

    /// Multiply by `2^k` without touching the significand.
    pub fn mul_pow2(self, k: i64) -> Self {
        if self.is_zero() {
            return self;
        }
        Self {
            mantissa: self.mantissa,
            exp: self.exp + k,
        }
    }
}

fn ldexp_clamped(value: f64, exp: i64) -> f64 {
    libm::ldexp(value, exp.clamp(LDEXP_MIN, LDEXP_MAX) as i32)
}

impl Add for ExtFloat {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }
        let (big, small) = if self.exp >= rhs.exp {
            (self, rhs)
        } else {
            (rhs, self)
        };
        let gap = big.exp - small.exp;
        if gap > ALIGN_LIMIT {
            return big;
        }
        Self::new(
            big.mantissa + libm::ldexp(small.mantissa, -(gap as i32)),
            big.exp,
        )
    }
}

impl Sub for ExtFloat {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Neg for ExtFloat {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self {
            mantissa: -self.mantissa,
            exp: self.exp,
        }
    }
}

impl Mul for ExtFloat {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::ZERO;
        }
        Self::new(self.mantissa * rhs.mantissa, self.exp + rhs.exp)
    }
}

/// A complex number with [`ExtFloat`] components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtComplex {
    pub re: ExtFloat,
    pub im: ExtFloat,
}

impl ExtComplex {
    pub const ZERO: Self = Self {
        re: ExtFloat::ZERO,
        im: ExtFloat::ZERO,
    };

    #[inline]
    pub fn new(re: ExtFloat, im: ExtFloat) -> Self {
        Self { re, im }
    }

    #[inline]
    pub fn from_f64(re: f64, im: f64) -> Self {
        Self {
            re: ExtFloat::from_f64(re),
            im: ExtFloat::from_f64(im),
        }
    }

    #[inline]
    pub fn to_f64(self) -> (f64, f64) {
        (self.re.to_f64(), self.im.to_f64())
    }

    /// Product with a native complex `(re, im)`.
    pub fn mul_f64(self, re: f64, im: f64) -> Self {
        let re = ExtFloat::from_f64(re);
        let im = ExtFloat::from_f64(im);
        Self {
            re: self.re * re - self.im * im,
            im: self.re * im + self.im * re,
        }
    }
}

impl Add for ExtComplex {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            re: self.re + rhs.re,
            im: self.im + rhs.im,
        }
    }
}

impl Sub for ExtComplex {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            re: self.re - rhs.re,
            im: self.im - rhs.im,
        }
    }
}
