use serde::{Deserialize, Serialize};

use crate::ext_float::ExtComplex;
use crate::fixed_point::FixedPoint;

/// A point of the complex plane at fixed-point precision.
///
/// Both components always share one scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexPoint {
    pub re: FixedPoint,
    pub im: FixedPoint,
}

impl ComplexPoint {
    /// # Panics
    ///
    /// Panics when the components carry different scales.
    pub fn new(re: FixedPoint, im: FixedPoint) -> Self {
        assert_eq!(
            re.scale(),
            im.scale(),
            "complex point components must share a scale"
        );
        Self { re, im }
    }

    pub fn zero(scale: u32) -> Self {
        Self {
            re: FixedPoint::zero(scale),
            im: FixedPoint::zero(scale),
        }
    }

    pub fn from_f64(re: f64, im: f64, scale: u32) -> Self {
        Self {
            re: FixedPoint::from_f64(re, scale),
            im: FixedPoint::from_f64(im, scale),
        }
    }

    #[inline]
    pub fn scale(&self) -> u32 {
        self.re.scale()
    }

    pub fn with_scale(&self, scale: u32) -> Self {
        Self {
            re: self.re.with_scale(scale),
            im: self.im.with_scale(scale),
        }
    }

    pub fn add(&self, other: &Self) -> Self {
        Self {
            re: self.re.add(&other.re),
            im: self.im.add(&other.im),
        }
    }

    pub fn subtract(&self, other: &Self) -> Self {
        Self {
            re: self.re.subtract(&other.re),
            im: self.im.subtract(&other.im),
        }
    }

    #[inline]
    pub fn to_f64(&self) -> (f64, f64) {
        (self.re.to_f64(), self.im.to_f64())
    }

    pub fn to_ext(&self) -> ExtComplex {
        ExtComplex::new(self.re.to_ext(), self.im.to_ext())
    }

    pub fn from_ext(value: ExtComplex, scale: u32) -> Self {
        Self {
            re: FixedPoint::from_ext(value.re, scale),
            im: FixedPoint::from_ext(value.im, scale),
        }
    }

    /// Whether the point lies in the axis-aligned box spanned by `min`
    /// (smallest components) and `max`, bounds included.
    pub fn within(&self, min: &Self, max: &Self) -> bool {
        min.re.leq(&self.re)
            && self.re.leq(&max.re)
            && min.im.leq(&self.im)
            && self.im.leq(&max.im)
    }

    /// The difference `self - origin` as an extended-range complex.
    pub fn delta_from(&self, origin: &Self) -> ExtComplex {
        self.subtract(origin).to_ext()
    }
}
