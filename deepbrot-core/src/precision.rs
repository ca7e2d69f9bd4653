use serde::{Deserialize, Serialize};

use crate::fixed_point::FixedPoint;

/// Bits added on top of `log2(zoom × width)` so that neighbouring pixels
/// stay distinguishable.
pub const PRECISION_MARGIN: i64 = 5;

/// Minimum precision on the CPU backend. Up to this many bits a plain `f64`
/// escape-time loop is exact enough.
pub const CPU_MIN_PRECISION: u32 = 58;

/// Minimum precision on the GPU backend; GPU precision is also rounded up
/// to whole bytes.
pub const GPU_MIN_PRECISION: u32 = 64;

/// Largest precision rendered without perturbation.
pub const DIRECT_MAX_PRECISION: u32 = 58;

/// Largest precision at which perturbation deltas still fit the `f64`
/// exponent range.
pub const PERTURBATION_MAX_PRECISION: u32 = 1000;

/// Execution backend requested for a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Cpu,
    Gpu,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Gpu => f.write_str("gpu"),
        }
    }
}

/// Working precision derived from the current zoom and viewport width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecisionState {
    /// Mantissa bits carried by every coordinate of the view.
    pub precision: u32,
    /// Bits actually needed to resolve one pixel, before the backend floor.
    pub required_precision_bits: u32,
}

impl PrecisionState {
    /// `required = floor(log2(zoom × width)) + 5`; the precision is that
    /// value raised to the backend floor (and byte-aligned on the GPU).
    pub fn compute(zoom: &FixedPoint, width: u32, backend: Backend) -> Self {
        let span = zoom.multiply(&FixedPoint::from_int(width as i64, zoom.scale()));
        let required = (span.bit_length() + PRECISION_MARGIN).max(0) as u32;
        let precision = match backend {
            Backend::Cpu => required.max(CPU_MIN_PRECISION),
            Backend::Gpu => required.div_ceil(8).saturating_mul(8).max(GPU_MIN_PRECISION),
        };
        Self {
            precision,
            required_precision_bits: required,
        }
    }

    #[inline]
    pub fn strategy(&self) -> Strategy {
        Strategy::for_precision(self.precision)
    }
}

/// How a tile's pixels are iterated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strategy {
    /// Plain `f64` escape-time per pixel.
    Direct,
    /// Perturbation against a high-precision reference with `f64` deltas.
    Perturbation,
    /// Perturbation with extended-exponent deltas, for depths where the
    /// deltas underflow `f64`.
    ExtendedPerturbation,
}

impl Strategy {
    /// Pure and monotonic: a higher precision never selects a cheaper tier.
    pub fn for_precision(precision: u32) -> Self {
        if precision <= DIRECT_MAX_PRECISION {
            Self::Direct
        } else if precision <= PERTURBATION_MAX_PRECISION {
            Self::Perturbation
        } else {
            Self::ExtendedPerturbation
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Perturbation => "perturbation",
            Self::ExtendedPerturbation => "extended-perturbation",
        }
    }
}
