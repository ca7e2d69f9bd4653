use dashu::integer::IBig;
use serde::{Deserialize, Serialize};

use crate::cancel::StopCheck;
use crate::complex_point::ComplexPoint;
use crate::fixed_point::{mantissa_to_ext, FixedPoint};
use crate::iteration::IterationResult;

/// Fraction of `|Z|²` below which a perturbed orbit is considered
/// decorrelated from its reference.
pub const ERROR_BOUND_FACTOR: f64 = 1e-6;

/// After the nominal escape the reference keeps iterating until `|Z|²`
/// exceeds this, so that pixels escaping slightly later than the reference
/// still find samples.
pub const OVERSHOOT_BAILOUT: f64 = 1e10;

/// Upper bound on the samples recorded after the nominal escape.
pub const MAX_OVERSHOOT_SAMPLES: usize = 16;

/// One step of a reference orbit, projected to `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitSample {
    pub z_re: f64,
    pub z_im: f64,
    /// `|Z|² × ERROR_BOUND_FACTOR`.
    pub error_bound: f64,
}

impl OrbitSample {
    #[inline]
    fn new(z_re: f64, z_im: f64) -> Self {
        Self {
            z_re,
            z_im,
            error_bound: (z_re * z_re + z_im * z_im) * ERROR_BOUND_FACTOR,
        }
    }
}

/// The orbit of one point iterated at full working precision.
///
/// Sample `n` holds `Z_{n+1}`, so sample 0 is the point itself.
#[derive(Debug, Clone, PartialEq)]
pub struct HighPrecisionOrbit {
    pub result: IterationResult,
    pub samples: Vec<OrbitSample>,
}

impl HighPrecisionOrbit {
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Iterate `z ← z² + c` on fixed-point mantissas at the scale of `c`.
///
/// Steps `0..=max_iterations` are evaluated; escape at step `n` yields
/// `n + 4`. Returns `None` when `probe` reports cancellation.
pub fn compute_orbit(
    c: &ComplexPoint,
    max_iterations: u32,
    bailout: f64,
    probe: &mut StopCheck,
) -> Option<HighPrecisionOrbit> {
    let scale = c.scale();
    let shift = scale as usize;
    let cr = c.re.mantissa();
    let ci = c.im.mantissa();
    let bailout_fx = FixedPoint::from_f64(bailout, scale).mantissa().clone();

    let mut iter = FixedOrbit {
        zr: IBig::ZERO,
        zi: IBig::ZERO,
        zrq: IBig::ZERO,
        ziq: IBig::ZERO,
    };
    let capacity = (max_iterations as usize + 1).min(1 << 16);
    let mut samples = Vec::with_capacity(capacity);

    for n in 0..=max_iterations {
        iter.step(cr, ci, shift);
        let sample = iter.sample(scale);
        samples.push(sample);

        if &iter.zrq + &iter.ziq > bailout_fx {
            let norm_sq = sample.z_re * sample.z_re + sample.z_im * sample.z_im;
            let result = IterationResult::escaped_at(n, norm_sq);
            overshoot(&mut iter, cr, ci, shift, scale, &mut samples);
            return Some(HighPrecisionOrbit { result, samples });
        }

        if probe.tick(1) {
            return None;
        }
    }

    Some(HighPrecisionOrbit {
        result: IterationResult::Interior,
        samples,
    })
}

/// Mantissas of `z` and of its squared components at a common scale.
struct FixedOrbit {
    zr: IBig,
    zi: IBig,
    zrq: IBig,
    ziq: IBig,
}

impl FixedOrbit {
    #[inline]
    fn step(&mut self, cr: &IBig, ci: &IBig, shift: usize) {
        self.zi = ((&self.zr * &self.zi) << 1 >> shift) + ci;
        self.zr = &self.zrq - &self.ziq + cr;
        self.zrq = (&self.zr * &self.zr) >> shift;
        self.ziq = (&self.zi * &self.zi) >> shift;
    }

    #[inline]
    fn sample(&self, scale: u32) -> OrbitSample {
        OrbitSample::new(
            mantissa_to_ext(&self.zr, scale).to_f64(),
            mantissa_to_ext(&self.zi, scale).to_f64(),
        )
    }
}

fn overshoot(
    iter: &mut FixedOrbit,
    cr: &IBig,
    ci: &IBig,
    shift: usize,
    scale: u32,
    samples: &mut Vec<OrbitSample>,
) {
    for _ in 0..MAX_OVERSHOOT_SAMPLES {
        iter.step(cr, ci, shift);
        let sample = iter.sample(scale);
        samples.push(sample);
        if sample.error_bound / ERROR_BOUND_FACTOR > OVERSHOOT_BAILOUT {
            break;
        }
    }
}
