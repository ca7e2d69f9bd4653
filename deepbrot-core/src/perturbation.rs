use crate::ext_float::ExtComplex;
use crate::iteration::IterationResult;
use crate::orbit::OrbitSample;
use crate::precision::Strategy;

/// Why a perturbed orbit could not be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlitchKind {
    /// `|Z + ε|²` fell below the reference's error bound.
    Decorrelated,
    /// The pixel outlived the recorded reference orbit.
    OrbitExhausted,
}

/// Outcome of iterating one pixel against one reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PerturbationResult {
    Resolved(IterationResult),
    /// Retry with another reference.
    Glitch(GlitchKind),
}

impl PerturbationResult {
    #[inline]
    pub fn is_glitch(&self) -> bool {
        matches!(self, Self::Glitch(_))
    }
}

/// Iterate a pixel at offset `δ` from the reference whose orbit is given,
/// with `f64` deltas.
///
/// `ε₀ = δ`, `εₙ₊₁ = (2·Zₙ + εₙ)·εₙ + δ`. The glitch test runs before the
/// escape test at every step.
pub fn perturb_f64(
    delta: (f64, f64),
    orbit: &[OrbitSample],
    max_iterations: u32,
    bailout: f64,
) -> PerturbationResult {
    let (dr, di) = delta;
    let mut er = dr;
    let mut ei = di;

    for n in 0..=max_iterations {
        let Some(z) = orbit.get(n as usize) else {
            return PerturbationResult::Glitch(GlitchKind::OrbitExhausted);
        };

        let zzr = z.z_re + er;
        let zzi = z.z_im + ei;
        let zzq = zzr * zzr + zzi * zzi;
        if zzq < z.error_bound {
            return PerturbationResult::Glitch(GlitchKind::Decorrelated);
        }
        if zzq > bailout {
            return PerturbationResult::Resolved(IterationResult::escaped_at(n, zzq));
        }

        // 2·Zₙ + εₙ = Zₙ + (Zₙ + εₙ)
        let tr = z.z_re + zzr;
        let ti = z.z_im + zzi;
        let next_r = tr * er - ti * ei + dr;
        let next_i = tr * ei + ti * er + di;
        er = next_r;
        ei = next_i;
    }

    PerturbationResult::Resolved(IterationResult::Interior)
}

/// Same recurrence with extended-range deltas, for depths where `δ`
/// underflows `f64`. The full value `Z + ε` is only ever needed at `f64`
/// precision.
pub fn perturb_ext(
    delta: ExtComplex,
    orbit: &[OrbitSample],
    max_iterations: u32,
    bailout: f64,
) -> PerturbationResult {
    let mut eps = delta;

    for n in 0..=max_iterations {
        let Some(z) = orbit.get(n as usize) else {
            return PerturbationResult::Glitch(GlitchKind::OrbitExhausted);
        };

        let (er, ei) = eps.to_f64();
        let zzr = z.z_re + er;
        let zzi = z.z_im + ei;
        let zzq = zzr * zzr + zzi * zzi;
        if zzq < z.error_bound {
            return PerturbationResult::Glitch(GlitchKind::Decorrelated);
        }
        if zzq > bailout {
            return PerturbationResult::Resolved(IterationResult::escaped_at(n, zzq));
        }

        eps = eps.mul_f64(z.z_re + zzr, z.z_im + zzi) + delta;
    }

    PerturbationResult::Resolved(IterationResult::Interior)
}

impl Strategy {
    /// Run the perturbation tier selected by this strategy. `Direct` has no
    /// reference orbit and is treated like `Perturbation`.
    pub fn perturb(
        &self,
        delta: ExtComplex,
        orbit: &[OrbitSample],
        max_iterations: u32,
        bailout: f64,
    ) -> PerturbationResult {
        match self {
            Strategy::ExtendedPerturbation => perturb_ext(delta, orbit, max_iterations, bailout),
            Strategy::Direct | Strategy::Perturbation => {
                perturb_f64(delta.to_f64(), orbit, max_iterations, bailout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::StopCheck;
    use crate::complex_point::ComplexPoint;
    use crate::orbit::compute_orbit;

    fn reference(re: f64, im: f64, max_iterations: u32, bailout: f64) -> Vec<OrbitSample> {
        let c = ComplexPoint::from_f64(re, im, 200);
        compute_orbit(&c, max_iterations, bailout, &mut StopCheck::never())
            .unwrap()
            .samples
    }

    #[test]
    fn zero_delta_reproduces_reference() {
        let c = ComplexPoint::from_f64(0.5, 0.5, 200);
        let orbit = compute_orbit(&c, 1000, 128.0, &mut StopCheck::never()).unwrap();
        let f = perturb_f64((0.0, 0.0), &orbit.samples, 1000, 128.0);
        assert_eq!(f, PerturbationResult::Resolved(orbit.result));
        let e = perturb_ext(ExtComplex::ZERO, &orbit.samples, 1000, 128.0);
        assert_eq!(e, PerturbationResult::Resolved(orbit.result));
    }

    #[test]
    fn exhausted_orbit_is_a_glitch() {
        // Three samples of an interior reference, but the pixel is allowed
        // a hundred steps.
        let orbit = reference(0.0, 0.0, 2, 4.0);
        assert_eq!(orbit.len(), 3);
        let r = perturb_f64((0.0, 0.0), &orbit, 100, 4.0);
        assert_eq!(r, PerturbationResult::Glitch(GlitchKind::OrbitExhausted));
    }

    #[test]
    fn pixel_hitting_zero_decorrelates() {
        // Reference escapes at once; the pixel sits at the origin where
        // |Z + ε|² = 0 is below any envelope.
        let orbit = reference(3.0, 0.0, 100, 4.0);
        let r = perturb_f64((-3.0, 0.0), &orbit, 100, 4.0);
        assert_eq!(r, PerturbationResult::Glitch(GlitchKind::Decorrelated));
    }

    #[test]
    fn manufactured_envelope_glitches() {
        let mut orbit = reference(-0.5, 0.0, 50, 4.0);
        for s in &mut orbit {
            s.error_bound = 1e3;
        }
        let r = perturb_f64((0.001, 0.001), &orbit, 50, 4.0);
        assert_eq!(r, PerturbationResult::Glitch(GlitchKind::Decorrelated));
    }

    #[test]
    fn close_pixel_matches_direct() {
        let orbit = reference(-0.75, 0.1, 2000, 4.0);
        let direct = crate::mandelbrot::Mandelbrot::new(
            crate::iteration::IterationParams::new(2000, false).unwrap(),
        );
        let mut agree = 0;
        let mut total = 0;
        for i in -5..=5 {
            for j in -5..=5 {
                let d = (i as f64 * 1e-9, j as f64 * 1e-9);
                let PerturbationResult::Resolved(r) = perturb_f64(d, &orbit, 2000, 4.0) else {
                    continue;
                };
                total += 1;
                if r.value() == direct.iterate(-0.75 + d.0, 0.1 + d.1).value() {
                    agree += 1;
                }
            }
        }
        assert!(total > 0);
        assert!(agree * 10 >= total * 9, "{agree}/{total}");
    }

    #[test]
    fn strategy_selects_tier() {
        let orbit = reference(0.5, 0.5, 200, 4.0);
        let delta = ExtComplex::from_f64(1e-12, -1e-12);
        let f = Strategy::Perturbation.perturb(delta, &orbit, 200, 4.0);
        let e = Strategy::ExtendedPerturbation.perturb(delta, &orbit, 200, 4.0);
        assert_eq!(f, e);
    }
}
