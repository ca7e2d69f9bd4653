use crate::iteration::{IterationParams, IterationResult};

/// The Mandelbrot set iterated directly in `f64`: `z_{n+1} = z_n² + c`,
/// starting from `z₀ = 0`.
///
/// Only valid while the working precision fits the `f64` mantissa; deeper
/// views go through perturbation.
#[derive(Debug, Clone, Copy)]
pub struct Mandelbrot {
    params: IterationParams,
    bailout: f64,
}

impl Mandelbrot {
    pub fn new(params: IterationParams) -> Self {
        Self {
            params,
            bailout: params.bailout(),
        }
    }

    #[inline]
    pub fn params(&self) -> &IterationParams {
        &self.params
    }

    /// Iterate the point `re + im·i`.
    pub fn iterate(&self, re: f64, im: f64) -> IterationResult {
        // Fast rejection: skip iteration for points known to be interior.
        if in_cardioid(re, im) || in_period2_bulb(re, im) {
            return IterationResult::Interior;
        }

        let mut zr = 0.0_f64;
        let mut zi = 0.0_f64;
        let mut zrq = 0.0_f64;
        let mut ziq = 0.0_f64;

        for n in 0..=self.params.max_iterations {
            zi = 2.0 * zr * zi + im;
            zr = zrq - ziq + re;
            zrq = zr * zr;
            ziq = zi * zi;
            let norm_sq = zrq + ziq;
            if norm_sq > self.bailout {
                return IterationResult::escaped_at(n, norm_sq);
            }
        }

        IterationResult::Interior
    }
}

impl Default for Mandelbrot {
    fn default() -> Self {
        Self::new(IterationParams::default())
    }
}

/// Returns `true` if `c` lies inside the main cardioid.
///
/// This is a closed-form check that avoids iterating ~30–40% of visible
/// points at the default zoom level.
#[inline]
fn in_cardioid(re: f64, im: f64) -> bool {
    let im2 = im * im;
    let q = (re - 0.25) * (re - 0.25) + im2;
    q * (q + (re - 0.25)) <= 0.25 * im2
}

/// Returns `true` if `c` lies inside the period-2 bulb.
#[inline]
fn in_period2_bulb(re: f64, im: f64) -> bool {
    (re + 1.0) * (re + 1.0) + im * im <= 0.0625
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mb(smooth: bool) -> Mandelbrot {
        Mandelbrot::new(IterationParams::new(1000, smooth).unwrap())
    }

    #[test]
    fn origin_is_interior() {
        assert_eq!(mb(false).iterate(0.0, 0.0), IterationResult::Interior);
    }

    #[test]
    fn far_point_escapes_on_first_step() {
        // z₁ = c, |c|² = 100 > 4.
        assert_eq!(mb(false).iterate(10.0, 0.0).value(), 4);
    }

    #[test]
    fn known_escape_count() {
        // c = 1: z₁=1, z₂=2 (|z|²=4, not > 4), z₃=5 → escapes at step 2.
        match mb(false).iterate(1.0, 0.0) {
            IterationResult::Escaped {
                iterations,
                norm_sq,
            } => {
                assert_eq!(iterations, 6);
                assert_eq!(norm_sq, 25.0);
            }
            IterationResult::Interior => panic!("c=1.0 should escape"),
        }
    }

    #[test]
    fn smoothing_uses_larger_bailout() {
        // c = 1: z = 1, 2, 5, 26 → |z|² = 676 > 128 at step 3.
        assert_eq!(mb(true).iterate(1.0, 0.0).value(), 7);
    }

    #[test]
    fn period2_bulb_interior() {
        assert_eq!(mb(false).iterate(-1.0, 0.0), IterationResult::Interior);
    }

    #[test]
    fn cap_reached_is_interior() {
        // c = -2 stays bounded on the real axis, outside the fast checks.
        let m = Mandelbrot::new(IterationParams::new(50, false).unwrap());
        assert_eq!(m.iterate(-2.0, 0.0), IterationResult::Interior);
    }

    #[test]
    fn deterministic_results() {
        let m = mb(true);
        let points = [(0.0, 0.0), (-0.75, 0.1), (0.3, 0.5), (-2.0, 0.0), (1.0, 1.0)];
        let run1: Vec<_> = points.iter().map(|&(re, im)| m.iterate(re, im)).collect();
        let run2: Vec<_> = points.iter().map(|&(re, im)| m.iterate(re, im)).collect();
        assert_eq!(run1, run2, "iteration results must be deterministic");
    }
}
