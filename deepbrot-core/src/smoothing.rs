//! Continuous colour index from an escape count and the escaping magnitude.

use std::f64::consts::LN_2;

use crate::iteration::IterationResult;

/// Fold the fractional escape count into an adjusted integer count and a
/// sub-step byte.
///
/// Only counts above 3 are smoothed (the inside sentinel is left alone);
/// for those `nu = log2(ln(|z|²) / (2 ln 2))` gives
/// `count' = floor(count + 1 - nu)` and `smooth = floor(255 - 255·frac(nu))`.
pub fn smooth_value(iterations: i32, norm_sq: f64) -> (i32, u8) {
    if iterations <= 3 || !norm_sq.is_finite() || norm_sq <= 1.0 {
        return (iterations, 0);
    }
    let log_zn = norm_sq.ln() / 2.0;
    let nu = (log_zn / LN_2).log2();
    let adjusted = (iterations as f64 + 1.0 - nu).floor() as i32;
    let frac = nu - nu.floor();
    let smooth = (255.0 - 255.0 * frac).floor().clamp(0.0, 255.0) as u8;
    (adjusted, smooth)
}

/// Value and smooth byte for a pixel result. Without smoothing the byte is
/// always 0 and the value is the raw count.
#[inline]
pub fn smoothen(result: &IterationResult, smooth: bool) -> (i32, u8) {
    match result {
        IterationResult::Escaped {
            iterations,
            norm_sq,
        } if smooth => smooth_value(*iterations as i32, *norm_sq),
        _ => (result.value(), 0),
    }
}
