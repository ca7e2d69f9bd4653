use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Value reported for points that did not escape within the iteration cap.
pub const INSIDE_SENTINEL: i32 = 2;

/// Added to the zero-based escape step so every escaped value is at least
/// 4 and never collides with [`INSIDE_SENTINEL`].
pub const ESCAPE_OFFSET: u32 = 4;

/// Squared bailout radius without smoothing.
pub const BAILOUT: f64 = 4.0;

/// Squared bailout radius with smoothing; a larger radius makes the
/// continuous colour index stable.
pub const SMOOTH_BAILOUT: f64 = 128.0;

/// Result of iterating a single point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IterationResult {
    /// The orbit escaped. `iterations` already includes
    /// [`ESCAPE_OFFSET`]; `norm_sq` is `|z|²` of the escaping step.
    Escaped { iterations: u32, norm_sq: f64 },

    /// The point did not escape within `max_iterations + 1` steps.
    Interior,
}

impl IterationResult {
    /// Escape after zero-based step `n`.
    #[inline]
    pub fn escaped_at(step: u32, norm_sq: f64) -> Self {
        Self::Escaped {
            iterations: step + ESCAPE_OFFSET,
            norm_sq,
        }
    }

    /// The raw integer written to an answer buffer.
    #[inline]
    pub fn value(&self) -> i32 {
        match self {
            Self::Escaped { iterations, .. } => *iterations as i32,
            Self::Interior => INSIDE_SENTINEL,
        }
    }

    #[inline]
    pub fn is_interior(&self) -> bool {
        matches!(self, Self::Interior)
    }
}

/// Parameters shared by every pixel of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationParams {
    /// Steps `0..=max_iterations` are evaluated before declaring a point
    /// interior.
    pub max_iterations: u32,

    /// Produce a continuous colour index next to the integer count.
    pub smooth: bool,
}

impl IterationParams {
    pub fn new(max_iterations: u32, smooth: bool) -> crate::Result<Self> {
        if max_iterations < 1 {
            return Err(CoreError::InvalidMaxIterations(max_iterations));
        }
        Ok(Self {
            max_iterations,
            smooth,
        })
    }

    /// Squared bailout radius for these parameters.
    #[inline]
    pub fn bailout(&self) -> f64 {
        bailout(self.smooth)
    }

    /// Identity of the parameters that invalidate cached reference orbits
    /// when they change.
    pub fn param_hash(&self) -> String {
        param_hash(self.max_iterations, self.smooth)
    }
}

impl Default for IterationParams {
    fn default() -> Self {
        Self {
            max_iterations: crate::viewport::DEFAULT_ITERATIONS,
            smooth: true,
        }
    }
}

#[inline]
pub fn bailout(smooth: bool) -> f64 {
    if smooth {
        SMOOTH_BAILOUT
    } else {
        BAILOUT
    }
}

/// `"<max_iterations>-<smooth>"`.
pub fn param_hash(max_iterations: u32, smooth: bool) -> String {
    format!("{max_iterations}-{smooth}")
}
