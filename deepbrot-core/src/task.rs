use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cancel::JobToken;
use crate::complex_point::ComplexPoint;
use crate::iteration;
use crate::precision::Strategy;

/// One rectangular tile of one level of a job.
///
/// Coordinates are in level pixels; `frame_*` describe the whole level
/// raster the tile belongs to. The frame corners are the complex
/// coordinates of the raster's top-left corner and of its bottom-right
/// corner rounded up to whole level pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub job_id: u64,
    #[serde(skip)]
    pub token: JobToken,
    pub level: usize,
    /// Canvas pixels per level pixel.
    pub pixel_size: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub width: u32,
    pub height: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub frame_top_left: ComplexPoint,
    pub frame_bottom_right: ComplexPoint,
    pub max_iterations: u32,
    pub smooth: bool,
    pub precision: u32,
    pub required_precision: u32,
    pub param_hash: String,
    /// Drop every cached reference before this job.
    pub reset_caches: bool,
    /// Pixels at even row and even column are filled by the pipeline from
    /// the previous level and must not be computed.
    pub skip_checkerboard: bool,
}

impl Task {
    #[inline]
    pub fn bailout(&self) -> f64 {
        iteration::bailout(self.smooth)
    }

    #[inline]
    pub fn strategy(&self) -> Strategy {
        Strategy::for_precision(self.precision)
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether tile pixel `(x, y)` is left for the pipeline to seed.
    #[inline]
    pub fn is_seeded(&self, x: u32, y: u32) -> bool {
        self.skip_checkerboard && x % 2 == 0 && y % 2 == 0
    }
}

/// Timing and counters for one processed task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub elapsed: Duration,
    pub high_precision_time: Duration,
    pub low_precision_time: Duration,
    /// Reference orbits computed.
    pub high_precision_points: u64,
    /// Pixels resolved by perturbation (or direct iteration).
    pub low_precision_points: u64,
    /// Perturbation attempts rejected as glitches.
    pub low_precision_misses: u64,
}

impl TaskStats {
    pub fn merge(&mut self, other: &TaskStats) {
        self.elapsed += other.elapsed;
        self.high_precision_time += other.high_precision_time;
        self.low_precision_time += other.low_precision_time;
        self.high_precision_points += other.high_precision_points;
        self.low_precision_points += other.low_precision_points;
        self.low_precision_misses += other.low_precision_misses;
    }
}

/// The computed values of one task.
#[derive(Debug, Clone)]
pub struct Answer {
    pub task: Task,
    /// Row-major `width × height`; 2 for interior points, otherwise ≥ 4
    /// (before smoothing adjusts it).
    pub values: Vec<i32>,
    /// Sub-step colour bytes, present when the task asked for smoothing.
    pub smooth: Option<Vec<u8>>,
    pub stats: TaskStats,
    /// `false` when a cancellation probe stopped the tile early.
    pub completed: bool,
}
