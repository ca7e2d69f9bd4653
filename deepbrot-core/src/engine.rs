use std::time::Instant;

use tracing::debug;

use crate::cancel::{StopCheck, DEFAULT_STOP_CHECK_INTERVAL};
use crate::complex_point::ComplexPoint;
use crate::ext_float::{ExtComplex, ExtFloat};
use crate::iteration::{IterationParams, IterationResult};
use crate::mandelbrot::Mandelbrot;
use crate::orbit::compute_orbit;
use crate::precision::Strategy;
use crate::reference_cache::{ReferenceCache, ReferencePoint};
use crate::smoothing::smoothen;
use crate::task::{Answer, Task, TaskStats};

/// Per-worker state: the reference cache and the probe interval.
///
/// One engine processes tasks sequentially; give every worker its own.
#[derive(Debug)]
pub struct TileEngine {
    cache: ReferenceCache,
    stop_check_interval: u32,
}

impl TileEngine {
    pub fn new(stop_check_interval: u32) -> Self {
        Self {
            cache: ReferenceCache::new(),
            stop_check_interval: stop_check_interval.max(1),
        }
    }

    #[inline]
    pub fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    #[inline]
    pub fn stop_check_interval(&self) -> u32 {
        self.stop_check_interval
    }

    /// Compute every non-seeded pixel of `task`.
    ///
    /// A stopped probe leaves the remaining pixels at 0 and marks the answer
    /// incomplete.
    pub fn process(&mut self, task: &Task) -> Answer {
        let start = Instant::now();
        let mut out = TileOutput::new(task);
        let mut probe = StopCheck::new(task.token.clone(), self.stop_check_interval);

        let strategy = task.strategy();
        let completed = match strategy {
            Strategy::Direct => process_direct(task, &mut out, &mut probe),
            Strategy::Perturbation | Strategy::ExtendedPerturbation => {
                self.process_perturbed(task, strategy, &mut out, &mut probe)
            }
        };
        out.stats.elapsed = start.elapsed();

        debug!(
            job_id = task.job_id,
            level = task.level,
            x = task.x_offset,
            y = task.y_offset,
            strategy = strategy.label(),
            completed,
            references = self.cache.len(),
            hp_points = out.stats.high_precision_points,
            lp_points = out.stats.low_precision_points,
            lp_misses = out.stats.low_precision_misses,
            elapsed_ms = out.stats.elapsed.as_secs_f64() * 1000.0,
            "Tile processed"
        );

        Answer {
            task: task.clone(),
            values: out.values,
            smooth: out.smooth,
            stats: out.stats,
            completed,
        }
    }

    fn process_perturbed(
        &mut self,
        task: &Task,
        strategy: Strategy,
        out: &mut TileOutput,
        probe: &mut StopCheck,
    ) -> bool {
        self.cache.prepare(task);

        let origin = &task.frame_top_left;
        let span = task.frame_bottom_right.subtract(origin).to_ext();
        let max_iterations = task.max_iterations;
        let bailout = task.bailout();

        if self.cache.is_empty() {
            let offset = pixel_offset(task, &span, task.width / 2, task.height / 2);
            if self.add_reference(task, offset, probe, &mut out.stats).is_none() {
                return false;
            }
        }

        for y in 0..task.height {
            if probe.check_now() {
                return false;
            }
            for x in 0..task.width {
                if task.is_seeded(x, y) {
                    continue;
                }
                let offset = pixel_offset(task, &span, x, y);

                let lp_start = Instant::now();
                let lookup = self.cache.find(|reference| {
                    strategy.perturb(
                        offset - reference.offset(),
                        reference.samples(),
                        max_iterations,
                        bailout,
                    )
                });
                out.stats.low_precision_time += lp_start.elapsed();
                out.stats.low_precision_misses += lookup.misses;

                let result = match lookup.result {
                    Some(result) => {
                        out.stats.low_precision_points += 1;
                        result
                    }
                    None => match self.add_reference(task, offset, probe, &mut out.stats) {
                        Some(result) => result,
                        None => return false,
                    },
                };

                out.put(x, y, &result, task.smooth);
                if probe.tick(work(&result, max_iterations)) {
                    return false;
                }
            }
        }
        true
    }

    /// Compute a reference orbit at `offset` from the frame origin and put
    /// it at the head of the cache. `None` when the probe stopped it.
    fn add_reference(
        &mut self,
        task: &Task,
        offset: ExtComplex,
        probe: &mut StopCheck,
        stats: &mut TaskStats,
    ) -> Option<IterationResult> {
        let origin = &task.frame_top_left;
        let center = ComplexPoint::from_ext(offset, origin.scale()).add(origin);

        let hp_start = Instant::now();
        let orbit = compute_orbit(&center, task.max_iterations, task.bailout(), probe);
        stats.high_precision_time += hp_start.elapsed();

        let orbit = orbit?;
        stats.high_precision_points += 1;
        let result = orbit.result;
        self.cache.push_front(ReferencePoint::new(center, origin, orbit));
        Some(result)
    }
}

impl Default for TileEngine {
    fn default() -> Self {
        Self::new(DEFAULT_STOP_CHECK_INTERVAL)
    }
}

// ---------------------------------------------------------------------------
// Direct iteration
// ---------------------------------------------------------------------------

fn process_direct(task: &Task, out: &mut TileOutput, probe: &mut StopCheck) -> bool {
    let fractal = Mandelbrot::new(IterationParams {
        max_iterations: task.max_iterations,
        smooth: task.smooth,
    });
    let (left, top) = task.frame_top_left.to_f64();
    let (right, bottom) = task.frame_bottom_right.to_f64();
    let span_re = right - left;
    let span_im = bottom - top;

    let lp_start = Instant::now();
    for y in 0..task.height {
        if probe.check_now() {
            out.stats.low_precision_time += lp_start.elapsed();
            return false;
        }
        let fy = (task.y_offset + y) as f64 / task.frame_height as f64;
        let im = top + span_im * fy;
        for x in 0..task.width {
            if task.is_seeded(x, y) {
                continue;
            }
            let fx = (task.x_offset + x) as f64 / task.frame_width as f64;
            let result = fractal.iterate(left + span_re * fx, im);
            out.put(x, y, &result, task.smooth);
            out.stats.low_precision_points += 1;
            if probe.tick(work(&result, task.max_iterations)) {
                out.stats.low_precision_time += lp_start.elapsed();
                return false;
            }
        }
    }
    out.stats.low_precision_time += lp_start.elapsed();
    true
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct TileOutput {
    width: u32,
    values: Vec<i32>,
    smooth: Option<Vec<u8>>,
    stats: TaskStats,
}

impl TileOutput {
    fn new(task: &Task) -> Self {
        let count = task.pixel_count();
        Self {
            width: task.width,
            values: vec![0; count],
            smooth: task.smooth.then(|| vec![0; count]),
            stats: TaskStats::default(),
        }
    }

    #[inline]
    fn put(&mut self, x: u32, y: u32, result: &IterationResult, smooth: bool) {
        let idx = (y * self.width + x) as usize;
        let (value, byte) = smoothen(result, smooth);
        self.values[idx] = value;
        if let Some(bytes) = &mut self.smooth {
            bytes[idx] = byte;
        }
    }
}

/// Offset of tile pixel `(x, y)` from the frame's top-left corner.
#[inline]
fn pixel_offset(task: &Task, span: &ExtComplex, x: u32, y: u32) -> ExtComplex {
    let fx = (task.x_offset + x) as f64 / task.frame_width as f64;
    let fy = (task.y_offset + y) as f64 / task.frame_height as f64;
    ExtComplex::new(span.re * ExtFloat::from_f64(fx), span.im * ExtFloat::from_f64(fy))
}

/// Iterations spent on a pixel, for the probe countdown.
#[inline]
fn work(result: &IterationResult, max_iterations: u32) -> u32 {
    match result {
        IterationResult::Escaped { iterations, .. } => iterations.saturating_sub(3),
        IterationResult::Interior => max_iterations.saturating_add(1),
    }
}
