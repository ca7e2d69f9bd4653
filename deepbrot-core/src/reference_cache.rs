use std::collections::VecDeque;

use tracing::debug;

use crate::complex_point::ComplexPoint;
use crate::ext_float::ExtComplex;
use crate::iteration::IterationResult;
use crate::orbit::{HighPrecisionOrbit, OrbitSample};
use crate::perturbation::PerturbationResult;
use crate::task::Task;

/// A reference orbit together with where it sits in the current frame.
#[derive(Debug, Clone)]
pub struct ReferencePoint {
    center: ComplexPoint,
    offset: ExtComplex,
    orbit: HighPrecisionOrbit,
}

impl ReferencePoint {
    /// `center` is absolute; the offset is measured from `frame_origin`.
    pub fn new(
        center: ComplexPoint,
        frame_origin: &ComplexPoint,
        orbit: HighPrecisionOrbit,
    ) -> Self {
        let offset = center.delta_from(frame_origin);
        Self {
            center,
            offset,
            orbit,
        }
    }

    #[inline]
    pub fn center(&self) -> &ComplexPoint {
        &self.center
    }

    /// Position relative to the frame's top-left corner.
    #[inline]
    pub fn offset(&self) -> ExtComplex {
        self.offset
    }

    #[inline]
    pub fn result(&self) -> IterationResult {
        self.orbit.result
    }

    #[inline]
    pub fn samples(&self) -> &[OrbitSample] {
        &self.orbit.samples
    }

    fn rebase(&mut self, frame_origin: &ComplexPoint) {
        self.offset = self.center.delta_from(frame_origin);
    }
}

/// Outcome of offering the cached references to a perturbation attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lookup {
    /// `None` when every candidate glitched (or the cache is empty).
    pub result: Option<IterationResult>,
    /// Candidates rejected before the hit.
    pub misses: u64,
}

/// Reference orbits owned by one worker, most recently useful first.
///
/// The cache is unbounded; it is pruned only when a new job starts.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    points: VecDeque<ReferencePoint>,
    job_id: Option<u64>,
    param_hash: Option<String>,
    precision: Option<u32>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferencePoint> {
        self.points.iter()
    }

    /// Apply the cross-frame rule on the first task of a new job.
    ///
    /// The cache is cleared when the iteration parameters or the precision
    /// changed, when the task asks for a reset, or when it is empty.
    /// Otherwise only references inside the new frame (bounds included)
    /// survive, with offsets re-derived from the new frame origin.
    pub fn prepare(&mut self, task: &Task) {
        if self.job_id == Some(task.job_id) {
            return;
        }
        self.job_id = Some(task.job_id);

        let before = self.points.len();
        let params_changed = self.param_hash.as_deref() != Some(task.param_hash.as_str());
        let precision_changed = self.precision != Some(task.precision);

        if params_changed || task.reset_caches || self.points.is_empty() || precision_changed {
            self.points.clear();
        } else {
            let top_left = &task.frame_top_left;
            let bottom_right = &task.frame_bottom_right;
            self.points.retain(|p| p.center.within(top_left, bottom_right));
            for point in &mut self.points {
                point.rebase(top_left);
            }
        }

        self.param_hash = Some(task.param_hash.clone());
        self.precision = Some(task.precision);
        debug!(
            job_id = task.job_id,
            before,
            kept = self.points.len(),
            params_changed,
            precision_changed,
            reset = task.reset_caches,
            "Reference cache prepared"
        );
    }

    /// Offer candidates head to tail until `attempt` resolves the pixel.
    /// A successful candidate moves to the head.
    pub fn find<F>(&mut self, mut attempt: F) -> Lookup
    where
        F: FnMut(&ReferencePoint) -> PerturbationResult,
    {
        let mut misses = 0;
        for index in 0..self.points.len() {
            match attempt(&self.points[index]) {
                PerturbationResult::Resolved(result) => {
                    if index > 0 {
                        if let Some(point) = self.points.remove(index) {
                            self.points.push_front(point);
                        }
                    }
                    return Lookup {
                        result: Some(result),
                        misses,
                    };
                }
                PerturbationResult::Glitch(_) => misses += 1,
            }
        }
        Lookup {
            result: None,
            misses,
        }
    }

    /// Insert a freshly computed reference at the head.
    pub fn push_front(&mut self, point: ReferencePoint) {
        self.points.push_front(point);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::StopCheck;
    use crate::orbit::compute_orbit;
    use crate::perturbation::GlitchKind;
    use crate::task::tests::sample_task;

    fn point(re: f64, im: f64, origin: &ComplexPoint) -> ReferencePoint {
        let c = ComplexPoint::from_f64(re, im, origin.scale());
        let orbit = compute_orbit(&c, 50, 4.0, &mut StopCheck::never()).unwrap();
        ReferencePoint::new(c, origin, orbit)
    }

    fn centers(cache: &ReferenceCache) -> Vec<(f64, f64)> {
        cache.iter().map(|p| p.center().to_f64()).collect()
    }

    fn seeded_cache(task: &Task) -> ReferenceCache {
        let mut cache = ReferenceCache::new();
        cache.prepare(task);
        let origin = &task.frame_top_left;
        // Pushed to the front, so the head ends up being the last one.
        cache.push_front(point(1.0, 1.0, origin));
        cache.push_front(point(-1.0, 0.0, origin));
        cache.push_front(point(0.0, 0.5, origin));
        cache
    }

    #[test]
    fn offset_is_relative_to_frame_origin() {
        let origin = ComplexPoint::from_f64(-2.0, -1.0, 64);
        let p = point(0.5, 0.25, &origin);
        assert_eq!(p.offset().to_f64(), (2.5, 1.25));
    }

    #[test]
    fn hit_promotes_to_head() {
        let task = sample_task();
        let mut cache = seeded_cache(&task);
        assert_eq!(centers(&cache), vec![(0.0, 0.5), (-1.0, 0.0), (1.0, 1.0)]);

        let mut offered = Vec::new();
        let lookup = cache.find(|p| {
            offered.push(p.center().to_f64());
            if p.center().to_f64() == (1.0, 1.0) {
                PerturbationResult::Resolved(IterationResult::escaped_at(1, 9.0))
            } else {
                PerturbationResult::Glitch(GlitchKind::Decorrelated)
            }
        });
        assert_eq!(offered, vec![(0.0, 0.5), (-1.0, 0.0), (1.0, 1.0)]);
        assert_eq!(lookup.misses, 2);
        assert_eq!(lookup.result.map(|r| r.value()), Some(5));
        assert_eq!(centers(&cache), vec![(1.0, 1.0), (0.0, 0.5), (-1.0, 0.0)]);

        // The promoted point is now offered first.
        let lookup = cache.find(|_| PerturbationResult::Resolved(IterationResult::Interior));
        assert_eq!(lookup.misses, 0);
        assert_eq!(centers(&cache)[0], (1.0, 1.0));
    }

    #[test]
    fn full_miss_leaves_order_untouched() {
        let task = sample_task();
        let mut cache = seeded_cache(&task);
        let lookup = cache.find(|_| PerturbationResult::Glitch(GlitchKind::OrbitExhausted));
        assert_eq!(lookup.result, None);
        assert_eq!(lookup.misses, 3);
        assert_eq!(centers(&cache), vec![(0.0, 0.5), (-1.0, 0.0), (1.0, 1.0)]);
    }

    #[test]
    fn same_job_keeps_everything() {
        let task = sample_task();
        let mut cache = seeded_cache(&task);
        cache.prepare(&task);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn new_job_filters_by_frame_and_rebases() {
        let task = sample_task();
        let mut cache = seeded_cache(&task);

        // Pan: frame now spans [-0.5, 2.5] × [-0.5, 2.5].
        let mut next = sample_task();
        next.job_id += 1;
        next.frame_top_left = ComplexPoint::from_f64(-0.5, -0.5, 64);
        next.frame_bottom_right = ComplexPoint::from_f64(2.5, 2.5, 64);
        cache.prepare(&next);

        assert_eq!(centers(&cache), vec![(0.0, 0.5), (1.0, 1.0)]);
        let offsets: Vec<_> = cache.iter().map(|p| p.offset().to_f64()).collect();
        assert_eq!(offsets, vec![(0.5, 1.0), (1.5, 1.5)]);
    }

    #[test]
    fn frame_bounds_are_inclusive() {
        let task = sample_task();
        let mut cache = seeded_cache(&task);
        let mut next = sample_task();
        next.job_id += 1;
        next.frame_top_left = ComplexPoint::from_f64(-1.0, 0.0, 64);
        next.frame_bottom_right = ComplexPoint::from_f64(1.0, 1.0, 64);
        cache.prepare(&next);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn parameter_change_clears() {
        let task = sample_task();
        let mut cache = seeded_cache(&task);
        let mut next = sample_task();
        next.job_id += 1;
        next.param_hash = "500-true".into();
        cache.prepare(&next);
        assert!(cache.is_empty());
    }

    #[test]
    fn precision_change_clears() {
        let task = sample_task();
        let mut cache = seeded_cache(&task);
        let mut next = sample_task();
        next.job_id += 1;
        next.precision = 80;
        cache.prepare(&next);
        assert!(cache.is_empty());
    }

    #[test]
    fn reset_flag_clears() {
        let task = sample_task();
        let mut cache = seeded_cache(&task);
        let mut next = sample_task();
        next.job_id += 1;
        next.reset_caches = true;
        cache.prepare(&next);
        assert!(cache.is_empty());
    }
}
