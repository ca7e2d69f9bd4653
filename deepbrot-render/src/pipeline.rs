//! Job state machine: levels of tiles dispatched to the worker pool,
//! answers merged into level rasters, superseded jobs dropped by token.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use deepbrot_core::{
    Answer, Backend, IterationParams, JobToken, RenderCancel, Strategy, Task, TaskStats, Viewport,
};

use crate::config::PipelineConfig;
use crate::error::RenderError;
use crate::pool::{WorkerPool, WorkerReport};
use crate::raster::LevelRaster;
use crate::tile::{build_tile_grid, plan_levels, Level};

// ---------------------------------------------------------------------------
// Requests, events and statistics
// ---------------------------------------------------------------------------

/// One render request.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub viewport: Viewport,
    pub params: IterationParams,
    /// Drop every worker's reference cache before the first tile.
    pub reset_caches: bool,
}

impl JobRequest {
    pub fn new(viewport: Viewport, params: IterationParams) -> Self {
        Self {
            viewport,
            params,
            reset_caches: false,
        }
    }
}

/// Progress notifications surfaced by [`JobPipeline::pump`].
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    LevelStarted {
        job_id: u64,
        level: usize,
        pixel_size: u32,
        tiles: usize,
    },
    /// A tile was merged into the current (partial) level raster.
    TileMerged {
        job_id: u64,
        level: usize,
        tiles_merged: usize,
        tiles_total: usize,
    },
    /// Every tile of the level is merged; the raster is final.
    LevelComplete {
        job_id: u64,
        level: usize,
        pixel_size: u32,
        elapsed: Duration,
    },
    JobComplete(JobSummary),
    /// The requested backend is unavailable; the CPU workers run instead.
    BackendDowngraded { requested: Backend, using: Backend },
}

/// Aggregated [`TaskStats`] of a job plus pipeline-level counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub elapsed: Duration,
    /// Sum of worker time spent in tiles.
    pub worker_time: Duration,
    pub high_precision_time: Duration,
    pub low_precision_time: Duration,
    pub high_precision_points: u64,
    pub low_precision_points: u64,
    pub low_precision_misses: u64,
    pub tiles: u64,
    /// Tiles whose engine panicked; their pixels keep the seeded values.
    pub failed_tiles: u64,
    /// Answers of superseded jobs that arrived while this job was current.
    pub stale_answers: u64,
}

impl JobStats {
    fn record(&mut self, stats: &TaskStats) {
        self.worker_time += stats.elapsed;
        self.high_precision_time += stats.high_precision_time;
        self.low_precision_time += stats.low_precision_time;
        self.high_precision_points += stats.high_precision_points;
        self.low_precision_points += stats.low_precision_points;
        self.low_precision_misses += stats.low_precision_misses;
        self.tiles += 1;
    }

    /// Share of worker time spent computing reference orbits.
    pub fn high_precision_share(&self) -> f64 {
        let total = self.worker_time.as_secs_f64();
        if total > 0.0 {
            self.high_precision_time.as_secs_f64() / total
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub job_id: u64,
    pub levels: usize,
    pub precision: u32,
    pub strategy: Strategy,
    pub stats: JobStats,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

struct ActiveJob {
    id: u64,
    token: JobToken,
    viewport: Viewport,
    params: IterationParams,
    reset_caches: bool,
    levels: Vec<Level>,
    current: usize,
    /// Tasks of the current level not yet handed to a worker.
    queue: Vec<Task>,
    tiles_total: usize,
    tiles_merged: usize,
    raster: LevelRaster,
    stats: JobStats,
    started: Instant,
    level_started: Instant,
}

/// Drives jobs through the worker pool.
///
/// All coordination happens on the thread calling [`pump`](Self::pump);
/// workers only see tasks and send answers back.
pub struct JobPipeline {
    config: PipelineConfig,
    pool: WorkerPool,
    rx: Receiver<WorkerReport>,
    cancel: RenderCancel,
    next_job_id: u64,
    job: Option<ActiveJob>,
    in_flight: usize,
    pending: Vec<RenderEvent>,
    downgrade_reported: bool,
    latest_complete: Option<LevelRaster>,
    stale_total: u64,
}

impl JobPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, RenderError> {
        config.validate()?;
        let (pool, rx) = WorkerPool::new(&config)?;
        Ok(Self {
            config,
            pool,
            rx,
            cancel: RenderCancel::new(),
            next_job_id: 1,
            job: None,
            in_flight: 0,
            pending: Vec::new(),
            downgrade_reported: false,
            latest_complete: None,
            stale_total: 0,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn workers(&self) -> usize {
        self.pool.workers()
    }

    /// Supersede the current job (if any) and start `request`. Returns the
    /// new job id.
    pub fn start_job(&mut self, request: JobRequest) -> Result<u64, RenderError> {
        let viewport = request.viewport;
        if viewport.width() == 0 || viewport.height() == 0 {
            return Err(RenderError::InvalidDimensions {
                width: viewport.width(),
                height: viewport.height(),
            });
        }

        self.cancel.cancel();
        if let Some(old) = self.job.take() {
            debug!(job_id = old.id, "Job superseded");
        }
        self.pending
            .retain(|event| matches!(event, RenderEvent::BackendDowngraded { .. }));

        if viewport.backend() == Backend::Gpu && !self.downgrade_reported {
            warn!("GPU backend is not available, rendering on the CPU");
            self.downgrade_reported = true;
            self.pending.push(RenderEvent::BackendDowngraded {
                requested: Backend::Gpu,
                using: Backend::Cpu,
            });
        }

        let id = self.next_job_id;
        self.next_job_id += 1;

        let levels = plan_levels(
            viewport.width(),
            viewport.height(),
            &self.config.level_pixel_sizes,
        );
        let total_tiles: usize = levels
            .iter()
            .map(|l| build_tile_grid(l.width, l.height, self.config.tile_size).len())
            .sum();
        self.cancel.reset_progress(total_tiles);

        info!(
            job_id = id,
            width = viewport.width(),
            height = viewport.height(),
            zoom = %viewport.zoom_label(),
            precision = viewport.precision(),
            strategy = viewport.strategy().label(),
            max_iterations = request.params.max_iterations,
            levels = levels.len(),
            "Job started"
        );

        let first = levels[0];
        let now = Instant::now();
        let mut job = ActiveJob {
            id,
            token: self.cancel.token(),
            viewport,
            params: request.params,
            reset_caches: request.reset_caches,
            levels,
            current: 0,
            queue: Vec::new(),
            tiles_total: 0,
            tiles_merged: 0,
            raster: LevelRaster::new(id, &first, request.params.smooth),
            stats: JobStats::default(),
            started: now,
            level_started: now,
        };
        self.begin_level(&mut job, 0, None);
        self.job = Some(job);
        self.dispatch();
        Ok(id)
    }

    /// Abandon the current job. In-flight tiles stop at their next probe
    /// and their answers are dropped.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.pending.clear();
        if let Some(job) = self.job.take() {
            info!(job_id = job.id, "Job cancelled");
        }
    }

    pub fn current_job(&self) -> Option<u64> {
        self.job.as_ref().map(|j| j.id)
    }

    pub fn is_idle(&self) -> bool {
        self.job.is_none()
    }

    /// The (possibly partial) raster of the level being computed.
    pub fn level_raster(&self) -> Option<&LevelRaster> {
        self.job.as_ref().map(|j| &j.raster)
    }

    /// The finest level completed so far, of the current or a previous
    /// job.
    pub fn latest_complete(&self) -> Option<&LevelRaster> {
        self.latest_complete.as_ref()
    }

    /// `(tiles merged, tiles total)` across all levels of the current job.
    pub fn progress(&self) -> (usize, usize) {
        self.cancel.progress()
    }

    /// Answers dropped because their job had been superseded.
    pub fn stale_answers(&self) -> u64 {
        self.stale_total
    }

    /// Wait up to `timeout` for worker answers, merge everything available
    /// and return the resulting events.
    pub fn pump(&mut self, timeout: Duration) -> Vec<RenderEvent> {
        let mut events = std::mem::take(&mut self.pending);
        self.dispatch();

        if self.in_flight > 0 {
            match self.rx.recv_timeout(timeout) {
                Ok(report) => self.handle(report, &mut events),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Worker channel disconnected");
                    self.in_flight = 0;
                }
            }
            while let Ok(report) = self.rx.try_recv() {
                self.handle(report, &mut events);
            }
        }

        events.append(&mut self.pending);
        self.dispatch();
        events
    }

    /// Pump until the current job completes. Returns `None` if there is no
    /// job or it was superseded from a callback.
    pub fn run_to_completion<F>(&mut self, mut on_event: F) -> Option<JobSummary>
    where
        F: FnMut(&RenderEvent),
    {
        let id = self.current_job()?;
        loop {
            for event in self.pump(Duration::from_millis(50)) {
                on_event(&event);
                if let RenderEvent::JobComplete(summary) = event {
                    if summary.job_id == id {
                        return Some(summary);
                    }
                }
            }
            if self.current_job() != Some(id) {
                return None;
            }
        }
    }

    // -- internals ----------------------------------------------------------

    /// Hand queued tasks to the pool until every worker has one. The queue
    /// is popped from the tail.
    fn dispatch(&mut self) {
        let workers = self.pool.workers();
        let Some(job) = self.job.as_mut() else {
            return;
        };
        while self.in_flight < workers {
            let Some(task) = job.queue.pop() else {
                break;
            };
            self.pool.submit(task);
            self.in_flight += 1;
        }
    }

    fn handle(&mut self, report: WorkerReport, events: &mut Vec<RenderEvent>) {
        self.in_flight = self.in_flight.saturating_sub(1);

        let Some(job) = self.job.as_mut() else {
            self.drop_stale(report.task());
            return;
        };
        let task = report.task();
        if task.job_id != job.id || !task.token.is_live() {
            let (job_id, level) = (task.job_id, task.level);
            job.stats.stale_answers += 1;
            self.stale_total += 1;
            debug!(job_id, level, current = job.id, "Dropped stale answer");
            return;
        }

        match report {
            WorkerReport::Answer(answer) => merge(job, &answer),
            WorkerReport::Failed { task, reason } => {
                warn!(
                    job_id = task.job_id,
                    level = task.level,
                    x = task.x_offset,
                    y = task.y_offset,
                    "Tile failed: {reason}"
                );
                job.stats.failed_tiles += 1;
            }
        }
        job.tiles_merged += 1;
        self.cancel.inc_progress();
        events.push(RenderEvent::TileMerged {
            job_id: job.id,
            level: job.current,
            tiles_merged: job.tiles_merged,
            tiles_total: job.tiles_total,
        });

        if job.tiles_merged == job.tiles_total {
            self.complete_level(events);
        }
    }

    fn drop_stale(&mut self, task: &Task) {
        self.stale_total += 1;
        debug!(job_id = task.job_id, level = task.level, "Dropped stale answer");
    }

    fn complete_level(&mut self, events: &mut Vec<RenderEvent>) {
        let Some(mut job) = self.job.take() else {
            return;
        };
        let level = job.levels[job.current];
        let elapsed = job.level_started.elapsed();
        info!(
            job_id = job.id,
            level = level.index,
            pixel_size = level.pixel_size,
            tiles = job.tiles_total,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Level complete"
        );
        events.push(RenderEvent::LevelComplete {
            job_id: job.id,
            level: level.index,
            pixel_size: level.pixel_size,
            elapsed,
        });
        self.latest_complete = Some(job.raster.clone());

        let next = job.current + 1;
        if next < job.levels.len() {
            let previous = job.raster.clone();
            self.begin_level(&mut job, next, Some(&previous));
            self.job = Some(job);
            return;
        }

        job.stats.elapsed = job.started.elapsed();
        let summary = JobSummary {
            job_id: job.id,
            levels: job.levels.len(),
            precision: job.viewport.precision(),
            strategy: job.viewport.strategy(),
            stats: job.stats,
        };
        info!(
            job_id = summary.job_id,
            elapsed_ms = summary.stats.elapsed.as_secs_f64() * 1000.0,
            precision = summary.precision,
            strategy = summary.strategy.label(),
            high_precision_points = summary.stats.high_precision_points,
            high_precision_share = summary.stats.high_precision_share(),
            low_precision_points = summary.stats.low_precision_points,
            low_precision_misses = summary.stats.low_precision_misses,
            stale_answers = summary.stats.stale_answers,
            failed_tiles = summary.stats.failed_tiles,
            cached_references = self.pool.cached_references(),
            "Job complete"
        );
        events.push(RenderEvent::JobComplete(summary));
    }

    /// Build the raster and the task queue of level `index`.
    fn begin_level(&mut self, job: &mut ActiveJob, index: usize, previous: Option<&LevelRaster>) {
        let level = job.levels[index];
        let skip_checkerboard = index > 0 && level.refines(&job.levels[index - 1]);

        let mut raster = LevelRaster::new(job.id, &level, job.params.smooth);
        if skip_checkerboard {
            if let Some(previous) = previous {
                raster.seed_from_coarser(previous);
            }
        }

        let (frame_top_left, frame_bottom_right) = job.viewport.frame_corners(level.pixel_size);
        let state = job.viewport.precision_state();
        let param_hash = job.params.param_hash();
        let tiles = build_tile_grid(level.width, level.height, self.config.tile_size);

        job.queue = tiles
            .iter()
            .map(|tile| Task {
                job_id: job.id,
                token: job.token.clone(),
                level: index,
                pixel_size: level.pixel_size,
                x_offset: tile.x,
                y_offset: tile.y,
                width: tile.width,
                height: tile.height,
                frame_width: level.width,
                frame_height: level.height,
                frame_top_left: frame_top_left.clone(),
                frame_bottom_right: frame_bottom_right.clone(),
                max_iterations: job.params.max_iterations,
                smooth: job.params.smooth,
                precision: state.precision,
                required_precision: state.required_precision_bits,
                param_hash: param_hash.clone(),
                reset_caches: job.reset_caches,
                skip_checkerboard,
            })
            .collect();
        job.current = index;
        job.tiles_total = tiles.len();
        job.tiles_merged = 0;
        job.raster = raster;
        job.level_started = Instant::now();

        debug!(
            job_id = job.id,
            level = index,
            pixel_size = level.pixel_size,
            tiles = tiles.len(),
            skip_checkerboard,
            "Level started"
        );
        self.pending.push(RenderEvent::LevelStarted {
            job_id: job.id,
            level: index,
            pixel_size: level.pixel_size,
            tiles: tiles.len(),
        });
    }
}

fn merge(job: &mut ActiveJob, answer: &Answer) {
    job.raster.blit_answer(answer);
    job.stats.record(&answer.stats);
}

impl Drop for JobPipeline {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
