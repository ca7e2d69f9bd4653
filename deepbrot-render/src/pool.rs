//! Fixed-size worker pool. Every pool thread owns one [`TileEngine`] and
//! therefore one reference cache; answers come back over a channel.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use tracing::{debug, error};

use deepbrot_core::{Answer, Task, TileEngine};

use crate::config::PipelineConfig;
use crate::error::RenderError;

/// What a worker sends back for one task.
#[derive(Debug)]
pub enum WorkerReport {
    Answer(Box<Answer>),
    /// The engine panicked on this task; its cache has been reset.
    Failed { task: Box<Task>, reason: String },
}

impl WorkerReport {
    pub fn task(&self) -> &Task {
        match self {
            WorkerReport::Answer(answer) => &answer.task,
            WorkerReport::Failed { task, .. } => task,
        }
    }
}

pub struct WorkerPool {
    pool: rayon::ThreadPool,
    engines: Arc<Vec<Mutex<TileEngine>>>,
    intervals: Vec<u32>,
    tx: Sender<WorkerReport>,
}

impl WorkerPool {
    /// Build the pool and return it with the receiving end of its answer
    /// channel.
    pub fn new(config: &PipelineConfig) -> Result<(Self, Receiver<WorkerReport>), RenderError> {
        let workers = config.effective_workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("deepbrot-worker-{i}"))
            .build()
            .map_err(|e| RenderError::PoolBuild(e.to_string()))?;

        let intervals: Vec<u32> = (0..workers)
            .map(|i| config.stop_check_interval_for(i))
            .collect();
        let engines = intervals
            .iter()
            .map(|&interval| Mutex::new(TileEngine::new(interval)))
            .collect();

        let (tx, rx) = mpsc::channel();
        debug!(workers, "Worker pool started");
        Ok((
            Self {
                pool,
                engines: Arc::new(engines),
                intervals,
                tx,
            },
            rx,
        ))
    }

    pub fn workers(&self) -> usize {
        self.engines.len()
    }

    /// Queue `task` on the pool. The answer arrives on the channel.
    pub fn submit(&self, task: Task) {
        let engines = Arc::clone(&self.engines);
        let intervals = self.intervals.clone();
        let tx = self.tx.clone();
        self.pool.spawn(move || {
            let index = rayon::current_thread_index().unwrap_or(0) % engines.len();
            let mut engine = match engines[index].lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };

            let report = match catch_unwind(AssertUnwindSafe(|| engine.process(&task))) {
                Ok(answer) => WorkerReport::Answer(Box::new(answer)),
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!(
                        worker = index,
                        job_id = task.job_id,
                        level = task.level,
                        x = task.x_offset,
                        y = task.y_offset,
                        "Tile engine panicked: {reason}"
                    );
                    *engine = TileEngine::new(intervals[index]);
                    WorkerReport::Failed {
                        task: Box::new(task),
                        reason,
                    }
                }
            };
            drop(engine);

            // The pipeline may already be gone.
            let _ = tx.send(report);
        });
    }

    /// Total cached references across all workers.
    pub fn cached_references(&self) -> usize {
        self.engines
            .iter()
            .map(|engine| match engine.lock() {
                Ok(guard) => guard.cache().len(),
                Err(poisoned) => poisoned.into_inner().cache().len(),
            })
            .sum()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use deepbrot_core::iteration::param_hash;
    use deepbrot_core::{ComplexPoint, JobToken};

    fn task(x_offset: u32, top_left: ComplexPoint) -> Task {
        Task {
            job_id: 1,
            token: JobToken::detached(),
            level: 0,
            pixel_size: 1,
            x_offset,
            y_offset: 0,
            width: 4,
            height: 4,
            frame_width: 8,
            frame_height: 4,
            frame_top_left: top_left,
            frame_bottom_right: ComplexPoint::from_f64(2.0, 1.0, 64),
            max_iterations: 50,
            smooth: false,
            precision: 64,
            required_precision: 10,
            param_hash: param_hash(50, false),
            reset_caches: false,
            skip_checkerboard: false,
        }
    }

    #[test]
    fn answers_come_back() {
        let config = PipelineConfig {
            workers: 2,
            ..Default::default()
        };
        let (pool, rx) = WorkerPool::new(&config).unwrap();
        assert_eq!(pool.workers(), 2);
        pool.submit(task(0, ComplexPoint::from_f64(-2.0, -1.0, 64)));
        pool.submit(task(4, ComplexPoint::from_f64(-2.0, -1.0, 64)));

        let mut offsets = Vec::new();
        for _ in 0..2 {
            match rx.recv_timeout(Duration::from_secs(30)).unwrap() {
                WorkerReport::Answer(answer) => {
                    assert!(answer.completed);
                    assert_eq!(answer.values.len(), 16);
                    offsets.push(answer.task.x_offset);
                }
                WorkerReport::Failed { reason, .. } => panic!("unexpected failure: {reason}"),
            }
        }
        offsets.sort_unstable();
        assert_eq!(offsets, vec![0, 4]);
        assert!(pool.cached_references() >= 1);
    }

    #[test]
    fn engine_panic_is_reported() {
        let config = PipelineConfig {
            workers: 1,
            ..Default::default()
        };
        let (pool, rx) = WorkerPool::new(&config).unwrap();
        // Corners at different scales violate the fixed-point contract.
        pool.submit(task(0, ComplexPoint::from_f64(-2.0, -1.0, 80)));
        let report = rx.recv_timeout(Duration::from_secs(30)).unwrap();
        assert!(matches!(report, WorkerReport::Failed { .. }));
        assert!(report.task().job_id == 1);

        // The worker keeps serving.
        pool.submit(task(0, ComplexPoint::from_f64(-2.0, -1.0, 64)));
        let report = rx.recv_timeout(Duration::from_secs(30)).unwrap();
        assert!(matches!(report, WorkerReport::Answer(_)));
    }
}
