use std::time::Duration;

use deepbrot_core::{Backend, IterationParams, Mandelbrot, Strategy, Viewport};
use deepbrot_render::{JobPipeline, JobRequest, PipelineConfig, RenderEvent};

fn pipeline(workers: usize) -> JobPipeline {
    JobPipeline::new(PipelineConfig {
        workers,
        tile_size: 16,
        ..Default::default()
    })
    .expect("pipeline should start")
}

fn request(viewport: Viewport, max_iterations: u32, smooth: bool) -> JobRequest {
    JobRequest::new(viewport, IterationParams::new(max_iterations, smooth).unwrap())
}

#[test]
fn job_runs_all_levels_in_order() {
    let mut pipeline = pipeline(2);
    let viewport = Viewport::default_mandelbrot(64, 48);
    let id = pipeline.start_job(request(viewport, 200, false)).unwrap();

    let mut events = Vec::new();
    let summary = pipeline
        .run_to_completion(|e| events.push(e.clone()))
        .expect("job should complete");
    assert_eq!(summary.job_id, id);
    assert_eq!(summary.levels, 5);
    assert_eq!(summary.strategy, Strategy::Direct);
    assert_eq!(summary.stats.failed_tiles, 0);

    let completed: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            RenderEvent::LevelComplete { pixel_size, .. } => Some(*pixel_size),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec![16, 8, 4, 2, 1]);
    assert!(matches!(events.first(), Some(RenderEvent::LevelStarted { level: 0, .. })));
    assert!(matches!(events.last(), Some(RenderEvent::JobComplete(_))));

    let raster = pipeline.latest_complete().expect("final raster");
    assert_eq!((raster.width, raster.height, raster.pixel_size), (64, 48, 1));
    assert!(raster.values.iter().all(|&v| v == 2 || v >= 4));
    assert!(raster.values.contains(&2));
    assert!(raster.values.iter().any(|&v| v >= 4));

    let (done, total) = pipeline.progress();
    assert_eq!(done, total);
    assert!(pipeline.is_idle());
}

#[test]
fn refined_raster_matches_direct_iteration() {
    let mut pipeline = pipeline(3);
    let viewport = Viewport::default_mandelbrot(40, 30);
    pipeline.start_job(request(viewport.clone(), 150, false)).unwrap();
    pipeline.run_to_completion(|_| {}).expect("job should complete");
    let raster = pipeline.latest_complete().unwrap();

    let fractal = Mandelbrot::new(IterationParams::new(150, false).unwrap());
    let mut agree = 0;
    for y in 0..30 {
        for x in 0..40 {
            let (re, im) = viewport.canvas_to_complex(x, y).to_f64();
            if raster.value_at(x as u32, y as u32) == fractal.iterate(re, im).value() {
                agree += 1;
            }
        }
    }
    assert!(agree * 100 >= 1200 * 97, "{agree}/1200");
}

#[test]
fn superseded_job_merges_nothing() {
    let mut pipeline = pipeline(2);
    let slow = Viewport::from_decimal("-0.5", "0", "4", 256, 256, Backend::Cpu).unwrap();
    let old = pipeline.start_job(request(slow, 100_000, false)).unwrap();
    // Let a few tiles of the old job start.
    pipeline.pump(Duration::from_millis(5));

    let fast = Viewport::default_mandelbrot(32, 32);
    let new = pipeline.start_job(request(fast, 100, false)).unwrap();
    assert!(new > old);

    let mut events = Vec::new();
    let summary = pipeline
        .run_to_completion(|e| events.push(e.clone()))
        .expect("new job should complete");
    assert_eq!(summary.job_id, new);
    for event in &events {
        match event {
            RenderEvent::LevelStarted { job_id, .. }
            | RenderEvent::TileMerged { job_id, .. }
            | RenderEvent::LevelComplete { job_id, .. } => assert_eq!(*job_id, new),
            RenderEvent::JobComplete(summary) => assert_eq!(summary.job_id, new),
            RenderEvent::BackendDowngraded { .. } => panic!("unexpected downgrade"),
        }
    }
    assert_eq!(pipeline.latest_complete().unwrap().job_id, new);
    assert_eq!(summary.stats.stale_answers, pipeline.stale_answers());
}

#[test]
fn in_flight_tiles_of_superseded_job_are_counted_stale() {
    // One worker: the new job cannot dispatch until the old tile has come back.
    let mut pipeline = pipeline(1);
    let slow = Viewport::from_decimal("-0.5", "0", "4", 256, 256, Backend::Cpu).unwrap();
    let old = pipeline.start_job(request(slow, 100_000, false)).unwrap();
    // No pump in between: the old job's first tiles are still with the workers.
    let fast = Viewport::default_mandelbrot(32, 32);
    let new = pipeline.start_job(request(fast, 100, false)).unwrap();
    assert!(new > old);

    let summary = pipeline
        .run_to_completion(|_| {})
        .expect("new job should complete");
    assert_eq!(summary.job_id, new);
    assert_eq!(summary.stats.stale_answers, 1);
    assert_eq!(pipeline.stale_answers(), 1);
    assert_eq!(summary.stats.failed_tiles, 0);
}

#[test]
fn gpu_request_downgrades_once() {
    let mut pipeline = pipeline(1);
    let viewport = Viewport::from_decimal("-0.5", "0", "1", 16, 16, Backend::Gpu).unwrap();
    assert_eq!(viewport.precision(), 64);

    let mut downgrades = 0;
    for _ in 0..2 {
        pipeline.start_job(request(viewport.clone(), 100, false)).unwrap();
        pipeline.run_to_completion(|e| {
            if matches!(e, RenderEvent::BackendDowngraded { .. }) {
                downgrades += 1;
            }
        });
    }
    assert_eq!(downgrades, 1);
}

#[test]
fn cancelled_job_emits_nothing_further() {
    let mut pipeline = pipeline(2);
    let viewport = Viewport::from_decimal("-0.5", "0", "4", 128, 128, Backend::Cpu).unwrap();
    pipeline.start_job(request(viewport, 50_000, false)).unwrap();
    pipeline.cancel();
    assert!(pipeline.is_idle());
    assert!(pipeline.run_to_completion(|_| {}).is_none());

    for _ in 0..20 {
        let events = pipeline.pump(Duration::from_millis(20));
        assert!(events.is_empty(), "{events:?}");
    }
}

#[test]
fn deep_view_completes_with_perturbation() {
    let mut pipeline = pipeline(2);
    let viewport = Viewport::from_decimal("-0.75", "0.1", "1e25", 32, 32, Backend::Cpu).unwrap();
    assert_eq!(viewport.strategy(), Strategy::Perturbation);
    pipeline.start_job(request(viewport, 500, true)).unwrap();
    let summary = pipeline.run_to_completion(|_| {}).expect("job should complete");
    assert_eq!(summary.strategy, Strategy::Perturbation);
    assert!(summary.stats.high_precision_points >= 1);
    assert_eq!(summary.stats.failed_tiles, 0);

    let raster = pipeline.latest_complete().unwrap();
    assert!(raster.smooth.is_some());
    assert!(raster.values.iter().all(|&v| v > 0), "every pixel is filled");
}

#[test]
fn invalid_config_is_rejected() {
    let result = JobPipeline::new(PipelineConfig {
        tile_size: 7,
        ..Default::default()
    });
    assert!(result.is_err());
}
