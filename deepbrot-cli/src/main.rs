mod error;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use deepbrot_core::Backend;
use deepbrot_render::{export_png, ExportMetadata, JobPipeline, JobRequest, RenderEvent};

use crate::error::CliError;
use crate::settings::RenderSettings;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "deepbrot")]
#[command(version)]
#[command(about = "Deep-zoom Mandelbrot renderer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one view to a PNG file
    Render(RenderArgs),
}

#[derive(Args)]
struct RenderArgs {
    /// JSON settings file; missing fields take their defaults
    #[arg(short, long)]
    settings: Option<PathBuf>,
    /// Output PNG file
    #[arg(short, long, default_value = "deepbrot.png")]
    out: PathBuf,
    /// Real part of the view centre (decimal)
    #[arg(long, allow_hyphen_values = true)]
    center_re: Option<String>,
    /// Imaginary part of the view centre (decimal)
    #[arg(long, allow_hyphen_values = true)]
    center_im: Option<String>,
    /// Zoom factor (decimal, e.g. 1e40)
    #[arg(long)]
    zoom: Option<String>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// Maximum iterations (clamped to 100..=100000)
    #[arg(long)]
    iterations: Option<u32>,
    /// Disable continuous colouring
    #[arg(long)]
    no_smooth: bool,
    /// Request the GPU backend (falls back to the CPU)
    #[arg(long)]
    gpu: bool,
    /// Worker threads (default: one per core)
    #[arg(long)]
    workers: Option<usize>,
}

impl RenderArgs {
    /// Settings from the file (or defaults) with command-line overrides.
    fn resolve(&self) -> RenderSettings {
        let mut settings = match &self.settings {
            Some(path) => RenderSettings::load(path),
            None => RenderSettings::default(),
        };
        if let Some(re) = &self.center_re {
            settings.center_re = re.clone();
        }
        if let Some(im) = &self.center_im {
            settings.center_im = im.clone();
        }
        if let Some(zoom) = &self.zoom {
            settings.zoom = zoom.clone();
        }
        if let Some(width) = self.width {
            settings.width = width;
        }
        if let Some(height) = self.height {
            settings.height = height;
        }
        if let Some(iterations) = self.iterations {
            settings.max_iterations = iterations;
        }
        if self.no_smooth {
            settings.smooth = false;
        }
        if self.gpu {
            settings.backend = Backend::Gpu;
        }
        if let Some(workers) = self.workers {
            settings.pipeline.workers = workers;
        }
        settings
    }
}

// ---------------------------------------------------------------------------
// Render command
// ---------------------------------------------------------------------------

fn render(args: &RenderArgs) -> Result<(), CliError> {
    let settings = args.resolve();
    let viewport = settings.viewport()?;
    let params = settings.iteration_params()?;

    let mut pipeline = JobPipeline::new(settings.pipeline.clone())?;
    info!(
        workers = pipeline.workers(),
        precision = viewport.precision(),
        strategy = viewport.strategy().label(),
        "Rendering {}x{} at zoom {}",
        viewport.width(),
        viewport.height(),
        viewport.zoom_label()
    );

    let levels = pipeline.config().level_pixel_sizes.len();
    let job_id = pipeline.start_job(JobRequest::new(viewport.clone(), params))?;
    let summary = pipeline
        .run_to_completion(|event| {
            if let RenderEvent::LevelComplete { level, pixel_size, .. } = event {
                info!("Level {}/{levels} done (pixel size {pixel_size})", level + 1);
            }
        })
        .ok_or(CliError::Incomplete(job_id))?;

    let raster = pipeline
        .latest_complete()
        .ok_or(CliError::NothingToExport)?;
    export_png(raster, &args.out, &ExportMetadata::new(&viewport, &params))?;

    info!(
        elapsed_ms = summary.stats.elapsed.as_secs_f64() * 1000.0,
        high_precision_points = summary.stats.high_precision_points,
        "Wrote {}",
        args.out.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Render(args) => render(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
