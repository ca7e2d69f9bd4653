pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod pool;
pub mod raster;
pub mod tile;

pub use config::PipelineConfig;
pub use error::RenderError;
pub use export::{export_png, ExportMetadata};
pub use pipeline::{JobPipeline, JobRequest, JobStats, JobSummary, RenderEvent};
pub use pool::{WorkerPool, WorkerReport};
pub use raster::LevelRaster;
pub use tile::{build_tile_grid, plan_levels, Level, Tile, TILE_SIZE};

/// Convenience result type for the render crate.
pub type Result<T> = std::result::Result<T, RenderError>;
