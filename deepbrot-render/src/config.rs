use serde::{Deserialize, Serialize};

use deepbrot_core::cancel::DEFAULT_STOP_CHECK_INTERVAL;

use crate::error::RenderError;
use crate::tile::{DEFAULT_LEVEL_PIXEL_SIZES, TILE_SIZE};

/// Tuning knobs of the job pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Tile edge in level pixels. Must be even so that tiles start on the
    /// checkerboard grid.
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    /// Pixel size of each level, coarsest first.
    #[serde(default = "default_level_pixel_sizes")]
    pub level_pixel_sizes: Vec<u32>,
    /// Worker threads; 0 means one per available core.
    #[serde(default)]
    pub workers: usize,
    /// Pixel iterations between two cancellation checks.
    #[serde(default = "default_stop_check_interval")]
    pub stop_check_interval: u32,
}

fn default_tile_size() -> u32 {
    TILE_SIZE
}
fn default_level_pixel_sizes() -> Vec<u32> {
    DEFAULT_LEVEL_PIXEL_SIZES.to_vec()
}
fn default_stop_check_interval() -> u32 {
    DEFAULT_STOP_CHECK_INTERVAL
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tile_size: default_tile_size(),
            level_pixel_sizes: default_level_pixel_sizes(),
            workers: 0,
            stop_check_interval: default_stop_check_interval(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.tile_size == 0 || self.tile_size % 2 != 0 {
            return Err(RenderError::InvalidTileSize(self.tile_size));
        }
        if self.level_pixel_sizes.is_empty() {
            return Err(RenderError::InvalidConfig {
                reason: "at least one level is required".into(),
            });
        }
        if self.level_pixel_sizes.contains(&0) {
            return Err(RenderError::InvalidConfig {
                reason: "level pixel sizes must be > 0".into(),
            });
        }
        if self.level_pixel_sizes.windows(2).any(|w| w[1] >= w[0]) {
            return Err(RenderError::InvalidConfig {
                reason: format!(
                    "level pixel sizes must be strictly decreasing, got {:?}",
                    self.level_pixel_sizes
                ),
            });
        }
        if self.stop_check_interval == 0 {
            return Err(RenderError::InvalidConfig {
                reason: "stop_check_interval must be > 0".into(),
            });
        }
        Ok(())
    }

    /// Number of worker threads to spawn.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Probe interval for worker `index`, offset so that workers do not
    /// all poll the token at the same moment.
    pub fn stop_check_interval_for(&self, index: usize) -> u32 {
        self.stop_check_interval + ((index as u32).wrapping_mul(37) % 100)
    }
}
