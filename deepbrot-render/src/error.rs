use thiserror::Error;

/// Errors originating from the rendering pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid tile size: {0} (must be even and > 0)")]
    InvalidTileSize(u32),

    #[error("invalid image dimensions: {width}×{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("invalid pipeline configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("failed to build worker pool: {0}")]
    PoolBuild(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] png::EncodingError),

    #[error(transparent)]
    Core(#[from] deepbrot_core::CoreError),
}
