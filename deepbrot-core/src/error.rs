use thiserror::Error;

/// Errors originating from the core engine.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid max iterations: {0} (must be >= 1)")]
    InvalidMaxIterations(u32),

    #[error("invalid viewport: {reason}")]
    InvalidViewport { reason: String },

    #[error("invalid decimal number {input:?}: {reason}")]
    InvalidDecimal { input: String, reason: String },

    #[error("invalid fixed-point mantissa {0:?}")]
    InvalidMantissa(String),
}
